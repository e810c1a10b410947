use super::{
    ColumnTarget, FieldLayout, Source, SourceCore,
    entity::{EntitySource, apply_source_filters},
    field_alias,
};
use crate::{
    catalog::SharedCatalog,
    configuration::Configuration,
    error::Error,
    spec::{FieldOptions, FieldSpecification, FieldType},
};

/// Catalog entity backing relationship sources.
pub const RELATIONSHIP_ENTITY: &str = "Relationship";

/// Synthetic enumerated filter field listing the relationship types.
pub const RELATIONSHIP_TYPE_FIELD: &str = "relationship_type_id";

///
/// RelationshipSource
///
/// Entity source over relationships whose filter fields lead with the
/// relationship type, enumerated from the catalog.
///

pub struct RelationshipSource {
    entity: EntitySource,
}

impl RelationshipSource {
    pub fn new(catalog: SharedCatalog, source_type: impl Into<String>) -> Self {
        Self {
            entity: EntitySource::new(catalog, source_type, RELATIONSHIP_ENTITY),
        }
    }

    fn relationship_type_field(&self) -> Result<FieldSpecification, Error> {
        let options: FieldOptions = self
            .entity
            .catalog()
            .relationship_types()?
            .into_iter()
            .map(|rt| (rt.id.to_string(), rt.label_a_b))
            .collect();

        Ok(FieldSpecification::new(
            RELATIONSHIP_TYPE_FIELD,
            FieldType::Integer,
            "Relationship type",
            Some(options),
            field_alias(self.source_name(), RELATIONSHIP_TYPE_FIELD),
        ))
    }
}

impl Source for RelationshipSource {
    fn source_type(&self) -> &str {
        self.entity.source_type()
    }

    fn core(&self) -> &SourceCore {
        self.entity.core()
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        self.entity.core_mut()
    }

    fn initialize(&mut self, configuration: &Configuration, name: &str) -> Result<(), Error> {
        self.entity.bind(name)?;
        apply_source_filters(self, configuration)
    }

    fn load_fields(&self) -> Result<FieldLayout, Error> {
        self.entity.load_fields()
    }

    fn load_filter_fields(&self) -> Result<FieldLayout, Error> {
        let mut layout = FieldLayout::default();
        layout.push(
            self.relationship_type_field()?,
            ColumnTarget::Own {
                column: RELATIONSHIP_TYPE_FIELD.to_string(),
            },
        )?;

        let rest = self.entity.entity_layout(&[RELATIONSHIP_TYPE_FIELD])?;
        for field in rest.fields.fields() {
            if let Some(target) = rest.columns.get(field.name()) {
                layout.push(field.clone(), target.clone())?;
            }
        }

        Ok(layout)
    }
}
