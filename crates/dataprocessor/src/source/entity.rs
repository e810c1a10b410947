use super::{
    CUSTOM_FIELD_PREFIX, ColumnTarget, FieldLayout, Source, SourceCore, field_alias,
};
use crate::{
    catalog::{CatalogEntity, CatalogField, SharedCatalog},
    configuration::{Configuration, optional_map, optional_op, optional_value},
    error::{Error, ErrorOrigin},
    plan::{CompareOp, TableRef},
    spec::FieldSpecification,
};
use tracing::debug;

///
/// EntitySource
///
/// Catalog-backed source over one entity table plus every custom group
/// extending that entity.
///

pub struct EntitySource {
    catalog: SharedCatalog,
    source_type: String,
    entity_name: String,
    entity: Option<CatalogEntity>,
    core: SourceCore,
}

impl EntitySource {
    pub fn new(
        catalog: SharedCatalog,
        source_type: impl Into<String>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            source_type: source_type.into(),
            entity_name: entity_name.into(),
            entity: None,
            core: SourceCore::default(),
        }
    }

    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub(super) const fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Resolve the entity and bind the core, without configured conditions.
    pub(super) fn bind(&mut self, name: &str) -> Result<(), Error> {
        let entity = self
            .catalog
            .entity(&self.entity_name)
            .map_err(Error::into_configuration)?;
        self.core.bind(name, &entity.table);
        self.entity = Some(entity);

        Ok(())
    }

    fn bound_entity(&self) -> Result<&CatalogEntity, Error> {
        self.entity.as_ref().ok_or_else(|| {
            Error::invariant(
                ErrorOrigin::Source,
                format!(
                    "entity source '{}' used before initialize",
                    self.entity_name
                ),
            )
        })
    }

    /// Entity columns, minus `skip`, followed by custom fields.
    pub(super) fn entity_layout(&self, skip: &[&str]) -> Result<FieldLayout, Error> {
        let entity = self.bound_entity()?;
        let source = self.core.name();
        let mut layout = FieldLayout::default();

        for field in entity.fields.iter().filter(|f| !skip.contains(&f.name.as_str())) {
            layout.push(
                own_field_spec(source, field),
                ColumnTarget::Own {
                    column: field.column.clone(),
                },
            )?;
        }

        for group in self.catalog.custom_groups(&entity.name)? {
            let table = TableRef::new(group.table, format!("{source}_{}", group.name));
            for field in &group.fields {
                let name = format!("{CUSTOM_FIELD_PREFIX}{}", field.name);
                let spec = FieldSpecification::new(
                    name.clone(),
                    field.field_type,
                    field.title.clone(),
                    field.options.clone(),
                    field_alias(source, &name),
                );
                layout.push(
                    spec,
                    ColumnTarget::Group {
                        group: table.clone(),
                        column: field.column.clone(),
                    },
                )?;
            }
        }

        debug!(
            source = source,
            entity = %entity.name,
            fields = layout.fields.len(),
            "loaded entity fields"
        );

        Ok(layout)
    }
}

impl Source for EntitySource {
    fn source_type(&self) -> &str {
        &self.source_type
    }

    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn initialize(&mut self, configuration: &Configuration, name: &str) -> Result<(), Error> {
        self.bind(name)?;
        apply_source_filters(self, configuration)
    }

    fn load_fields(&self) -> Result<FieldLayout, Error> {
        self.entity_layout(&[])
    }
}

/// Field descriptor for a column stored on the source's own table.
pub(super) fn own_field_spec(source: &str, field: &CatalogField) -> FieldSpecification {
    FieldSpecification::new(
        field.name.clone(),
        field.field_type,
        field.title.clone(),
        field.options.clone(),
        field_alias(source, &field.name),
    )
}

/// Turn the optional `filter` mapping (`{ field: { op, value } }`) into
/// source-level conditions. Fields resolve against the filter fields.
pub(super) fn apply_source_filters<S: Source + ?Sized>(
    source: &mut S,
    configuration: &Configuration,
) -> Result<(), Error> {
    let owner = format!("source '{}'", source.source_name());
    let Some(filters) = optional_map(configuration, "filter", &owner, ErrorOrigin::Source)? else {
        return Ok(());
    };

    for (field, condition) in filters {
        let serde_json::Value::Object(condition) = condition else {
            return Err(Error::configuration(
                ErrorOrigin::Source,
                format!("{owner}: filter on '{field}' must be a mapping with 'op' and 'value'"),
            ));
        };
        let op = optional_op(condition, "op", &owner, ErrorOrigin::Source)?
            .unwrap_or(CompareOp::Eq);
        let value = optional_value(condition, "value", &owner, ErrorOrigin::Source)?;
        if !op.accepts(&value) {
            return Err(Error::configuration(
                ErrorOrigin::Source,
                format!(
                    "{owner}: filter on '{field}' has a value that does not fit operator {}",
                    op.as_sql()
                ),
            ));
        }

        let spec = source
            .available_filter_fields()?
            .field_specification_by_name(field)
            .cloned()
            .map_err(|_| {
                Error::configuration(
                    ErrorOrigin::Source,
                    format!("{owner}: filter references unknown field '{field}'"),
                )
            })?;
        source.reference_field(&spec)?;
        source.add_condition(&spec, op, value)?;
    }

    Ok(())
}
