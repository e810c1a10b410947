use super::{
    CUSTOM_GROUP_ENTITY_COLUMN, ColumnTarget, FieldLayout, Source, SourceCore,
    entity::{apply_source_filters, own_field_spec},
    field_alias,
};
use crate::{
    catalog::{CustomGroup, SharedCatalog},
    configuration::{Configuration, required_str},
    error::{Error, ErrorOrigin},
    spec::{FieldSpecification, FieldType},
};

///
/// CustomGroupSource
///
/// Source over a single custom-group table, configured by `custom_group`.
///

pub struct CustomGroupSource {
    catalog: SharedCatalog,
    group: Option<CustomGroup>,
    core: SourceCore,
}

impl CustomGroupSource {
    #[must_use]
    pub fn new(catalog: SharedCatalog) -> Self {
        Self {
            catalog,
            group: None,
            core: SourceCore::default(),
        }
    }
}

impl Source for CustomGroupSource {
    fn source_type(&self) -> &str {
        "custom_group"
    }

    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn initialize(&mut self, configuration: &Configuration, name: &str) -> Result<(), Error> {
        let owner = format!("source '{name}'");
        let group_name = required_str(configuration, "custom_group", &owner, ErrorOrigin::Source)?;
        let group = self
            .catalog
            .custom_group(group_name)
            .map_err(Error::into_configuration)?;

        self.core.bind(name, &group.table);
        self.group = Some(group);

        apply_source_filters(self, configuration)
    }

    fn load_fields(&self) -> Result<FieldLayout, Error> {
        let group = self.group.as_ref().ok_or_else(|| {
            Error::invariant(
                ErrorOrigin::Source,
                "custom group source used before initialize",
            )
        })?;
        let source = self.core.name();

        let mut layout = FieldLayout::default();
        layout.push(
            FieldSpecification::new(
                CUSTOM_GROUP_ENTITY_COLUMN,
                FieldType::Integer,
                "Entity ID",
                None,
                field_alias(source, CUSTOM_GROUP_ENTITY_COLUMN),
            ),
            ColumnTarget::Own {
                column: CUSTOM_GROUP_ENTITY_COLUMN.to_string(),
            },
        )?;
        for field in &group.fields {
            layout.push(
                own_field_spec(source, field),
                ColumnTarget::Own {
                    column: field.column.clone(),
                },
            )?;
        }

        Ok(layout)
    }
}
