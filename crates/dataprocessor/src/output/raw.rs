use crate::{
    configuration::Configuration,
    error::Error,
    output::{
        FieldOutput, FieldOutputHandler, FormattedRow, OutputContext, display_value,
        ensure_dependency, output_spec,
    },
    spec::FieldSpecification,
    store::RawRow,
};

///
/// RawOutput
///
/// Passes a field through; enumerated values are shown by label.
///

#[derive(Debug, Default)]
pub struct RawOutput {
    source_field: Option<FieldSpecification>,
    spec: Option<FieldSpecification>,
}

impl RawOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FieldOutputHandler for RawOutput {
    fn output_type(&self) -> &str {
        "raw"
    }

    fn initialize(
        &mut self,
        alias: &str,
        title: &str,
        configuration: &Configuration,
        context: &mut OutputContext<'_>,
    ) -> Result<(), Error> {
        let owner = format!("output '{alias}'");
        let field = ensure_dependency(configuration, "datasource", "field", &owner, context.sources)?;

        self.spec = Some(output_spec(alias, title, &field));
        self.source_field = Some(field);

        Ok(())
    }

    fn output_field_specification(&self) -> Option<&FieldSpecification> {
        self.spec.as_ref()
    }

    fn format_field(&self, raw: &RawRow, _formatted: &FormattedRow) -> FieldOutput {
        let Some(field) = &self.source_field else {
            return FieldOutput::default();
        };
        let value = raw.value(field.alias());

        FieldOutput::new(value.clone(), display_value(field, value))
    }
}
