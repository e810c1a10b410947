use crate::{
    config::{EngineConfig, is_valid_date_format},
    configuration::{Configuration, optional_str},
    error::{Error, ErrorOrigin},
    output::{
        FieldOutput, FieldOutputHandler, FormattedRow, OutputContext, ensure_dependency,
        output_spec,
    },
    spec::FieldSpecification,
    store::RawRow,
    value::Value,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::{fmt::Write, sync::Arc};

// Storage layouts the platform writes dates and timestamps in.
const DATETIME_LAYOUTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%d%H%M%S"];
const DATE_LAYOUTS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

///
/// DateOutput
///
/// Reformats a stored date with a strftime `format` (engine default when
/// unset). Values that do not parse are passed through unchanged.
///

#[derive(Debug)]
pub struct DateOutput {
    config: Arc<EngineConfig>,
    format: String,
    source_field: Option<FieldSpecification>,
    spec: Option<FieldSpecification>,
}

impl DateOutput {
    #[must_use]
    pub const fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            format: String::new(),
            source_field: None,
            spec: None,
        }
    }

    fn reformat(&self, text: &str) -> Option<String> {
        let text = text.trim();
        let parsed = DATETIME_LAYOUTS
            .iter()
            .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
            .or_else(|| {
                DATE_LAYOUTS
                    .iter()
                    .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })?;

        let mut out = String::new();
        write!(out, "{}", parsed.format(&self.format)).ok()?;

        Some(out)
    }
}

impl FieldOutputHandler for DateOutput {
    fn output_type(&self) -> &str {
        "date"
    }

    fn initialize(
        &mut self,
        alias: &str,
        title: &str,
        configuration: &Configuration,
        context: &mut OutputContext<'_>,
    ) -> Result<(), Error> {
        let owner = format!("output '{alias}'");
        let format = optional_str(configuration, "format", &owner, ErrorOrigin::Output)?
            .unwrap_or(&self.config.date_format)
            .to_string();
        if !is_valid_date_format(&format) {
            return Err(Error::configuration(
                ErrorOrigin::Output,
                format!("{owner}: '{format}' is not a valid date format"),
            ));
        }
        let field = ensure_dependency(configuration, "datasource", "field", &owner, context.sources)?;

        self.format = format;
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
        let formatted = match value {
            Value::Text(text) => self.reformat(text).unwrap_or_else(|| text.clone()),
            other => other.to_string(),
        };

        FieldOutput::new(value.clone(), formatted)
    }
}
