use crate::{
    configuration::{Configuration, optional_str_list},
    error::{Error, ErrorOrigin},
    output::{FieldOutput, FieldOutputHandler, FormattedRow, OutputContext},
    spec::{FieldSpecification, FieldType},
    store::RawRow,
};

///
/// ConcatOutput
///
/// Joins the formatted text of earlier outputs (`fields`) with
/// `separator`. Reads no source fields of its own.
///

#[derive(Debug, Default)]
pub struct ConcatOutput {
    fields: Vec<String>,
    separator: String,
    spec: Option<FieldSpecification>,
}

impl ConcatOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FieldOutputHandler for ConcatOutput {
    fn output_type(&self) -> &str {
        "concat"
    }

    fn initialize(
        &mut self,
        alias: &str,
        title: &str,
        configuration: &Configuration,
        context: &mut OutputContext<'_>,
    ) -> Result<(), Error> {
        let owner = format!("output '{alias}'");
        let fields = optional_str_list(configuration, "fields", &owner, ErrorOrigin::Output)?;
        if fields.is_empty() {
            return Err(Error::missing_key(ErrorOrigin::Output, &owner, "fields"));
        }
        if let Some(unknown) = fields.iter().find(|f| !context.earlier.does_field_exist(f)) {
            return Err(Error::configuration(
                ErrorOrigin::Output,
                format!("{owner}: '{unknown}' is not an output declared before this one"),
            ));
        }

        // Whitespace separators are meaningful, so read the raw string.
        self.separator = match configuration.get("separator") {
            None | Some(serde_json::Value::Null) => " ".to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(Error::configuration(
                    ErrorOrigin::Output,
                    format!("{owner}: configuration key 'separator' must be a string"),
                ));
            }
        };
        self.fields = fields;
        self.spec = Some(FieldSpecification::new(
            alias,
            FieldType::String,
            title,
            None,
            alias,
        ));

        Ok(())
    }

    fn output_field_specification(&self) -> Option<&FieldSpecification> {
        self.spec.as_ref()
    }

    fn format_field(&self, _raw: &RawRow, formatted: &FormattedRow) -> FieldOutput {
        let joined = self
            .fields
            .iter()
            .map(|alias| formatted.formatted(alias))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(&self.separator);

        FieldOutput::new(joined.clone(), joined)
    }
}
