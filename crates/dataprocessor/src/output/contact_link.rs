use crate::{
    config::EngineConfig,
    configuration::Configuration,
    error::Error,
    output::{FieldOutput, FieldOutputHandler, FormattedRow, OutputContext, ensure_dependency},
    spec::{FieldSpecification, FieldType},
    store::RawRow,
};
use std::sync::Arc;

///
/// ContactLinkOutput
///
/// Anchor to the contact view page. The id and the display name may come
/// from different sources:
///
/// `contact_id_datasource`, `contact_id_field`, `contact_name_datasource`,
/// `contact_name_field`.
///

#[derive(Debug)]
pub struct ContactLinkOutput {
    config: Arc<EngineConfig>,
    id_field: Option<FieldSpecification>,
    name_field: Option<FieldSpecification>,
    spec: Option<FieldSpecification>,
}

impl ContactLinkOutput {
    #[must_use]
    pub const fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            id_field: None,
            name_field: None,
            spec: None,
        }
    }
}

impl FieldOutputHandler for ContactLinkOutput {
    fn output_type(&self) -> &str {
        "contact_link"
    }

    fn initialize(
        &mut self,
        alias: &str,
        title: &str,
        configuration: &Configuration,
        context: &mut OutputContext<'_>,
    ) -> Result<(), Error> {
        let owner = format!("output '{alias}'");

        let id_field = ensure_dependency(
            configuration,
            "contact_id_datasource",
            "contact_id_field",
            &owner,
            context.sources,
        )?;
        let name_field = ensure_dependency(
            configuration,
            "contact_name_datasource",
            "contact_name_field",
            &owner,
            context.sources,
        )?;

        let title = if title.trim().is_empty() {
            name_field.title()
        } else {
            title
        };
        self.spec = Some(FieldSpecification::new(
            "contact_link",
            FieldType::String,
            title,
            None,
            alias,
        ));
        self.id_field = Some(id_field);
        self.name_field = Some(name_field);

        Ok(())
    }

    fn output_field_specification(&self) -> Option<&FieldSpecification> {
        self.spec.as_ref()
    }

    fn format_field(&self, raw: &RawRow, _formatted: &FormattedRow) -> FieldOutput {
        let (Some(id_field), Some(name_field)) = (&self.id_field, &self.name_field) else {
            return FieldOutput::default();
        };
        let id = raw.value(id_field.alias());
        let name = raw.value(name_field.alias());

        let label = escape_html(&name.to_string());
        let formatted = if id.is_null() {
            label
        } else {
            format!(
                "<a href=\"{}?reset=1&cid={}\">{label}</a>",
                self.config.contact_view_url(),
                escape_html(&id.to_string())
            )
        };

        FieldOutput::new(name.clone(), formatted)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }

    out
}
