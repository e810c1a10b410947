use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// FieldOptions
///
/// Ordered value → label mapping for enumerated fields.
///

pub type FieldOptions = IndexMap<String, String>;

///
/// FieldType
///
/// Semantic type tag of a field, using the platform's PascalCase names.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Text,
    Money,
}

impl FieldType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::Timestamp => "Timestamp",
            Self::Text => "Text",
            Self::Money => "Money",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Money)
    }

    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// FieldSpecification
///
/// Descriptor of one retrievable or output field.
///
/// Values are immutable; renaming and re-aliasing produce new copies so a
/// field merged into another specification never aliases its origin.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldSpecification {
    name: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<FieldOptions>,
    alias: String,
}

impl FieldSpecification {
    pub fn new(
        name: impl Into<String>,
        field_type: FieldType,
        title: impl Into<String>,
        options: Option<FieldOptions>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            title: title.into(),
            options,
            alias: alias.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub const fn options(&self) -> Option<&FieldOptions> {
        self.options.as_ref()
    }

    /// Key this field is projected under in a result row.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Copy of this field with `prefix` prepended to its name.
    #[must_use]
    pub fn renamed(&self, prefix: &str) -> Self {
        Self {
            name: format!("{prefix}{}", self.name),
            ..self.clone()
        }
    }

    /// Copy of this field projected under a different alias.
    #[must_use]
    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..self.clone()
        }
    }

    /// Label for `value` when this field is enumerated.
    #[must_use]
    pub fn option_label(&self, value: &Value) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(|options| options.get(&value.option_key()))
            .map(String::as_str)
    }
}
