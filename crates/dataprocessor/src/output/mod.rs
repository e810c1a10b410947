//! Field-output handlers: raw rows become formatted, presentation-ready
//! values keyed by output alias.
//!
//! A handler's data dependencies reach the plan only through
//! `ensure_field_in_source`, which `initialize` must call for every field it
//! reads.

mod concat;
mod contact_link;
mod date;
mod raw;


use crate::{
    configuration::{Configuration, required_str},
    error::{Error, ErrorOrigin},
    source::SourceSet,
    spec::{DataSpecification, FieldSpecification},
    store::RawRow,
    value::Value,
};
use derive_more::{Deref, DerefMut};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use concat::ConcatOutput;
pub use contact_link::ContactLinkOutput;
pub use date::DateOutput;
pub use raw::RawOutput;

///
/// FieldOutput
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FieldOutput {
    pub raw_value: Value,
    pub formatted_value: String,
}

impl FieldOutput {
    pub fn new(raw_value: impl Into<Value>, formatted_value: impl Into<String>) -> Self {
        Self {
            raw_value: raw_value.into(),
            formatted_value: formatted_value.into(),
        }
    }
}

///
/// FormattedRow
///
/// One output row keyed by output alias, in output declaration order.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Deserialize, PartialEq, Serialize)]
pub struct FormattedRow(IndexMap<String, FieldOutput>);

impl FormattedRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatted text under `alias`, empty when absent.
    #[must_use]
    pub fn formatted(&self, alias: &str) -> &str {
        self.0
            .get(alias)
            .map_or("", |output| output.formatted_value.as_str())
    }
}

///
/// OutputContext
///
/// What an output handler may resolve against during initialize: the
/// processor's sources and the outputs declared before it.
///

pub struct OutputContext<'a> {
    pub sources: &'a mut SourceSet,
    pub earlier: &'a DataSpecification,
}

///
/// FieldOutputHandler
///

pub trait FieldOutputHandler {
    /// Registry key this instance was built from.
    fn output_type(&self) -> &str;

    /// Resolve dependencies and ensure every field this handler reads.
    /// Calling it again re-resolves all of them.
    fn initialize(
        &mut self,
        alias: &str,
        title: &str,
        configuration: &Configuration,
        context: &mut OutputContext<'_>,
    ) -> Result<(), Error>;

    fn output_field_specification(&self) -> Option<&FieldSpecification>;

    /// Pure: reads the raw row and the outputs formatted before this one.
    fn format_field(&self, raw: &RawRow, formatted: &FormattedRow) -> FieldOutput;
}

/// Resolve the `(source_key, field_key)` configuration pair and ensure the
/// field in its source.
pub(crate) fn ensure_dependency(
    configuration: &Configuration,
    source_key: &str,
    field_key: &str,
    owner: &str,
    sources: &mut SourceSet,
) -> Result<FieldSpecification, Error> {
    let source = required_str(configuration, source_key, owner, ErrorOrigin::Output)?;
    let field = required_str(configuration, field_key, owner, ErrorOrigin::Output)?;

    sources
        .ensure(source, field)
        .map_err(Error::into_configuration)
}

/// Output descriptor named and aliased by the output alias.
pub(crate) fn output_spec(
    alias: &str,
    title: &str,
    source_field: &FieldSpecification,
) -> FieldSpecification {
    let title = if title.trim().is_empty() {
        source_field.title()
    } else {
        title
    };

    FieldSpecification::new(
        alias,
        source_field.field_type(),
        title,
        source_field.options().cloned(),
        alias,
    )
}

/// Display text, swapping enumerated values for their labels.
pub(crate) fn display_value(field: &FieldSpecification, value: &Value) -> String {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| display_value(field, item))
            .collect::<Vec<_>>()
            .join(", "),
        single => field
            .option_label(single)
            .map_or_else(|| single.to_string(), str::to_string),
    }
}
