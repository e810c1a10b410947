//! Filter handlers: declared filterable fields plus user input become
//! source conditions.
//!
//! Validation never fails; it returns every message so a caller can show
//! them together. Applying a filter assumes validation already passed.

mod fixed;
mod simple;


use crate::{
    configuration::{Configuration, required_str},
    error::{Error, ErrorOrigin},
    plan::CompareOp,
    source::SourceSet,
    spec::FieldSpecification,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use fixed::FixedFilter;
pub use simple::SimpleFilter;

///
/// SubmittedFilter
///
/// One user-supplied filter value, e.g. `{ "op": "IN", "value": [1, 2] }`.
/// A missing `op` falls back to the filter's configured default.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SubmittedFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<CompareOp>,
    #[serde(default)]
    pub value: Value,
}

impl SubmittedFilter {
    pub fn new(op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            op: Some(op),
            value: value.into(),
        }
    }

    /// Filter on `value` with the default operator.
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            op: None,
            value: value.into(),
        }
    }
}

/// Submitted filter values keyed by filter name.
pub type SubmittedFilterValues = BTreeMap<String, SubmittedFilter>;

///
/// FilterHandler
///

pub trait FilterHandler {
    /// Registry key this instance was built from.
    fn filter_type(&self) -> &str;

    fn initialize(
        &mut self,
        name: &str,
        title: &str,
        is_required: bool,
        configuration: &Configuration,
        sources: &mut SourceSet,
    ) -> Result<(), Error>;

    fn name(&self) -> &str;

    fn title(&self) -> &str;

    /// User-facing field, aliased by the filter name. `None` for
    /// structural filters that have no form input.
    fn field_specification(&self) -> Option<&FieldSpecification>;

    fn is_required(&self) -> bool;

    fn validate_submitted_filter_params(&self, submitted: &SubmittedFilterValues) -> Vec<String>;

    /// Add this filter's conditions to its source.
    fn apply_filter_from_submitted_filter_params(
        &self,
        submitted: &SubmittedFilterValues,
        sources: &mut SourceSet,
    ) -> Result<(), Error>;
}

///
/// FilterTarget
///
/// The source field a filter resolved to at initialize.
///

#[derive(Clone, Debug)]
pub(crate) struct FilterTarget {
    pub source: String,
    pub field: FieldSpecification,
}

impl FilterTarget {
    /// Resolve `datasource`/`field` keys against the filter fields and
    /// register the field as referenced.
    pub(crate) fn resolve(
        configuration: &Configuration,
        owner: &str,
        sources: &mut SourceSet,
    ) -> Result<Self, Error> {
        let source = required_str(configuration, "datasource", owner, ErrorOrigin::Filter)?;
        let field = required_str(configuration, "field", owner, ErrorOrigin::Filter)?;
        let field = sources
            .reference_filter_field(source, field)
            .map_err(Error::into_configuration)?;

        Ok(Self {
            source: source.to_string(),
            field,
        })
    }

    pub(crate) fn apply(
        &self,
        op: CompareOp,
        value: Value,
        sources: &mut SourceSet,
    ) -> Result<(), Error> {
        sources
            .get_mut(&self.source)?
            .add_condition(&self.field, op, value)
    }
}
