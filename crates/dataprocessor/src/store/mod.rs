//! Execution boundary: the external entity store and the rows it returns.

mod memory;


use crate::{plan::RetrievalPlan, value::Value};
use derive_more::{Deref, DerefMut};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

pub use memory::InMemoryStore;

static NULL: Value = Value::Null;

///
/// StoreError
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("column '{column}' does not exist on table alias '{alias}'")]
    UnknownColumn { alias: String, column: String },

    #[error("table alias '{0}' is referenced before it is joined")]
    UnknownAlias(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

///
/// RawRow
///
/// One fetched row keyed by projection alias, in projection order.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Deserialize, PartialEq, Serialize)]
pub struct RawRow(IndexMap<String, Value>);

impl RawRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value under `alias`; absent columns read as `Null`.
    #[must_use]
    pub fn value(&self, alias: &str) -> &Value {
        self.0.get(alias).unwrap_or(&NULL)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

///
/// EntityStore
///
/// Executes a finalized plan. Called at most once per processor.
///

pub trait EntityStore {
    fn execute(&self, plan: &RetrievalPlan) -> Result<Vec<RawRow>, StoreError>;
}
