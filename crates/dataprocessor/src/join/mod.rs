//! Declarative attachment of a secondary source to an earlier one.

mod simple;


use crate::{
    configuration::Configuration,
    error::Error,
    plan::JoinClause,
    source::{Source, SourceSet},
};
use std::fmt;

pub use simple::SimpleJoin;

///
/// Join
///
/// Owned by exactly one non-primary source. `resolve` runs when that source
/// is attached, against the sources attached before it.
///

pub trait Join: fmt::Debug {
    /// Registry key this instance was built from.
    fn join_type(&self) -> &str;

    /// Parse configuration for the source identified by `owner_id`.
    fn initialize(&mut self, configuration: &Configuration, owner_id: &str) -> Result<(), Error>;

    /// Resolve both sides to concrete fields and register them as used.
    fn resolve(&mut self, right: &mut dyn Source, earlier: &mut SourceSet) -> Result<(), Error>;

    /// Join clause contributed to the plan; only valid after `resolve`.
    fn clause(&self) -> Result<JoinClause, Error>;
}
