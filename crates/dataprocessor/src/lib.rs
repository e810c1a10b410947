//! Configurable data-retrieval engine: declaratively composed processors
//! pull fields from catalog-backed sources, join and filter them into a
//! retrieval plan, and format the rows an external entity store returns.

// public exports are one module level down
pub mod catalog;
pub mod config;
pub mod configuration;
pub mod error;
pub mod filter;
pub mod join;
pub mod output;
pub mod plan;
pub mod processor;
pub mod source;
pub mod spec;
pub mod store;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;

///
/// Prelude
///
/// Vocabulary needed to build and run a processor.
///

pub mod prelude {
    pub use crate::{
        catalog::{EntityCatalog, InMemoryCatalog, SharedCatalog},
        config::EngineConfig,
        error::{Error, ErrorClass, ErrorOrigin},
        filter::{SubmittedFilter, SubmittedFilterValues},
        output::{FieldOutput, FormattedRow},
        plan::CompareOp,
        processor::{
            DataProcessor, Execution, ProcessorDefinition, ProcessorRequest, Registry,
        },
        spec::{DataSpecification, FieldSpecification, FieldType},
        store::{EntityStore, InMemoryStore, RawRow},
        value::Value,
    };
}
