//! Host-platform metadata the sources read their field lists from.
//!
//! The catalog is an external collaborator: the engine only reads it, and
//! reads it fresh for every source instance so externally edited metadata
//! (relationship types, custom groups) is never served stale.

mod memory;

use crate::{
    error::Error,
    spec::{FieldOptions, FieldType},
};
use std::sync::Arc;

pub use memory::InMemoryCatalog;

/// Catalog handle shared by the registry and every source it builds.
pub type SharedCatalog = Arc<dyn EntityCatalog + Send + Sync>;

///
/// CatalogField
///
/// A stored column of an entity table or custom-group table.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogField {
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
    pub title: String,
    pub options: Option<FieldOptions>,
}

impl CatalogField {
    /// A field whose column name equals its field name.
    pub fn new(name: impl Into<String>, field_type: FieldType, title: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            column: name.clone(),
            name,
            field_type,
            title: title.into(),
            options: None,
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = Some(options);
        self
    }
}

///
/// CatalogEntity
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogEntity {
    pub name: String,
    pub table: String,
    pub fields: Vec<CatalogField>,
}

///
/// CustomGroup
///
/// A set of custom fields stored in their own table and keyed to the
/// extended entity through `entity_id`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CustomGroup {
    pub name: String,
    pub title: String,
    pub table: String,
    pub extends: String,
    pub fields: Vec<CatalogField>,
}

///
/// RelationshipType
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelationshipType {
    pub id: i64,
    pub name_a_b: String,
    pub label_a_b: String,
    pub label_b_a: String,
}

///
/// EntityCatalog
///

pub trait EntityCatalog {
    /// Entity definition; unknown entities are `NotFound`.
    fn entity(&self, name: &str) -> Result<CatalogEntity, Error>;

    /// Custom groups extending `entity`, in catalog order.
    fn custom_groups(&self, entity: &str) -> Result<Vec<CustomGroup>, Error>;

    /// A single custom group by name; unknown groups are `NotFound`.
    fn custom_group(&self, name: &str) -> Result<CustomGroup, Error>;

    /// All relationship types, in catalog order.
    fn relationship_types(&self) -> Result<Vec<RelationshipType>, Error>;
}
