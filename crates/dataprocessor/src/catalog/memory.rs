use crate::{
    catalog::{CatalogEntity, CatalogField, CustomGroup, EntityCatalog, RelationshipType},
    error::{Error, ErrorOrigin},
};
use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

///
/// InMemoryCatalog
///
/// Catalog backed by plain collections. Relationship types sit behind a
/// lock so embedders and tests can edit them between requests.
///

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entities: BTreeMap<String, CatalogEntity>,
    groups: Vec<CustomGroup>,
    relationship_types: RwLock<Vec<RelationshipType>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entity(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        fields: Vec<CatalogField>,
    ) -> Self {
        let name = name.into();
        self.entities.insert(
            name.clone(),
            CatalogEntity {
                name,
                table: table.into(),
                fields,
            },
        );
        self
    }

    #[must_use]
    pub fn with_custom_group(mut self, group: CustomGroup) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn with_relationship_type(mut self, relationship_type: RelationshipType) -> Self {
        self.relationship_types
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push(relationship_type);
        self
    }

    /// Replace the relationship-type list in place.
    pub fn set_relationship_types(&self, types: Vec<RelationshipType>) {
        *self
            .relationship_types
            .write()
            .unwrap_or_else(PoisonError::into_inner) = types;
    }
}

impl EntityCatalog for InMemoryCatalog {
    fn entity(&self, name: &str) -> Result<CatalogEntity, Error> {
        self.entities.get(name).cloned().ok_or_else(|| {
            Error::not_found(ErrorOrigin::Catalog, format!("entity '{name}' not found"))
        })
    }

    fn custom_groups(&self, entity: &str) -> Result<Vec<CustomGroup>, Error> {
        Ok(self
            .groups
            .iter()
            .filter(|group| group.extends == entity)
            .cloned()
            .collect())
    }

    fn custom_group(&self, name: &str) -> Result<CustomGroup, Error> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(
                    ErrorOrigin::Catalog,
                    format!("custom group '{name}' not found"),
                )
            })
    }

    fn relationship_types(&self) -> Result<Vec<RelationshipType>, Error> {
        Ok(self
            .relationship_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
