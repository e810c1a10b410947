//! Field descriptors and the ordered, name-unique collections built from them.

mod field;

#[cfg(test)]
mod tests;

use crate::error::{Error, ErrorOrigin};
use indexmap::IndexMap;
use thiserror::Error as ThisError;

pub use field::{FieldOptions, FieldSpecification, FieldType};

///
/// FieldExistsError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("field '{name}' already exists")]
pub struct FieldExistsError {
    pub name: String,
}

///
/// DataSpecification
///
/// Ordered mapping from field name to [`FieldSpecification`].
/// Iteration is always insertion order and names never repeat.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DataSpecification {
    fields: IndexMap<String, FieldSpecification>,
}

impl DataSpecification {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a specification keyed by each field's own name.
    pub fn try_from_fields(
        fields: impl IntoIterator<Item = FieldSpecification>,
    ) -> Result<Self, FieldExistsError> {
        let mut spec = Self::new();
        for field in fields {
            spec.add_field_specification(field.name().to_string(), field)?;
        }

        Ok(spec)
    }

    /// Insert `field` under `name`. The specification is left untouched when
    /// `name` is already present.
    pub fn add_field_specification(
        &mut self,
        name: impl Into<String>,
        field: FieldSpecification,
    ) -> Result<&mut Self, FieldExistsError> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(FieldExistsError { name });
        }
        self.fields.insert(name, field);

        Ok(self)
    }

    #[must_use]
    pub fn does_field_exist(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Look up a field; absence is an undefined reference, never a default.
    pub fn field_specification_by_name(&self, name: &str) -> Result<&FieldSpecification, Error> {
        self.fields.get(name).ok_or_else(|| {
            Error::not_found(
                ErrorOrigin::Specification,
                format!("field '{name}' is not defined"),
            )
        })
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpecification> {
        self.fields.values()
    }

    /// Field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field aliases in insertion order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(FieldSpecification::alias)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a renamed copy of every field in `other`, preserving its order.
    ///
    /// `other` is never modified. On collision the error names the first
    /// clashing field; fields appended before it stay in `self`.
    pub fn merge(&mut self, other: &Self, prefix: &str) -> Result<&mut Self, FieldExistsError> {
        for field in other.fields() {
            let renamed = field.renamed(prefix);
            self.add_field_specification(renamed.name().to_string(), renamed)?;
        }

        Ok(self)
    }
}

impl<'a> IntoIterator for &'a DataSpecification {
    type Item = &'a FieldSpecification;
    type IntoIter = indexmap::map::Values<'a, String, FieldSpecification>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.values()
    }
}
