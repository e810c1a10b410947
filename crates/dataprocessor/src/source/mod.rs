//! Data-source adapters.
//!
//! Every source shares a [`SourceCore`] holding its name, table, projection
//! and conditions; variants only decide which fields exist and how they map
//! to columns. Field lists are computed lazily and memoized per instance,
//! never across instances, because configuration differs per attachment.

mod custom_group;
mod entity;
mod relationship;


use crate::{
    configuration::Configuration,
    error::{Error, ErrorOrigin},
    join::Join,
    plan::{
        ColumnRef, CompareOp, Condition, JoinClause, JoinType, ProjectedColumn, SourceFragment,
        TableRef,
    },
    spec::{DataSpecification, FieldSpecification},
    value::Value,
};
use indexmap::IndexMap;
use std::{cell::OnceCell, collections::BTreeSet};

pub use custom_group::CustomGroupSource;
pub use entity::EntitySource;
pub use relationship::{RELATIONSHIP_ENTITY, RELATIONSHIP_TYPE_FIELD, RelationshipSource};

/// Key column custom-group tables are joined on.
pub const CUSTOM_GROUP_ENTITY_COLUMN: &str = "entity_id";

/// Name prefix of custom fields contributed to an entity source.
pub const CUSTOM_FIELD_PREFIX: &str = "custom_";

/// Key column every entity table is joined to its custom groups by.
pub const ENTITY_ID_COLUMN: &str = "id";

///
/// ColumnTarget
///
/// Where a field lives: on the source table itself, or on a custom-group
/// table that has to be joined in when the field is used.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ColumnTarget {
    Own { column: String },
    Group { group: TableRef, column: String },
}

///
/// FieldLayout
///

#[derive(Clone, Debug, Default)]
pub struct FieldLayout {
    pub fields: DataSpecification,
    pub columns: IndexMap<String, ColumnTarget>,
}

impl FieldLayout {
    /// Add a field together with its column target.
    pub fn push(&mut self, field: FieldSpecification, target: ColumnTarget) -> Result<(), Error> {
        let name = field.name().to_string();
        self.fields.add_field_specification(name.clone(), field)?;
        self.columns.insert(name, target);

        Ok(())
    }
}

/// Alias a source projects `field` under.
#[must_use]
pub fn field_alias(source_name: &str, field: &str) -> String {
    format!("{source_name}_{field}")
}

///
/// SourceCore
///
/// State shared by all source variants. Mutated while the processor is
/// assembled and planned; read-only once frozen.
///

#[derive(Debug, Default)]
pub struct SourceCore {
    name: String,
    table: Option<TableRef>,
    available: OnceCell<FieldLayout>,
    filterable: OnceCell<FieldLayout>,
    ensured: DataSpecification,
    referenced: BTreeSet<String>,
    reference_order: Vec<String>,
    conditions: Vec<Condition>,
    join: Option<Box<dyn Join>>,
    frozen: bool,
}

impl SourceCore {
    /// Bind the core to its configured name and backing table.
    pub fn bind(&mut self, name: &str, table: &str) {
        self.name = name.to_string();
        self.table = Some(TableRef::new(table, name));
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing table; unbound cores are a programmer error.
    pub fn table(&self) -> Result<&TableRef, Error> {
        self.table.as_ref().ok_or_else(|| {
            Error::invariant(
                ErrorOrigin::Source,
                "source used before initialize bound its table",
            )
        })
    }

    fn cached<'a>(
        cell: &'a OnceCell<FieldLayout>,
        load: impl FnOnce() -> Result<FieldLayout, Error>,
    ) -> Result<&'a FieldLayout, Error> {
        if let Some(layout) = cell.get() {
            return Ok(layout);
        }
        let layout = load()?;

        Ok(cell.get_or_init(|| layout))
    }
}

///
/// Source
///
/// Variants implement the required methods; the provided methods operate
/// on the shared core and are not meant to be overridden.
///

pub trait Source {
    /// Registry key this instance was built from.
    fn source_type(&self) -> &str;

    fn core(&self) -> &SourceCore;

    fn core_mut(&mut self) -> &mut SourceCore;

    /// Parse and validate configuration and bind the source to `name`.
    fn initialize(&mut self, configuration: &Configuration, name: &str) -> Result<(), Error>;

    /// Compute every field this source could expose.
    fn load_fields(&self) -> Result<FieldLayout, Error>;

    /// Compute the filterable fields; defaults to the available fields.
    fn load_filter_fields(&self) -> Result<FieldLayout, Error> {
        self.load_fields()
    }

    /// Alias namespacing this source's fields.
    fn source_name(&self) -> &str {
        self.core().name()
    }

    fn available_fields(&self) -> Result<&DataSpecification, Error> {
        self.available_layout().map(|layout| &layout.fields)
    }

    fn available_filter_fields(&self) -> Result<&DataSpecification, Error> {
        self.filter_layout().map(|layout| &layout.fields)
    }

    fn available_layout(&self) -> Result<&FieldLayout, Error> {
        SourceCore::cached(&self.core().available, || self.load_fields())
    }

    fn filter_layout(&self) -> Result<&FieldLayout, Error> {
        SourceCore::cached(&self.core().filterable, || self.load_filter_fields())
    }

    /// Fields currently projected, in the order they were ensured.
    fn ensured_fields(&self) -> &DataSpecification {
        &self.core().ensured
    }

    /// Register `field` in the projection. Repeated calls are a no-op.
    fn ensure_field_in_source(&mut self, field: &FieldSpecification) -> Result<(), Error> {
        if self.core().ensured.does_field_exist(field.name()) {
            return Ok(());
        }
        self.check_open("ensure", field)?;
        let own = self.own_field(field.name())?;
        self.core_mut()
            .ensured
            .add_field_specification(own.name().to_string(), own)?;

        Ok(())
    }

    /// Drop every ensured field so the projection can be rebuilt.
    fn clear_projection(&mut self) {
        self.core_mut().ensured = DataSpecification::new();
    }

    /// Register a non-projected use of `field` (join key, condition column)
    /// and return its column.
    fn reference_field(&mut self, field: &FieldSpecification) -> Result<ColumnRef, Error> {
        let column = self.column_ref(field.name())?;
        if self.core().referenced.contains(field.name()) {
            return Ok(column);
        }
        self.check_open("reference", field)?;

        let core = self.core_mut();
        core.referenced.insert(field.name().to_string());
        core.reference_order.push(field.name().to_string());

        Ok(column)
    }

    /// Add a condition on a field that was ensured or referenced before.
    fn add_condition(
        &mut self,
        field: &FieldSpecification,
        op: CompareOp,
        value: Value,
    ) -> Result<(), Error> {
        let core = self.core();
        if !core.ensured.does_field_exist(field.name()) && !core.referenced.contains(field.name())
        {
            return Err(Error::invariant(
                ErrorOrigin::Source,
                format!(
                    "source '{}': condition on field '{}' that was never referenced",
                    core.name(),
                    field.name()
                ),
            ));
        }
        self.check_open("filter on", field)?;
        let column = self.column_ref(field.name())?;
        self.core_mut().conditions.push(Condition { column, op, value });

        Ok(())
    }

    /// Column a field of this source lives in.
    fn column_ref(&self, name: &str) -> Result<ColumnRef, Error> {
        let target = self.column_target(name)?;
        let own_alias = self.core().table()?.alias.clone();

        Ok(match target {
            ColumnTarget::Own { column } => ColumnRef::new(own_alias, column),
            ColumnTarget::Group { group, column } => ColumnRef::new(group.alias, column),
        })
    }

    /// Look a field up among the available fields, then the filter fields.
    fn own_field(&self, name: &str) -> Result<FieldSpecification, Error> {
        let available = self.available_fields()?;
        if available.does_field_exist(name) {
            return available.field_specification_by_name(name).cloned();
        }

        self.available_filter_fields()?
            .field_specification_by_name(name)
            .cloned()
            .map_err(|_| {
                Error::not_found(
                    ErrorOrigin::Source,
                    format!(
                        "field '{name}' is not available in source '{}'",
                        self.source_name()
                    ),
                )
            })
    }

    fn column_target(&self, name: &str) -> Result<ColumnTarget, Error> {
        if let Some(target) = self.available_layout()?.columns.get(name) {
            return Ok(target.clone());
        }
        if let Some(target) = self.filter_layout()?.columns.get(name) {
            return Ok(target.clone());
        }

        Err(Error::not_found(
            ErrorOrigin::Source,
            format!(
                "field '{name}' is not available in source '{}'",
                self.source_name()
            ),
        ))
    }

    fn check_open(&self, action: &str, field: &FieldSpecification) -> Result<(), Error> {
        if self.core().frozen {
            return Err(Error::invariant(
                ErrorOrigin::Source,
                format!(
                    "source '{}': cannot {action} field '{}' after planning was finalized",
                    self.source_name(),
                    field.name()
                ),
            ));
        }

        Ok(())
    }

    fn join(&self) -> Option<&dyn Join> {
        self.core().join.as_deref()
    }

    fn set_join(&mut self, join: Box<dyn Join>) {
        self.core_mut().join = Some(join);
    }

    /// Stop accepting projection and condition changes.
    fn freeze(&mut self) {
        self.core_mut().frozen = true;
    }

    fn is_frozen(&self) -> bool {
        self.core().frozen
    }

    /// Table, implicit group joins, projection and conditions of this source.
    fn plan_fragment(&self) -> Result<SourceFragment, Error> {
        let core = self.core();
        let table = core.table()?.clone();
        let mut fragment = SourceFragment::new(table.clone());

        let used = core
            .ensured
            .names()
            .map(str::to_string)
            .chain(core.reference_order.iter().cloned());
        for name in used {
            if let ColumnTarget::Group { group, .. } = self.column_target(&name)?
                && !fragment.joins.iter().any(|j| j.table.alias == group.alias)
            {
                fragment.joins.push(JoinClause {
                    join_type: JoinType::Left,
                    left: ColumnRef::new(table.alias.clone(), ENTITY_ID_COLUMN),
                    right: ColumnRef::new(group.alias.clone(), CUSTOM_GROUP_ENTITY_COLUMN),
                    table: group,
                });
            }
        }

        for field in core.ensured.fields() {
            fragment.projection.push(ProjectedColumn {
                column: self.column_ref(field.name())?,
                alias: field.alias().to_string(),
            });
        }
        fragment.conditions.clone_from(&core.conditions);

        Ok(fragment)
    }
}

///
/// SourceSet
///
/// Ordered sources of one processor; insertion order is join order.
///

#[derive(Default)]
pub struct SourceSet {
    sources: Vec<Box<dyn Source>>,
}

impl SourceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.source_name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Source> {
        self.sources
            .iter()
            .map(|source| source.as_ref() as &dyn Source)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Source>> {
        self.sources.iter_mut()
    }

    pub(crate) fn push(&mut self, source: Box<dyn Source>) {
        self.sources.push(source);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Source, Error> {
        self.sources
            .iter()
            .find(|s| s.source_name() == name)
            .map(|source| &**source)
            .ok_or_else(|| Self::unknown(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Box<dyn Source>, Error> {
        self.sources
            .iter_mut()
            .find(|s| s.source_name() == name)
            .ok_or_else(|| Self::unknown(name))
    }

    /// Resolve `source::field` against the source's available fields.
    pub fn field(&self, source: &str, field: &str) -> Result<FieldSpecification, Error> {
        self.get(source)?
            .available_fields()?
            .field_specification_by_name(field)
            .cloned()
            .map_err(|_| Self::unknown_field(source, field))
    }

    /// Resolve `source::field` against the source's filter fields.
    pub fn filter_field(&self, source: &str, field: &str) -> Result<FieldSpecification, Error> {
        self.get(source)?
            .available_filter_fields()?
            .field_specification_by_name(field)
            .cloned()
            .map_err(|_| Self::unknown_field(source, field))
    }

    /// Resolve a field and register it in its source's projection.
    pub fn ensure(&mut self, source: &str, field: &str) -> Result<FieldSpecification, Error> {
        let spec = self.field(source, field)?;
        self.get_mut(source)?.ensure_field_in_source(&spec)?;

        Ok(spec)
    }

    /// Resolve a filter field and register it as referenced.
    pub fn reference_filter_field(
        &mut self,
        source: &str,
        field: &str,
    ) -> Result<FieldSpecification, Error> {
        let spec = self.filter_field(source, field)?;
        self.get_mut(source)?.reference_field(&spec)?;

        Ok(spec)
    }

    fn unknown(name: &str) -> Error {
        Error::not_found(
            ErrorOrigin::Processor,
            format!("data source '{name}' does not exist"),
        )
    }

    fn unknown_field(source: &str, field: &str) -> Error {
        Error::not_found(
            ErrorOrigin::Source,
            format!("field '{field}' does not exist in data source '{source}'"),
        )
    }
}
