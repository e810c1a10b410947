//! Retrieval plan handed to the external entity store.
//!
//! A plan is assembled from one [`SourceFragment`] per source, in source
//! order. The first fragment is the `FROM` table; each later fragment is
//! attached through the join its source was added with.

mod explain;

#[cfg(test)]
mod tests;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

///
/// ColumnRef
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ColumnRef {
    pub table_alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table_alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table_alias: table_alias.into(),
            column: column.into(),
        }
    }
}

///
/// TableRef
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
        }
    }
}

///
/// JoinType
///
/// `Left` keeps primary rows without a match; their joined columns are `Null`.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

impl JoinType {
    /// Parse the platform's join-type tag (`INNER`, `left`, `LEFT OUTER`, …).
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "INNER" => Some(Self::Inner),
            "LEFT" | "LEFT OUTER" => Some(Self::Left),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

///
/// JoinClause
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: TableRef,
    /// Column on an already-joined table.
    pub left: ColumnRef,
    /// Column on `table`.
    pub right: ColumnRef,
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NOT LIKE")]
    NotLike,
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

///
/// OperandShape
/// What a comparison operator expects on its right-hand side.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperandShape {
    None,
    Single,
    List,
    Pair,
}

impl CompareOp {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Between => "BETWEEN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    #[must_use]
    pub const fn operand_shape(self) -> OperandShape {
        match self {
            Self::IsNull | Self::IsNotNull => OperandShape::None,
            Self::In | Self::NotIn => OperandShape::List,
            Self::Between => OperandShape::Pair,
            _ => OperandShape::Single,
        }
    }

    /// Whether `value` has the shape this operator expects.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self.operand_shape(), value) {
            (OperandShape::None, _) => true,
            (OperandShape::List, Value::List(items)) => !items.is_empty(),
            (OperandShape::Pair, Value::List(items)) => items.len() == 2,
            (OperandShape::Single, v) => !matches!(v, Value::List(_) | Value::Null),
            _ => false,
        }
    }
}

///
/// Condition
///

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: ColumnRef,
    pub op: CompareOp,
    pub value: Value,
}

///
/// ProjectedColumn
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectedColumn {
    pub column: ColumnRef,
    pub alias: String,
}

///
/// SourceFragment
///
/// What a single source contributes: its table, implicit joins to its
/// custom-group tables, the columns it projects and its conditions.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SourceFragment {
    pub table: TableRef,
    pub joins: Vec<JoinClause>,
    pub projection: Vec<ProjectedColumn>,
    pub conditions: Vec<Condition>,
}

impl SourceFragment {
    #[must_use]
    pub const fn new(table: TableRef) -> Self {
        Self {
            table,
            joins: Vec::new(),
            projection: Vec::new(),
            conditions: Vec::new(),
        }
    }
}

///
/// RetrievalPlan
///

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalPlan {
    pub from: TableRef,
    pub joins: Vec<JoinClause>,
    pub projection: Vec<ProjectedColumn>,
    pub conditions: Vec<Condition>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl RetrievalPlan {
    /// Aliases of the projected columns, in projection order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.projection.iter().map(|p| p.alias.as_str())
    }

    /// First projected alias that more than one column is fetched under.
    #[must_use]
    pub fn duplicate_column_alias(&self) -> Option<&str> {
        first_duplicate(self.aliases())
    }

    /// First table alias bound by more than one table.
    #[must_use]
    pub fn duplicate_table_alias(&self) -> Option<&str> {
        first_duplicate(
            std::iter::once(self.from.alias.as_str())
                .chain(self.joins.iter().map(|join| join.table.alias.as_str())),
        )
    }
}

fn first_duplicate<'a>(mut aliases: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();

    aliases.find(|alias| !seen.insert(*alias))
}

///
/// PlanBuilder
///

#[derive(Debug)]
pub struct PlanBuilder {
    plan: RetrievalPlan,
}

impl PlanBuilder {
    /// Start a plan from the primary source.
    #[must_use]
    pub fn new(primary: SourceFragment) -> Self {
        let SourceFragment {
            table,
            joins,
            projection,
            conditions,
        } = primary;

        Self {
            plan: RetrievalPlan {
                from: table,
                joins,
                projection,
                conditions,
                limit: None,
                offset: 0,
            },
        }
    }

    /// Attach a secondary source through `join`; its implicit joins follow.
    #[must_use]
    pub fn join(mut self, join: JoinClause, fragment: SourceFragment) -> Self {
        self.plan.joins.push(join);
        self.plan.joins.extend(fragment.joins);
        self.plan.projection.extend(fragment.projection);
        self.plan.conditions.extend(fragment.conditions);
        self
    }

    #[must_use]
    pub const fn page(mut self, limit: Option<usize>, offset: usize) -> Self {
        self.plan.limit = limit;
        self.plan.offset = offset;
        self
    }

    #[must_use]
    pub fn build(self) -> RetrievalPlan {
        self.plan
    }
}
