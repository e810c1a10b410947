use crate::{
    plan::{ColumnRef, CompareOp, Condition, JoinType, RetrievalPlan},
    store::{EntityStore, NULL, RawRow, StoreError},
    value::{Value, loose_cmp, loose_eq},
};
use indexmap::IndexMap;
use std::{cell::Cell, cmp::Ordering, collections::BTreeMap};

type StoredRow = IndexMap<String, Value>;

///
/// Table
///

#[derive(Clone, Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<StoredRow>,
}

///
/// InMemoryStore
///
/// Reference store that evaluates plans over in-memory tables with
/// nested-loop joins. Counts executions so callers can assert the
/// single-fetch contract.
///

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: BTreeMap<String, Table>,
    failure: Option<String>,
    executions: Cell<usize>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table; each row lists values in `columns` order.
    #[must_use]
    pub fn with_rows(mut self, table: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let columns: Vec<String> = columns.iter().map(ToString::to_string).collect();
        let rows = rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect();
        self.tables
            .insert(table.to_string(), Table { columns, rows });
        self
    }

    /// Make every execution fail with [`StoreError::Unavailable`].
    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of plans executed so far.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.executions.get()
    }

    fn table(&self, name: &str) -> Result<&Table, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }
}

impl EntityStore for InMemoryStore {
    fn execute(&self, plan: &RetrievalPlan) -> Result<Vec<RawRow>, StoreError> {
        self.executions.set(self.executions.get() + 1);
        if let Some(message) = &self.failure {
            return Err(StoreError::Unavailable(message.clone()));
        }

        let from = self.table(&plan.from.table)?;
        let mut joined: Vec<Joined<'_>> = from
            .rows
            .iter()
            .map(|row| Joined::start(&plan.from.alias, from, row))
            .collect();

        for join in &plan.joins {
            let right = self.table(&join.table.table)?;
            if !right.columns.contains(&join.right.column) {
                return Err(StoreError::UnknownColumn {
                    alias: join.table.alias.clone(),
                    column: join.right.column.clone(),
                });
            }

            let mut next = Vec::with_capacity(joined.len());
            for current in joined {
                let left = current.value(&join.left)?;
                let mut matched = false;
                for row in &right.rows {
                    let candidate = row.get(&join.right.column).unwrap_or(&NULL);
                    if loose_eq(&left, candidate) {
                        matched = true;
                        next.push(current.extend(&join.table.alias, right, Some(row)));
                    }
                }
                if !matched && join.join_type == JoinType::Left {
                    next.push(current.extend(&join.table.alias, right, None));
                }
            }
            joined = next;
        }

        let mut kept = Vec::new();
        for current in joined {
            if matches_all(&current, &plan.conditions)? {
                kept.push(current);
            }
        }

        let page = kept
            .into_iter()
            .skip(plan.offset)
            .take(plan.limit.unwrap_or(usize::MAX));

        let mut rows = Vec::new();
        for current in page {
            let mut row = RawRow::new();
            for projected in &plan.projection {
                row.insert(projected.alias.clone(), current.value(&projected.column)?);
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

///
/// Joined
///
/// One candidate result row: a stored row (or a left-join miss) per alias.
///

#[derive(Clone)]
struct Joined<'a> {
    parts: Vec<(&'a str, &'a Table, Option<&'a StoredRow>)>,
}

impl<'a> Joined<'a> {
    fn start(alias: &'a str, table: &'a Table, row: &'a StoredRow) -> Self {
        Self {
            parts: vec![(alias, table, Some(row))],
        }
    }

    fn extend(&self, alias: &'a str, table: &'a Table, row: Option<&'a StoredRow>) -> Self {
        let mut next = self.clone();
        next.parts.push((alias, table, row));
        next
    }

    fn value(&self, column: &ColumnRef) -> Result<Value, StoreError> {
        let (_, table, row) = self
            .parts
            .iter()
            .find(|(alias, ..)| *alias == column.table_alias)
            .ok_or_else(|| StoreError::UnknownAlias(column.table_alias.clone()))?;

        if !table.columns.contains(&column.column) {
            return Err(StoreError::UnknownColumn {
                alias: column.table_alias.clone(),
                column: column.column.clone(),
            });
        }

        Ok(row
            .and_then(|row| row.get(&column.column))
            .cloned()
            .unwrap_or_default())
    }
}

fn matches_all(row: &Joined<'_>, conditions: &[Condition]) -> Result<bool, StoreError> {
    for condition in conditions {
        let actual = row.value(&condition.column)?;
        if !eval_condition(&actual, condition.op, &condition.value) {
            return Ok(false);
        }
    }

    Ok(true)
}

// Null only satisfies IS NULL; every other operator rejects it.
fn eval_condition(actual: &Value, op: CompareOp, operand: &Value) -> bool {
    let ordered = |accept: fn(Ordering) -> bool| loose_cmp(actual, operand).is_some_and(accept);
    let in_list = || {
        operand
            .as_list()
            .is_some_and(|items| items.iter().any(|item| loose_eq(actual, item)))
    };

    match op {
        CompareOp::IsNull => actual.is_null(),
        CompareOp::IsNotNull => !actual.is_null(),
        _ if actual.is_null() => false,
        CompareOp::Eq => loose_eq(actual, operand),
        CompareOp::Ne => loose_cmp(actual, operand).is_some_and(Ordering::is_ne),
        CompareOp::Lt => ordered(Ordering::is_lt),
        CompareOp::Lte => ordered(Ordering::is_le),
        CompareOp::Gt => ordered(Ordering::is_gt),
        CompareOp::Gte => ordered(Ordering::is_ge),
        CompareOp::In => in_list(),
        CompareOp::NotIn => operand.as_list().is_some() && !in_list(),
        CompareOp::Like => like(actual, operand),
        CompareOp::NotLike => operand.as_text().is_some() && !like(actual, operand),
        CompareOp::Between => match operand.as_list() {
            Some([low, high]) => {
                loose_cmp(actual, low).is_some_and(Ordering::is_ge)
                    && loose_cmp(actual, high).is_some_and(Ordering::is_le)
            }
            _ => false,
        },
    }
}

fn like(actual: &Value, pattern: &Value) -> bool {
    let Some(pattern) = pattern.as_text() else {
        return false;
    };
    let text: Vec<char> = actual.to_string().to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    like_match(&text, &pattern)
}

// `%` matches any run of characters, `_` exactly one. Only the latest `%`
// is ever retried, which keeps matching linear in practice.
pub(super) fn like_match(text: &[char], pattern: &[char]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut retry: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p).copied() {
            Some('%') => {
                retry = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match retry {
                Some((wildcard, start)) => {
                    retry = Some((wildcard, start + 1));
                    p = wildcard + 1;
                    t = start + 1;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}
