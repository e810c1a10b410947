use crate::{
    plan::{ColumnRef, Condition, OperandShape, RetrievalPlan},
    value::Value,
};
use std::fmt;

// SQL-flavoured rendering for logs and diagnostics; never sent to a store.

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`.`{}`", self.table_alias, self.column)
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => write!(f, "NULL"),
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::List(items) => {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_literal(f, item)?;
            }
            write!(f, ")")
        }
        other => write!(f, "{other}"),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.op.as_sql())?;

        match (self.op.operand_shape(), &self.value) {
            (OperandShape::None, _) => Ok(()),
            (OperandShape::Pair, Value::List(items)) if items.len() == 2 => {
                write!(f, " ")?;
                write_literal(f, &items[0])?;
                write!(f, " AND ")?;
                write_literal(f, &items[1])
            }
            (_, value) => {
                write!(f, " ")?;
                write_literal(f, value)
            }
        }
    }
}

impl fmt::Display for RetrievalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.projection.is_empty() {
            write!(f, "1")?;
        }
        for (i, p) in self.projection.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} AS `{}`", p.column, p.alias)?;
        }

        write!(f, " FROM `{}` `{}`", self.from.table, self.from.alias)?;
        for join in &self.joins {
            write!(
                f,
                " {} `{}` `{}` ON {} = {}",
                join.join_type.as_sql(),
                join.table.table,
                join.table.alias,
                join.left,
                join.right
            )?;
        }

        for (i, condition) in self.conditions.iter().enumerate() {
            let keyword = if i == 0 { "WHERE" } else { "AND" };
            write!(f, " {keyword} {condition}")?;
        }

        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}, {limit}", self.offset)?;
        }

        Ok(())
    }
}
