use crate::value::Value;
use std::cmp::Ordering;

/// Store-style comparison used when evaluating plan conditions.
///
/// Numbers compare numerically across `Int`, `Float` and numeric text;
/// text compares case-insensitively. `Null` never orders.
/// Returns `None` for mismatched or non-orderable variants.
#[must_use]
pub fn loose_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Text(a), Value::Text(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            let a = left.as_bool()?;
            let b = right.as_bool()?;
            Some(a.cmp(&b))
        }
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::List(_), _) | (_, Value::List(_)) => None,
        _ => {
            let a = left.as_f64()?;
            let b = right.as_f64()?;
            a.partial_cmp(&b)
        }
    }
}

/// Equality under [`loose_cmp`]; `Null` is never equal to anything.
#[must_use]
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    loose_cmp(left, right) == Some(Ordering::Equal)
}
