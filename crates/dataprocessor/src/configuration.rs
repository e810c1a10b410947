//! Key-value configuration attached to sources, joins, filters and outputs.

use crate::{
    error::{Error, ErrorOrigin},
    plan::CompareOp,
    value::Value,
};

/// JSON-shaped configuration mapping as stored in processor definitions.
pub type Configuration = serde_json::Map<String, serde_json::Value>;

/// Required non-empty string key.
pub(crate) fn required_str<'a>(
    configuration: &'a Configuration,
    key: &str,
    owner: &str,
    origin: ErrorOrigin,
) -> Result<&'a str, Error> {
    optional_str(configuration, key, owner, origin)?
        .ok_or_else(|| Error::missing_key(origin, owner, key))
}

/// Optional string key; present but non-string (or blank) is an error.
pub(crate) fn optional_str<'a>(
    configuration: &'a Configuration,
    key: &str,
    owner: &str,
    origin: ErrorOrigin,
) -> Result<Option<&'a str>, Error> {
    match configuration.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(Error::configuration(
            origin,
            format!("{owner}: configuration key '{key}' must be a string"),
        )),
    }
}

/// Optional operator key.
pub(crate) fn optional_op(
    configuration: &Configuration,
    key: &str,
    owner: &str,
    origin: ErrorOrigin,
) -> Result<Option<CompareOp>, Error> {
    match configuration.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(raw) => serde_json::from_value(raw.clone()).map(Some).map_err(|_| {
            Error::configuration(
                origin,
                format!("{owner}: configuration key '{key}' is not a known operator ({raw})"),
            )
        }),
    }
}

/// Optional runtime value key; objects are rejected.
pub(crate) fn optional_value(
    configuration: &Configuration,
    key: &str,
    owner: &str,
    origin: ErrorOrigin,
) -> Result<Value, Error> {
    match configuration.get(key) {
        None => Ok(Value::Null),
        Some(raw) => Value::from_json(raw).ok_or_else(|| {
            Error::configuration(
                origin,
                format!("{owner}: configuration key '{key}' must be a scalar or a list"),
            )
        }),
    }
}

/// Optional list of strings.
pub(crate) fn optional_str_list(
    configuration: &Configuration,
    key: &str,
    owner: &str,
    origin: ErrorOrigin,
) -> Result<Vec<String>, Error> {
    let invalid = || {
        Error::configuration(
            origin,
            format!("{owner}: configuration key '{key}' must be a list of strings"),
        )
    };

    match configuration.get(key) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

/// Optional nested mapping.
pub(crate) fn optional_map<'a>(
    configuration: &'a Configuration,
    key: &str,
    owner: &str,
    origin: ErrorOrigin,
) -> Result<Option<&'a Configuration>, Error> {
    match configuration.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(Error::configuration(
            origin,
            format!("{owner}: configuration key '{key}' must be a mapping"),
        )),
    }
}
