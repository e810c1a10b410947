//! Engine-wide settings shared by every processor built from one registry.

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error as ThisError;

/// Default number of rows returned when a request sets no limit.
pub const DEFAULT_LIMIT: usize = 10;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read engine config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine config: {0}")]
    Invalid(String),
}

///
/// EngineConfig
///
/// Loaded from TOML. All keys are optional:
///
/// ```toml
/// base_url = "https://crm.example.org"
/// contact_view_path = "civicrm/contact/view"
/// date_format = "%d-%m-%Y"
/// default_limit = 25   # 0 disables the limit
/// ```
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub base_url: String,
    pub contact_view_path: String,
    pub date_format: String,
    pub default_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            contact_view_path: "civicrm/contact/view".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;

        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&input)
    }

    /// Limit applied when a request does not carry one.
    #[must_use]
    pub const fn effective_default_limit(&self) -> Option<usize> {
        match self.default_limit {
            0 => None,
            n => Some(n),
        }
    }

    /// Absolute or relative URL of the contact view page.
    #[must_use]
    pub fn contact_view_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.contact_view_path.trim_start_matches('/');

        format!("{base}/{path}")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.contact_view_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "contact_view_path must not be empty".to_string(),
            ));
        }
        if self.date_format.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "date_format must not be empty".to_string(),
            ));
        }
        if !is_valid_date_format(&self.date_format) {
            return Err(ConfigError::Invalid(format!(
                "date_format '{}' is not a valid strftime pattern",
                self.date_format
            )));
        }

        Ok(())
    }
}

/// Whether `format` parses as a chrono strftime pattern.
pub(crate) fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty document should parse");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.effective_default_limit(), Some(DEFAULT_LIMIT));
    }

    #[test]
    fn zero_limit_disables_paging() {
        let config =
            EngineConfig::from_toml_str("default_limit = 0").expect("zero limit should parse");
        assert_eq!(config.effective_default_limit(), None);
    }

    #[test]
    fn contact_view_url_joins_base_and_path() {
        let config = EngineConfig::from_toml_str(
            "base_url = \"https://crm.example.org/\"\ncontact_view_path = \"/civicrm/contact/view\"",
        )
        .expect("url settings should parse");
        assert_eq!(
            config.contact_view_url(),
            "https://crm.example.org/civicrm/contact/view"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("colour = \"blue\"")
            .expect_err("unknown key should fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn empty_date_format_is_invalid() {
        let err = EngineConfig::from_toml_str("date_format = \"\"")
            .expect_err("empty format should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_date_format_is_invalid() {
        let err = EngineConfig::from_toml_str("date_format = \"%Y-%Q\"")
            .expect_err("malformed format should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
