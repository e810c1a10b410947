use crate::{
    config::ConfigError, processor::RegistryError, spec::FieldExistsError, store::StoreError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured engine error with a stable classification.
/// Assembly and configuration failures abort the whole request; store
/// failures are carried unchanged in `detail`.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    #[source]
    pub detail: Option<ErrorDetail>,
}

impl Error {
    /// Construct an error without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a configuration error for a specific origin.
    pub fn configuration(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, origin, message)
    }

    /// Construct a programmer-error invariant violation.
    pub fn invariant(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, origin, message)
    }

    /// Construct an undefined-reference error.
    pub fn not_found(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, origin, message)
    }

    /// Construct a missing-configuration-key error.
    pub(crate) fn missing_key(origin: ErrorOrigin, owner: &str, key: &str) -> Self {
        Self::configuration(
            origin,
            format!("{owner}: required configuration key '{key}' is missing"),
        )
    }

    /// Re-classify an error as a configuration failure, keeping its origin.
    ///
    /// Used at assembly boundaries where an unresolved reference means the
    /// stored definition is broken rather than the engine.
    #[must_use]
    pub fn into_configuration(self) -> Self {
        match self.class {
            ErrorClass::NotFound | ErrorClass::DuplicateField => Self {
                class: ErrorClass::Configuration,
                ..self
            },
            _ => self,
        }
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.class, ErrorClass::Configuration)
    }

    #[must_use]
    pub const fn is_duplicate_field(&self) -> bool {
        matches!(self.class, ErrorClass::DuplicateField)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`Error`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),
    #[error("{0}")]
    FieldExists(FieldExistsError),
    #[error("{0}")]
    Config(ConfigError),
}

impl From<FieldExistsError> for Error {
    fn from(err: FieldExistsError) -> Self {
        Self {
            class: ErrorClass::DuplicateField,
            origin: ErrorOrigin::Specification,
            message: err.to_string(),
            detail: Some(ErrorDetail::FieldExists(err)),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self {
            class: ErrorClass::Execution,
            origin: ErrorOrigin::Store,
            message: err.to_string(),
            detail: Some(ErrorDetail::Store(err)),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self {
            class: ErrorClass::Configuration,
            origin: ErrorOrigin::Config,
            message: err.to_string(),
            detail: Some(ErrorDetail::Config(err)),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Self::new(err.class(), ErrorOrigin::Registry, err.to_string())
    }
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Configuration,
    DuplicateField,
    NotFound,
    Execution,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::DuplicateField => "duplicate_field",
            Self::NotFound => "not_found",
            Self::Execution => "execution",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Specification,
    Catalog,
    Source,
    Join,
    Filter,
    Output,
    Processor,
    Registry,
    Store,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Specification => "specification",
            Self::Catalog => "catalog",
            Self::Source => "source",
            Self::Join => "join",
            Self::Filter => "filter",
            Self::Output => "output",
            Self::Processor => "processor",
            Self::Registry => "registry",
            Self::Store => "store",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
