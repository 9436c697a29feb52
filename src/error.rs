//! Library error types.
//!
//! Only fatal conditions live here. Localized anomalies (dangling references,
//! empty trees, unresolved interfaces) are reported through diagnostics
//! records instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForestError>;

#[derive(Error, Debug)]
pub enum ForestError {
    /// A seed from the inventory cannot be turned into an entity.
    #[error("Invalid seed '{name}': {message}")]
    InvalidSeed { name: String, message: String },

    /// Two class seeds share one qualified name.
    #[error("Duplicate class '{0}' in inventory")]
    DuplicateClass(String),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        field: Option<String>,
    },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ForestError {
    pub fn invalid_seed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSeed {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

impl From<bincode::Error> for ForestError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ForestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
