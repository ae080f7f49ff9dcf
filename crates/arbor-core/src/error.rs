//! Error types for arbor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error shared by every arbor crate.
///
/// Storage and filesystem failures are converted here with `From` so that
/// callers can use `?` and decide later whether to report or propagate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArborError {
    /// Lookup by id failed
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Filesystem failure
    #[error("IO error: {message}")]
    Io { message: String },

    /// Document could not be encoded or decoded
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// The conversation tree is not a well-formed forest
    #[error("Invalid history structure: {0}")]
    InvalidStructure(String),

    /// Provider adapter failure (transport, decoding, ...)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    ToolExecution(String),
}

impl ArborError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::ToolExecution(message.into())
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    pub fn is_invalid_structure(&self) -> bool {
        matches!(self, Self::InvalidStructure(_))
    }
}

impl From<std::io::Error> for ArborError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ArborError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ArborError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ArborError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error, used at the migration framework boundary
impl From<anyhow::Error> for ArborError {
    fn from(err: anyhow::Error) -> Self {
        Self::Migration(format!("{:#}", err))
    }
}

/// A type alias for `Result<T, ArborError>`.
pub type Result<T> = std::result::Result<T, ArborError>;
