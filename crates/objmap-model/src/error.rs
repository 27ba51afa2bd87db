//! Error types for model construction and user callbacks.

use thiserror::Error;

/// Errors raised while building or registering a mapping model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A type expression could not be parsed.
    #[error("Invalid type expression '{0}'")]
    InvalidType(String),

    /// A field expression such as `items[2]` could not be parsed.
    #[error("Invalid field expression '{0}'")]
    InvalidField(String),

    /// A field mapping was declared without a destination field.
    #[error("Field mapping in {mapping} has no destination field")]
    MissingDestination { mapping: String },

    /// Two class mappings share the same (source, destination, map-id) key.
    #[error("Duplicate class mapping for {0}")]
    DuplicateMapping(String),
}

/// Failure reported by a user-supplied callback.
///
/// Converters, conditions, custom getters and setters, create methods and
/// bean factories all fail with this type. The `kind` is what class mappings
/// compare against their allowed-error list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CallbackError {
    pub kind: String,
    pub message: String,
}

impl CallbackError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
