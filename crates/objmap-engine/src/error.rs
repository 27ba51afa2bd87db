//! Error types for mapping operations.

use objmap_convert::ConversionError;
use objmap_model::{CallbackError, ModelError};
use thiserror::Error;

/// Errors from a `map` call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MappingError {
    /// The request itself is unusable (null source, no destination).
    #[error("Invalid mapping request: {0}")]
    InvalidRequest(String),

    /// A type, field, converter, condition or class mapping could not be resolved.
    #[error("Unresolved mapping: {0}")]
    UnresolvedMapping(String),

    /// Null written into a required destination field.
    #[error("Destination field '{field}' cannot be null")]
    RequiredFieldViolation { field: String },

    /// Scalar, date or enum conversion failed.
    #[error("Conversion failed: {0}")]
    ConversionFailure(#[from] ConversionError),

    /// The destination instance could not be created.
    #[error("Cannot create instance of {type_name}: {reason}")]
    BeanCreationFailure { type_name: String, reason: String },

    /// A user callback failed.
    #[error("{message}: {cause}")]
    MappingFailure {
        message: String,
        #[source]
        cause: CallbackError,
    },
}

impl MappingError {
    pub(crate) fn unresolved(message: impl Into<String>) -> Self {
        Self::UnresolvedMapping(message.into())
    }

    pub(crate) fn callback(message: impl Into<String>, cause: CallbackError) -> Self {
        Self::MappingFailure {
            message: message.into(),
            cause,
        }
    }

    /// Kind of the user callback failure behind this error, if any.
    pub fn callback_kind(&self) -> Option<&str> {
        match self {
            Self::MappingFailure { cause, .. } => Some(&cause.kind),
            _ => None,
        }
    }

    /// Kind compared against a class mapping's allowed-error list: the
    /// callback kind for callback failures, the variant name otherwise.
    pub fn kind(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::UnresolvedMapping(_) => "UnresolvedMapping",
            Self::RequiredFieldViolation { .. } => "RequiredFieldViolation",
            Self::ConversionFailure(_) => "ConversionFailure",
            Self::BeanCreationFailure { .. } => "BeanCreationFailure",
            Self::MappingFailure { cause, .. } => &cause.kind,
        }
    }
}

impl From<ModelError> for MappingError {
    fn from(err: ModelError) -> Self {
        Self::UnresolvedMapping(err.to_string())
    }
}

/// Result type for mapping operations.
pub type Result<T> = std::result::Result<T, MappingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_failures_report_their_kind() {
        let err = MappingError::callback(
            "Custom converter failed for string -> int",
            CallbackError::new("NumberFormat", "not a number: 'x'"),
        );
        assert_eq!(err.kind(), "NumberFormat");
        assert_eq!(err.callback_kind(), Some("NumberFormat"));
        insta::assert_snapshot!(
            err,
            @"Custom converter failed for string -> int: NumberFormat: not a number: 'x'"
        );
    }

    #[test]
    fn engine_errors_report_variant_kind() {
        let err = MappingError::RequiredFieldViolation {
            field: "name".to_string(),
        };
        assert_eq!(err.kind(), "RequiredFieldViolation");
        assert_eq!(err.callback_kind(), None);
        insta::assert_snapshot!(err, @"Destination field 'name' cannot be null");
    }
}
