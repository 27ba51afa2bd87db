//! Error types for value conversion.

use objmap_model::TypeRef;
use thiserror::Error;

/// Errors from scalar, date and enum conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConversionError {
    /// No conversion exists between the two types.
    #[error("Cannot convert {value} from {from} to {to}")]
    Unsupported {
        value: String,
        from: TypeRef,
        to: TypeRef,
    },

    /// The value does not fit in the target type.
    #[error("Value {value} is out of range for {to}")]
    OutOfRange { value: String, to: TypeRef },

    /// Text could not be parsed as the target type.
    #[error("Cannot parse '{value}' as {to}")]
    Parse { value: String, to: TypeRef },

    /// Enum member lookup failed.
    #[error("'{member}' is not a member of enum {enum_name}")]
    UnknownEnumMember { enum_name: String, member: String },
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;
