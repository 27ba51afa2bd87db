//! User-supplied converters and mapping conditions.
//!
//! Plain closures implement the traits, so most converters are written
//! inline:
//!
//! ```
//! use objmap_convert::ConverterHandle;
//! use objmap_model::{CallbackError, TypeRef, Value};
//!
//! let upper = ConverterHandle::plain(
//!     |_existing: &Value, source: &Value, _dest: &TypeRef, _src: &TypeRef| {
//!         match source {
//!             Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
//!             other => Err(CallbackError::new("IllegalArgument", format!("{other:?}"))),
//!         }
//!     },
//! );
//! let out = upper
//!     .invoke(&Value::Null, &Value::from("ada"), &TypeRef::string(), &TypeRef::string(), None)
//!     .unwrap();
//! assert_eq!(out, Value::from("ADA"));
//! ```

use std::fmt;
use std::sync::Arc;

use objmap_model::{CallbackError, TypeRef, Value};

/// Converts a source value into a destination value.
///
/// `existing` is the value currently held by the destination field (or the
/// destination object itself for class-level conversion), null when absent.
pub trait CustomConverter: Send + Sync {
    fn convert(
        &self,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
    ) -> Result<Value, CallbackError>;
}

impl<F> CustomConverter for F
where
    F: Fn(&Value, &Value, &TypeRef, &TypeRef) -> Result<Value, CallbackError> + Send + Sync,
{
    fn convert(
        &self,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
    ) -> Result<Value, CallbackError> {
        self(existing, source, destination_type, source_type)
    }
}

/// Converter that also receives the field's converter parameter.
pub trait ConfigurableConverter: Send + Sync {
    fn convert(
        &self,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
        parameter: Option<&str>,
    ) -> Result<Value, CallbackError>;
}

impl<F> ConfigurableConverter for F
where
    F: Fn(&Value, &Value, &TypeRef, &TypeRef, Option<&str>) -> Result<Value, CallbackError> + Send + Sync,
{
    fn convert(
        &self,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
        parameter: Option<&str>,
    ) -> Result<Value, CallbackError> {
        self(existing, source, destination_type, source_type, parameter)
    }
}

/// Callback into the running mapper.
pub trait NestedMapper {
    /// Map `source` into a new instance of `destination_type`.
    fn map_nested(
        &self,
        source: &Value,
        destination_type: &TypeRef,
        map_id: Option<&str>,
    ) -> Result<Value, CallbackError>;
}

/// Converter that hands parts of its source back to the mapper.
///
/// Nested calls run with their own visited set, so cycles that pass through
/// the converter are not shared with the outer call.
pub trait MapperAwareConverter: Send + Sync {
    fn convert(
        &self,
        mapper: &dyn NestedMapper,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
        parameter: Option<&str>,
    ) -> Result<Value, CallbackError>;
}

impl<F> MapperAwareConverter for F
where
    F: Fn(&dyn NestedMapper, &Value, &Value, &TypeRef, &TypeRef, Option<&str>) -> Result<Value, CallbackError>
        + Send
        + Sync,
{
    fn convert(
        &self,
        mapper: &dyn NestedMapper,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
        parameter: Option<&str>,
    ) -> Result<Value, CallbackError> {
        self(mapper, existing, source, destination_type, source_type, parameter)
    }
}

/// Registered converter of any flavour.
#[derive(Clone)]
pub enum ConverterHandle {
    Plain(Arc<dyn CustomConverter>),
    Configurable(Arc<dyn ConfigurableConverter>),
    MapperAware(Arc<dyn MapperAwareConverter>),
}

impl ConverterHandle {
    pub fn plain(converter: impl CustomConverter + 'static) -> Self {
        Self::Plain(Arc::new(converter))
    }

    pub fn configurable(converter: impl ConfigurableConverter + 'static) -> Self {
        Self::Configurable(Arc::new(converter))
    }

    pub fn mapper_aware(converter: impl MapperAwareConverter + 'static) -> Self {
        Self::MapperAware(Arc::new(converter))
    }

    /// Run the converter. Plain converters ignore `parameter`.
    ///
    /// # Errors
    ///
    /// Whatever the converter reports. Mapper-aware converters fail with
    /// kind `IllegalState`; use [`ConverterHandle::invoke_with`] for them.
    pub fn invoke(
        &self,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
        parameter: Option<&str>,
    ) -> Result<Value, CallbackError> {
        match self {
            Self::Plain(c) => c.convert(existing, source, destination_type, source_type),
            Self::Configurable(c) => c.convert(existing, source, destination_type, source_type, parameter),
            Self::MapperAware(_) => Err(CallbackError::new(
                "IllegalState",
                "mapper-aware converter invoked without a mapper",
            )),
        }
    }

    /// Run the converter with `mapper` available for nested mapping.
    ///
    /// # Errors
    ///
    /// Whatever the converter reports.
    pub fn invoke_with(
        &self,
        mapper: &dyn NestedMapper,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
        parameter: Option<&str>,
    ) -> Result<Value, CallbackError> {
        match self {
            Self::MapperAware(c) => c.convert(mapper, existing, source, destination_type, source_type, parameter),
            other => other.invoke(existing, source, destination_type, source_type, parameter),
        }
    }
}

impl fmt::Debug for ConverterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("ConverterHandle::Plain"),
            Self::Configurable(_) => f.write_str("ConverterHandle::Configurable"),
            Self::MapperAware(_) => f.write_str("ConverterHandle::MapperAware"),
        }
    }
}

/// Decides whether a field mapping runs at all.
pub trait MappingCondition: Send + Sync {
    fn evaluate(
        &self,
        source: &Value,
        destination: &Value,
        source_type: &TypeRef,
        destination_type: &TypeRef,
    ) -> Result<bool, CallbackError>;
}

impl<F> MappingCondition for F
where
    F: Fn(&Value, &Value, &TypeRef, &TypeRef) -> Result<bool, CallbackError> + Send + Sync,
{
    fn evaluate(
        &self,
        source: &Value,
        destination: &Value,
        source_type: &TypeRef,
        destination_type: &TypeRef,
    ) -> Result<bool, CallbackError> {
        self(source, destination, source_type, destination_type)
    }
}
