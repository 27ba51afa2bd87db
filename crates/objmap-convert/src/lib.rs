//! Value conversion for the objmap engine.
//!
//! [`PrimitiveConverter`] handles scalars, dates and enum members. Custom
//! converters and conditions are looked up through [`ConverterRegistry`] and
//! [`ConditionRegistry`].

pub mod custom;
pub mod error;
pub mod primitive;
pub mod registry;

pub use custom::{
    ConfigurableConverter, ConverterHandle, CustomConverter, MapperAwareConverter, MappingCondition, NestedMapper,
};
pub use error::{ConversionError, Result};
pub use primitive::{DEFAULT_DATE_FORMAT, PrimitiveConverter};
pub use registry::{ConditionRegistry, ConverterMatch, ConverterRegistry};
