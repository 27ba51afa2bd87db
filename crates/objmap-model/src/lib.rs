//! Data model for the objmap mapping engine.
//!
//! - [`Value`], [`ObjectRef`] and [`MapRef`]: live object graphs.
//! - [`Schema`]: class and enum definitions.
//! - [`ClassMapping`] / [`FieldMapping`]: what maps to what.
//! - [`ClassMappings`]: the [`MappingModel`] the engine consults.

pub mod builder;
pub mod config;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod schema;
pub mod types;
pub mod value;

pub use builder::{FieldMappingBuilder, MappingBuilder};
pub use config::{Configuration, CopyByReference, MappingDirection, RelationshipType};
pub use error::{CallbackError, ModelError, Result};
pub use mapping::{
    CallbackRef, ClassMapping, ClassOptions, ClassSide, ConverterDescription, FieldDescriptor,
    FieldMapping, FieldMappingKind, FieldOptions, HintContainer, MappingKey, OptionOverrides,
    SELF_KEYWORD, split_segment,
};
pub use registry::{ClassMappings, MappingModel};
pub use schema::{ClassDef, ClassKind, CreateFn, EnumDef, FieldDef, Getter, GetterFn, Schema, Setter, SetterFn};
pub use types::{ScalarKind, Shape, TypeRef};
pub use value::{ArrayValue, EnumValue, MapRef, ObjectRef, Value};
