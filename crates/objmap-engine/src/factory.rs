//! Destination instance creation.
//!
//! Strategy order: a named bean factory, then a create method declared on
//! the class, then default construction. Scalars are produced by converting
//! the source value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use objmap_convert::PrimitiveConverter;
use objmap_model::{CallbackError, MapRef, ObjectRef, Schema, TypeRef, Value};

use crate::error::{MappingError, Result};

/// User factory for destination instances.
pub trait BeanFactory: Send + Sync {
    fn create_bean(
        &self,
        source: &Value,
        source_type: &TypeRef,
        target_type: &TypeRef,
        bean_id: Option<&str>,
    ) -> std::result::Result<Value, CallbackError>;
}

impl<F> BeanFactory for F
where
    F: Fn(&Value, &TypeRef, &TypeRef, Option<&str>) -> std::result::Result<Value, CallbackError> + Send + Sync,
{
    fn create_bean(
        &self,
        source: &Value,
        source_type: &TypeRef,
        target_type: &TypeRef,
        bean_id: Option<&str>,
    ) -> std::result::Result<Value, CallbackError> {
        self(source, source_type, target_type, bean_id)
    }
}

/// Everything needed to create one destination instance.
#[derive(Debug, Clone, Copy)]
pub struct BeanCreationDirective<'a> {
    pub source: &'a Value,
    pub source_type: &'a TypeRef,
    /// Type named by the class mapping.
    pub destination_type: &'a TypeRef,
    /// Type requested at the call site; used when the mapped type cannot be
    /// instantiated.
    pub runtime_destination_type: &'a TypeRef,
    pub factory: Option<&'a str>,
    pub factory_id: Option<&'a str>,
    pub create_method: Option<&'a str>,
}

impl BeanCreationDirective<'_> {
    /// Type that will actually be created.
    pub fn target_type(&self, schema: &Schema) -> &TypeRef {
        let instantiable = match self.destination_type {
            TypeRef::Class(name) => schema.class(name).is_some_and(|c| c.is_instantiable()),
            TypeRef::Any => false,
            _ => true,
        };
        if instantiable {
            self.destination_type
        } else {
            self.runtime_destination_type
        }
    }
}

/// Creates destination instances.
#[derive(Default)]
pub struct DestBeanCreator {
    factories: HashMap<String, Arc<dyn BeanFactory>>,
}

impl DestBeanCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: impl BeanFactory + 'static) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Create the instance described by `directive`.
    ///
    /// # Errors
    ///
    /// `BeanCreationFailure` when the factory or create method is missing or
    /// fails, or the target cannot be default-constructed.
    pub fn create(&self, schema: &Schema, directive: &BeanCreationDirective<'_>) -> Result<Value> {
        let target = directive.target_type(schema);

        if let Some(name) = directive.factory {
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| failure(target, format!("bean factory '{name}' is not registered")))?;
            let value = factory
                .create_bean(directive.source, directive.source_type, target, directive.factory_id)
                .map_err(|e| failure(target, e.to_string()))?;
            if value.is_null() {
                return Err(failure(target, format!("bean factory '{name}' returned null")));
            }
            return Ok(value);
        }

        if let Some(method) = directive.create_method {
            let class = target
                .name()
                .ok_or_else(|| failure(target, format!("create method '{method}' needs a class type")))?;
            let create = schema
                .create_method(class, method)
                .ok_or_else(|| failure(target, format!("no create method '{method}' on {class}")))?;
            return create(directive.source)
                .map(Value::Object)
                .map_err(|e| failure(target, e.to_string()));
        }

        if target.is_scalar() {
            return PrimitiveConverter::new(schema)
                .convert(directive.source, target)
                .map_err(|e| failure(target, e.to_string()));
        }
        self.instantiate(schema, target)
    }

    /// Default-construct `ty`. Declared fields of a new object start as null;
    /// containers start empty.
    ///
    /// # Errors
    ///
    /// `BeanCreationFailure` for abstract classes, interfaces, enums,
    /// scalars, `any` and unknown classes.
    pub fn instantiate(&self, schema: &Schema, ty: &TypeRef) -> Result<Value> {
        match ty {
            TypeRef::Class(name) => {
                let def = schema
                    .class(name)
                    .ok_or_else(|| failure(ty, "class is not defined in the schema"))?;
                if !def.is_instantiable() {
                    return Err(failure(ty, "abstract classes and interfaces cannot be instantiated"));
                }
                let object = ObjectRef::new(name.clone());
                for field in schema.fields(name) {
                    object.set(field.name.clone(), Value::Null);
                }
                Ok(Value::Object(object))
            }
            TypeRef::Map(..) => Ok(Value::Map(MapRef::new())),
            TypeRef::List(_) | TypeRef::Collection(_) => Ok(Value::List(Vec::new())),
            TypeRef::Set(_) => Ok(Value::Set(Vec::new())),
            TypeRef::Array(component) => Ok(Value::array((**component).clone(), Vec::new())),
            TypeRef::Scalar(_) | TypeRef::Enum(_) | TypeRef::Any => {
                Err(failure(ty, "type has no default instance"))
            }
        }
    }
}

impl fmt::Debug for DestBeanCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestBeanCreator")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn failure(ty: &TypeRef, reason: impl Into<String>) -> MappingError {
    MappingError::BeanCreationFailure {
        type_name: ty.to_string(),
        reason: reason.into(),
    }
}
