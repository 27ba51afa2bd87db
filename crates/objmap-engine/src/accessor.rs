//! Field access on runtime values.
//!
//! A [`FieldDescriptor`] is resolved against the runtime type of its owner
//! into a [`PropertyAccessor`]. Resolution is cached per (owner type,
//! descriptor) pair in an [`AccessorCache`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use objmap_model::{FieldDescriptor, MapRef, Schema, TypeRef, Value, split_segment};
use tracing::trace;

use crate::error::{MappingError, Result};
use crate::factory::DestBeanCreator;

/// What accessors need at read/write time.
#[derive(Debug, Clone, Copy)]
pub struct AccessEnv<'a> {
    pub schema: &'a Schema,
    pub beans: &'a DestBeanCreator,
}

/// One segment of a field path.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub index: Option<usize>,
    /// Type held by the field itself (the collection, for indexed steps).
    pub field_type: TypeRef,
    /// Type of the value this step yields.
    pub value_type: TypeRef,
}

/// Resolved access path for a field on a given owner type.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyAccessor {
    /// The owner itself.
    SelfRef { ty: TypeRef },
    /// Plain or dotted field path.
    Path { steps: Vec<Step>, ty: TypeRef, iterate: bool },
    /// Named getter and/or setter, falling back to the field for the other side.
    Method {
        getter: Option<String>,
        setter: Option<String>,
        fallback: Option<Box<PropertyAccessor>>,
        ty: TypeRef,
    },
    /// Entry in a map held by the owner, or in the owner itself when it is a map.
    MapEntry {
        container: Option<Box<PropertyAccessor>>,
        key: String,
        ty: TypeRef,
    },
}

impl PropertyAccessor {
    /// Resolve `field` on an owner of type `owner`.
    ///
    /// # Errors
    ///
    /// `UnresolvedMapping` when a path segment does not exist on its owner
    /// and no hint supplies its type, or a named accessor is unknown.
    pub fn resolve(schema: &Schema, owner: &TypeRef, field: &FieldDescriptor) -> Result<Self> {
        let declared = field.declared_type.as_ref().map(|t| schema.normalize(t));

        if let Some(key) = &field.key {
            let container = if field.is_self() {
                None
            } else {
                Some(Box::new(resolve_path(schema, owner, field, None)?))
            };
            let ty = declared
                .or_else(|| {
                    container
                        .as_ref()
                        .and_then(|c| c.field_type().element_type().cloned())
                })
                .unwrap_or(TypeRef::Any);
            return Ok(Self::MapEntry {
                container,
                key: key.clone(),
                ty,
            });
        }

        if field.is_self() {
            return Ok(Self::SelfRef {
                ty: declared.unwrap_or_else(|| owner.clone()),
            });
        }

        if let TypeRef::Map(_, value) = owner
            && !field.is_deep()
        {
            return Ok(Self::MapEntry {
                container: None,
                key: field.name.clone(),
                ty: declared.unwrap_or_else(|| (**value).clone()),
            });
        }

        if field.has_custom_methods() {
            return resolve_methods(schema, owner, field, declared);
        }

        resolve_path(schema, owner, field, declared)
    }

    /// Declared type of the value read or written.
    pub fn field_type(&self) -> &TypeRef {
        match self {
            Self::SelfRef { ty }
            | Self::Path { ty, .. }
            | Self::Method { ty, .. }
            | Self::MapEntry { ty, .. } => ty,
        }
    }

    /// Read the value from `owner`. Missing intermediates read as null.
    ///
    /// # Errors
    ///
    /// `MappingFailure` when a getter fails; `UnresolvedMapping` when a
    /// named getter does not exist on the runtime class.
    pub fn read(&self, env: AccessEnv<'_>, owner: &Value) -> Result<Value> {
        match self {
            Self::SelfRef { .. } => Ok(owner.clone()),
            Self::Path { steps, .. } => {
                let mut current = owner.clone();
                for step in steps {
                    current = read_step(&current, step);
                    if current.is_null() {
                        break;
                    }
                }
                Ok(current)
            }
            Self::Method { getter, fallback, .. } => match (getter, fallback) {
                (Some(name), _) => call_getter(env.schema, owner, name),
                (None, Some(fallback)) => fallback.read(env, owner),
                (None, None) => Ok(Value::Null),
            },
            Self::MapEntry { container, key, .. } => {
                let holder = match container {
                    Some(c) => c.read(env, owner)?,
                    None => owner.clone(),
                };
                Ok(read_field(&holder, key))
            }
        }
    }

    /// Write `value` into `owner`, creating missing intermediates of deep
    /// paths and padding indexed collections with nulls.
    ///
    /// # Errors
    ///
    /// `MappingFailure` when a setter fails, `BeanCreationFailure` when an
    /// intermediate cannot be created, `UnresolvedMapping` when the owner
    /// cannot hold the field.
    pub fn write(&self, env: AccessEnv<'_>, owner: &Value, value: Value) -> Result<()> {
        match self {
            Self::SelfRef { .. } => assign_self(owner, value),
            Self::Path { steps, iterate, .. } => write_path(env, owner, steps, value, *iterate),
            Self::Method { setter, fallback, .. } => match (setter, fallback) {
                (Some(name), _) => call_setter(env.schema, owner, name, value),
                (None, Some(fallback)) => fallback.write(env, owner, value),
                (None, None) => Err(MappingError::unresolved("no setter or field to write")),
            },
            Self::MapEntry { container, key, .. } => {
                let holder = match container {
                    None => owner.clone(),
                    Some(c) => {
                        let current = c.read(env, owner)?;
                        if current.is_null() {
                            let created = Value::Map(MapRef::new());
                            c.write(env, owner, created.clone())?;
                            created
                        } else {
                            current
                        }
                    }
                };
                set_field(&holder, key, value)
            }
        }
    }
}

fn resolve_path(
    schema: &Schema,
    owner: &TypeRef,
    field: &FieldDescriptor,
    declared: Option<TypeRef>,
) -> Result<PropertyAccessor> {
    let segments: Vec<&str> = field.name.split('.').collect();
    let mut steps = Vec::with_capacity(segments.len());
    let mut current = owner.clone();

    for (i, segment) in segments.iter().enumerate() {
        let (name, inner_index) = split_segment(segment)
            .ok_or_else(|| MappingError::unresolved(format!("invalid field path '{}'", field.name)))?;
        let last = i + 1 == segments.len();
        let index = if last { field.index } else { inner_index };
        let deep_hint = if last {
            None
        } else {
            field.deep_hint.as_ref().and_then(|h| h.get(i)).map(|t| schema.normalize(t))
        };

        let known = match &current {
            TypeRef::Class(class) => schema.field_type(class, name).map(|t| schema.normalize(t)),
            TypeRef::Map(_, value) => Some((**value).clone()),
            _ => None,
        };
        let field_type = match (known, &deep_hint, &declared) {
            (Some(t), _, _) => t,
            (None, Some(hint), _) if index.is_none() => hint.clone(),
            (None, _, Some(declared)) if last && index.is_none() => declared.clone(),
            _ => {
                return Err(MappingError::unresolved(format!(
                    "field '{name}' does not exist on {current}"
                )));
            }
        };

        let value_type = match (&deep_hint, index) {
            (Some(hint), _) => hint.clone(),
            (None, Some(_)) => field_type.element_type().cloned().unwrap_or(TypeRef::Any),
            (None, None) => field_type.clone(),
        };
        current = value_type.clone();
        steps.push(Step {
            name: name.to_string(),
            index,
            field_type,
            value_type,
        });
    }

    let last = steps.last();
    let ty = match (declared, last) {
        (Some(declared), _) => declared,
        (None, Some(step)) if step.index.is_some() => field
            .hint
            .as_ref()
            .and_then(|h| h.hint())
            .map_or_else(|| step.value_type.clone(), |h| schema.normalize(h)),
        (None, Some(step)) => step.value_type.clone(),
        (None, None) => TypeRef::Any,
    };
    Ok(PropertyAccessor::Path {
        steps,
        ty,
        iterate: field.iterate,
    })
}

fn resolve_methods(
    schema: &Schema,
    owner: &TypeRef,
    field: &FieldDescriptor,
    declared: Option<TypeRef>,
) -> Result<PropertyAccessor> {
    let class = owner
        .name()
        .ok_or_else(|| MappingError::unresolved(format!("custom accessors need a class owner, got {owner}")))?;
    let getter_type = match &field.get_method {
        Some(name) => Some(
            schema
                .getter(class, name)
                .map(|g| schema.normalize(&g.ty))
                .ok_or_else(|| MappingError::unresolved(format!("no getter '{name}' on {class}")))?,
        ),
        None => None,
    };
    let setter_type = match &field.set_method {
        Some(name) => Some(
            schema
                .setter(class, name)
                .map(|s| schema.normalize(&s.ty))
                .ok_or_else(|| MappingError::unresolved(format!("no setter '{name}' on {class}")))?,
        ),
        None => None,
    };
    let fallback = if field.get_method.is_none() || field.set_method.is_none() {
        resolve_path(schema, owner, field, declared.clone()).ok().map(Box::new)
    } else {
        None
    };
    let ty = declared
        .or(setter_type)
        .or(getter_type)
        .or_else(|| fallback.as_ref().map(|f| f.field_type().clone()))
        .unwrap_or(TypeRef::Any);
    Ok(PropertyAccessor::Method {
        getter: field.get_method.clone(),
        setter: field.set_method.clone(),
        fallback,
        ty,
    })
}

fn call_getter(schema: &Schema, owner: &Value, name: &str) -> Result<Value> {
    let object = owner
        .as_object()
        .map(objmap_model::ObjectRef::deproxy)
        .ok_or_else(|| MappingError::unresolved(format!("getter '{name}' needs an object owner")))?;
    let class = object.class_name();
    let getter = schema
        .getter(&class, name)
        .ok_or_else(|| MappingError::unresolved(format!("no getter '{name}' on {class}")))?;
    (getter.call)(&object).map_err(|e| MappingError::callback(format!("getter '{name}' on {class} failed"), e))
}

fn call_setter(schema: &Schema, owner: &Value, name: &str, value: Value) -> Result<()> {
    let object = owner
        .as_object()
        .map(objmap_model::ObjectRef::deproxy)
        .ok_or_else(|| MappingError::unresolved(format!("setter '{name}' needs an object owner")))?;
    let class = object.class_name();
    let setter = schema
        .setter(&class, name)
        .ok_or_else(|| MappingError::unresolved(format!("no setter '{name}' on {class}")))?;
    (setter.call)(&object, value).map_err(|e| MappingError::callback(format!("setter '{name}' on {class} failed"), e))
}

fn read_field(holder: &Value, name: &str) -> Value {
    match holder {
        Value::Object(o) => o.get(name),
        Value::Map(m) => m.get(&Value::from(name)).unwrap_or_default(),
        _ => Value::Null,
    }
}

fn read_step(holder: &Value, step: &Step) -> Value {
    let value = read_field(holder, &step.name);
    match step.index {
        Some(i) => value.items().and_then(|items| items.get(i)).cloned().unwrap_or_default(),
        None => value,
    }
}

fn set_field(holder: &Value, name: &str, value: Value) -> Result<()> {
    match holder {
        Value::Object(o) => {
            o.set(name, value);
            Ok(())
        }
        Value::Map(m) => {
            m.put(name, value);
            Ok(())
        }
        other => Err(MappingError::unresolved(format!(
            "cannot write field '{name}' on a value of type {}",
            other.resolved_type()
        ))),
    }
}

/// Highest index an indexed write may pad a collection up to.
pub const MAX_WRITE_INDEX: usize = 65_535;

fn set_item(collection: &mut Value, index: usize, value: Value) -> Result<()> {
    if index > MAX_WRITE_INDEX {
        return Err(MappingError::unresolved(format!(
            "index {index} exceeds the maximum writable index {MAX_WRITE_INDEX}"
        )));
    }
    let items = match collection {
        Value::List(items) | Value::Set(items) => items,
        Value::Array(array) => &mut array.items,
        other => {
            return Err(MappingError::unresolved(format!(
                "cannot index into a value of type {}",
                other.resolved_type()
            )));
        }
    };
    if items.len() <= index {
        items.resize(index + 1, Value::Null);
    }
    items[index] = value;
    Ok(())
}

fn push_item(collection: &mut Value, value: Value) -> Result<()> {
    match collection {
        Value::List(items) | Value::Set(items) => items.push(value),
        Value::Array(array) => array.items.push(value),
        other => {
            return Err(MappingError::unresolved(format!(
                "cannot append to a value of type {}",
                other.resolved_type()
            )));
        }
    }
    Ok(())
}

fn current_or_new(env: AccessEnv<'_>, holder: &Value, step: &Step) -> Result<Value> {
    let current = read_field(holder, &step.name);
    if current.is_null() {
        env.beans.instantiate(env.schema, &step.field_type)
    } else {
        Ok(current)
    }
}

/// Child of `holder` along `step`, created when missing.
fn ensure_step(env: AccessEnv<'_>, holder: &Value, step: &Step) -> Result<Value> {
    match step.index {
        None => {
            let current = read_field(holder, &step.name);
            if !current.is_null() {
                return Ok(current);
            }
            trace!(field = %step.name, ty = %step.value_type, "creating intermediate value");
            let child = env.beans.instantiate(env.schema, &step.value_type)?;
            set_field(holder, &step.name, child.clone())?;
            Ok(child)
        }
        Some(index) => {
            let mut collection = current_or_new(env, holder, step)?;
            let existing = collection
                .items()
                .and_then(|items| items.get(index))
                .cloned()
                .unwrap_or_default();
            if !existing.is_null() {
                return Ok(existing);
            }
            let child = env.beans.instantiate(env.schema, &step.value_type)?;
            set_item(&mut collection, index, child.clone())?;
            set_field(holder, &step.name, collection)?;
            Ok(child)
        }
    }
}

fn write_path(env: AccessEnv<'_>, owner: &Value, steps: &[Step], value: Value, iterate: bool) -> Result<()> {
    let (last, parents) = steps
        .split_last()
        .ok_or_else(|| MappingError::unresolved("empty field path"))?;
    let mut holder = owner.clone();
    for step in parents {
        holder = ensure_step(env, &holder, step)?;
    }
    match (last.index, iterate) {
        (Some(index), _) => {
            let mut collection = current_or_new(env, &holder, last)?;
            set_item(&mut collection, index, value)?;
            set_field(&holder, &last.name, collection)
        }
        (None, true) => {
            let mut collection = current_or_new(env, &holder, last)?;
            push_item(&mut collection, value)?;
            set_field(&holder, &last.name, collection)
        }
        (None, false) => set_field(&holder, &last.name, value),
    }
}

fn assign_self(owner: &Value, value: Value) -> Result<()> {
    match (owner, value) {
        (Value::Map(target), Value::Map(source)) => {
            if !target.ptr_eq(&source) {
                target.clear();
                for (k, v) in source.entries() {
                    target.put(k, v);
                }
            }
            Ok(())
        }
        (Value::Object(target), Value::Object(source)) => {
            if !target.deproxy().ptr_eq(&source.deproxy()) {
                for (k, v) in source.fields() {
                    target.set(k, v);
                }
            }
            Ok(())
        }
        (_, Value::Null) => Ok(()),
        (owner, value) => Err(MappingError::unresolved(format!(
            "cannot assign a {} to the {} itself",
            value.resolved_type(),
            owner.resolved_type()
        ))),
    }
}

/// Per-mapper cache of resolved accessors.
#[derive(Debug, Default)]
pub struct AccessorCache {
    entries: RwLock<HashMap<(TypeRef, FieldDescriptor), Arc<PropertyAccessor>>>,
}

impl AccessorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `field` on `owner`, reusing an earlier resolution.
    ///
    /// # Errors
    ///
    /// See [`PropertyAccessor::resolve`]. Failures are not cached.
    pub fn resolve(&self, schema: &Schema, owner: &TypeRef, field: &FieldDescriptor) -> Result<Arc<PropertyAccessor>> {
        let key = (owner.clone(), field.clone());
        if let Some(found) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(found));
        }
        let resolved = Arc::new(PropertyAccessor::resolve(schema, owner, field)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(key).or_insert(resolved)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use objmap_model::{CallbackError, ClassDef, HintContainer, ObjectRef};

    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .with_class(
                ClassDef::new("Order")
                    .field("customer", TypeRef::class("Customer"))
                    .field("lines", TypeRef::list(TypeRef::class("Line")))
                    .field("attributes", TypeRef::map(TypeRef::string(), TypeRef::string()))
                    .field("note", TypeRef::string())
                    .getter("shout", TypeRef::string(), |o: &ObjectRef| {
                        let note = o.get("note");
                        Ok(Value::from(note.as_str().unwrap_or_default().to_uppercase()))
                    })
                    .setter("whisper", TypeRef::string(), |o: &ObjectRef, v: Value| {
                        let text = v
                            .as_str()
                            .ok_or_else(|| CallbackError::new("TypeMismatch", "expected text"))?
                            .to_lowercase();
                        o.set("note", text);
                        Ok(())
                    }),
            )
            .with_class(ClassDef::new("Customer").field("name", TypeRef::string()))
            .with_class(ClassDef::new("Line").field("sku", TypeRef::string()))
    }

    fn env<'a>(schema: &'a Schema, beans: &'a DestBeanCreator) -> AccessEnv<'a> {
        AccessEnv { schema, beans }
    }

    fn order() -> Value {
        Value::Object(ObjectRef::new("Order"))
    }

    #[test]
    fn deep_write_creates_intermediates() {
        let schema = schema();
        let beans = DestBeanCreator::new();
        let field = FieldDescriptor::parse("customer.name").unwrap();
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();
        assert_eq!(accessor.field_type(), &TypeRef::string());

        let target = order();
        accessor.write(env(&schema, &beans), &target, Value::from("Ada")).unwrap();
        assert_eq!(accessor.read(env(&schema, &beans), &target).unwrap(), Value::from("Ada"));
        let customer = target.as_object().unwrap().get("customer");
        assert_eq!(customer.resolved_type(), TypeRef::class("Customer"));
    }

    #[test]
    fn indexed_write_pads_with_nulls() {
        let schema = schema();
        let beans = DestBeanCreator::new();
        let field = FieldDescriptor::parse("lines[2].sku").unwrap();
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();

        let target = order();
        accessor.write(env(&schema, &beans), &target, Value::from("X-1")).unwrap();
        let lines = target.as_object().unwrap().get("lines");
        let items = lines.items().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_null() && items[1].is_null());
        assert_eq!(items[2].as_object().unwrap().get("sku"), Value::from("X-1"));
    }

    #[test]
    fn oversized_index_is_rejected_without_padding() {
        let schema = schema();
        let beans = DestBeanCreator::new();
        let field = FieldDescriptor::parse("lines[4000000000].sku").unwrap();
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();

        let target = order();
        let err = accessor
            .write(env(&schema, &beans), &target, Value::from("X-1"))
            .unwrap_err();
        insta::assert_snapshot!(
            err,
            @"Unresolved mapping: index 4000000000 exceeds the maximum writable index 65535"
        );
        assert!(target.as_object().unwrap().get("lines").is_null());
    }

    #[test]
    fn missing_intermediates_read_as_null() {
        let schema = schema();
        let beans = DestBeanCreator::new();
        let field = FieldDescriptor::parse("customer.name").unwrap();
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();
        assert_eq!(accessor.read(env(&schema, &beans), &order()).unwrap(), Value::Null);
    }

    #[test]
    fn unknown_field_without_hint_is_unresolved() {
        let schema = schema();
        let field = FieldDescriptor::parse("customer.address.city").unwrap();
        let err = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap_err();
        insta::assert_snapshot!(err, @"Unresolved mapping: field 'address' does not exist on Customer");
    }

    #[test]
    fn deep_hint_supplies_intermediate_types() {
        let schema = schema().with_class(ClassDef::new("Address").field("city", TypeRef::string()));
        let mut field = FieldDescriptor::parse("customer.address.city").unwrap();
        field.deep_hint = Some(HintContainer::new(vec![TypeRef::class("Customer"), TypeRef::class("Address")]));
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();
        assert_eq!(accessor.field_type(), &TypeRef::string());
    }

    #[test]
    fn map_key_reads_and_writes_entries() {
        let schema = schema();
        let beans = DestBeanCreator::new();
        let mut field = FieldDescriptor::parse("attributes").unwrap();
        field.key = Some("colour".to_string());
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();
        assert_eq!(accessor.field_type(), &TypeRef::string());

        let target = order();
        accessor.write(env(&schema, &beans), &target, Value::from("red")).unwrap();
        let attributes = target.as_object().unwrap().get("attributes");
        assert_eq!(attributes.as_map().unwrap().get(&Value::from("colour")), Some(Value::from("red")));
    }

    #[test]
    fn custom_methods_fall_back_to_the_field() {
        let schema = schema();
        let beans = DestBeanCreator::new();
        let mut field = FieldDescriptor::parse("note").unwrap();
        field.get_method = Some("shout".to_string());
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();

        let target = order();
        accessor.write(env(&schema, &beans), &target, Value::from("hello")).unwrap();
        assert_eq!(accessor.read(env(&schema, &beans), &target).unwrap(), Value::from("HELLO"));

        field.get_method = None;
        field.set_method = Some("whisper".to_string());
        let accessor = PropertyAccessor::resolve(&schema, &TypeRef::class("Order"), &field).unwrap();
        accessor.write(env(&schema, &beans), &target, Value::from("QUIET")).unwrap();
        assert_eq!(target.as_object().unwrap().get("note"), Value::from("quiet"));
    }

    #[test]
    fn cache_reuses_resolutions() {
        let schema = schema();
        let cache = AccessorCache::new();
        let field = FieldDescriptor::parse("note").unwrap();
        let first = cache.resolve(&schema, &TypeRef::class("Order"), &field).unwrap();
        let second = cache.resolve(&schema, &TypeRef::class("Order"), &field).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
