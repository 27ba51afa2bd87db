//! Runtime values of a dynamically-typed object graph.
//!
//! Objects and maps are shared handles with identity, so graphs may contain
//! cycles. Lists, sets and arrays are plain values owned by whoever holds
//! them; writing one into an object field replaces the previous value.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDateTime;

use crate::types::{ScalarKind, TypeRef};

/// Member of a declared enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: String,
    pub member: String,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            member: member.into(),
        }
    }
}

/// Array value; arrays remember their component type.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub component: TypeRef,
    pub items: Vec<Value>,
}

/// A single runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
    Date(NaiveDateTime),
    Enum(EnumValue),
    Object(ObjectRef),
    Map(MapRef),
    List(Vec<Value>),
    Set(Vec<Value>),
    Array(ArrayValue),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn array(component: TypeRef, items: Vec<Value>) -> Self {
        Self::Array(ArrayValue { component, items })
    }

    /// Build a set value, dropping duplicates while keeping first-seen order.
    pub fn set_of(items: impl IntoIterator<Item = Value>) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Self::Set(out)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Type of the value as observed at runtime. Null has type `any`;
    /// collection element types are not tracked except for arrays.
    pub fn runtime_type(&self) -> TypeRef {
        match self {
            Self::Null => TypeRef::Any,
            Self::Bool(_) => TypeRef::Scalar(ScalarKind::Bool),
            Self::Byte(_) => TypeRef::Scalar(ScalarKind::Byte),
            Self::Short(_) => TypeRef::Scalar(ScalarKind::Short),
            Self::Int(_) => TypeRef::Scalar(ScalarKind::Int),
            Self::Long(_) => TypeRef::Scalar(ScalarKind::Long),
            Self::Float(_) => TypeRef::Scalar(ScalarKind::Float),
            Self::Double(_) => TypeRef::Scalar(ScalarKind::Double),
            Self::Char(_) => TypeRef::Scalar(ScalarKind::Char),
            Self::Str(_) => TypeRef::Scalar(ScalarKind::String),
            Self::Date(_) => TypeRef::Scalar(ScalarKind::Date),
            Self::Enum(e) => TypeRef::Enum(e.type_name.clone()),
            Self::Object(o) => TypeRef::Class(o.class_name()),
            Self::Map(_) => TypeRef::map(TypeRef::Any, TypeRef::Any),
            Self::List(_) => TypeRef::list(TypeRef::Any),
            Self::Set(_) => TypeRef::set(TypeRef::Any),
            Self::Array(a) => TypeRef::array(a.component.clone()),
        }
    }

    /// Runtime type after unwrapping proxies.
    pub fn resolved_type(&self) -> TypeRef {
        match self {
            Self::Object(o) => TypeRef::Class(o.deproxy().class_name()),
            other => other.runtime_type(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Elements of a list, set or array.
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            Self::Array(a) => Some(&a.items),
            _ => None,
        }
    }

    pub fn into_items(self) -> Option<Vec<Value>> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            Self::Array(a) => Some(a.items),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Array(_))
    }

    /// Address of the shared handle, for objects and maps.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::Object(o) => Some(o.identity()),
            Self::Map(m) => Some(m.identity()),
            _ => None,
        }
    }

    /// Unwrap proxy objects down to their target.
    pub fn deproxy(self) -> Self {
        match self {
            Self::Object(o) => Self::Object(o.deproxy()),
            other => other,
        }
    }

    /// Structural equality that follows object and map handles.
    ///
    /// Cycles are handled coinductively: a pair of handles already being
    /// compared is assumed equal.
    pub fn deep_eq(&self, other: &Value) -> bool {
        deep_eq_inner(self, other, &mut HashSet::new())
    }
}

fn deep_eq_inner(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let (x, y) = (x.deproxy(), y.deproxy());
            if !seen.insert((x.identity(), y.identity())) {
                return true;
            }
            if x.class_name() != y.class_name() {
                return false;
            }
            let (fx, fy) = (x.fields(), y.fields());
            fx.len() == fy.len()
                && fx
                    .iter()
                    .zip(fy.iter())
                    .all(|((kx, vx), (ky, vy))| kx == ky && deep_eq_inner(vx, vy, seen))
        }
        (Value::Map(x), Value::Map(y)) => {
            if !seen.insert((x.identity(), y.identity())) {
                return true;
            }
            let (ex, ey) = (x.entries(), y.entries());
            ex.len() == ey.len()
                && ex.iter().all(|(k, vx)| {
                    ey.iter()
                        .find(|(ky, _)| ky == k)
                        .is_some_and(|(_, vy)| deep_eq_inner(vx, vy, seen))
                })
        }
        (Value::List(x), Value::List(y)) | (Value::Set(x), Value::Set(y)) => items_eq(x, y, seen),
        (Value::Array(x), Value::Array(y)) => {
            x.component == y.component && items_eq(&x.items, &y.items, seen)
        }
        _ => a == b,
    }
}

fn items_eq(x: &[Value], y: &[Value], seen: &mut HashSet<(usize, usize)>) -> bool {
    x.len() == y.len() && x.iter().zip(y).all(|(a, b)| deep_eq_inner(a, b, seen))
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => Str,
    NaiveDateTime => Date,
    EnumValue => Enum,
    ObjectRef => Object,
    MapRef => Map,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

struct ObjectData {
    class: String,
    fields: BTreeMap<String, Value>,
    target: Option<ObjectRef>,
}

/// Shared handle to an object instance.
///
/// Cloning the handle shares the instance. A proxy handle forwards all
/// field access to its target and reports a distinct class name until
/// [`ObjectRef::deproxy`] is applied.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<ObjectData>>);

impl ObjectRef {
    pub fn new(class: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(ObjectData {
            class: class.into(),
            fields: BTreeMap::new(),
            target: None,
        })))
    }

    pub fn with_fields<K, V>(class: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let object = Self::new(class);
        for (name, value) in fields {
            object.set(name, value);
        }
        object
    }

    /// Wrap `target` in a transparent proxy.
    pub fn proxy(target: &ObjectRef) -> Self {
        let target = target.deproxy();
        Self(Arc::new(RwLock::new(ObjectData {
            class: format!("{}$Proxy", target.class_name()),
            fields: BTreeMap::new(),
            target: Some(target),
        })))
    }

    fn read(&self) -> RwLockReadGuard<'_, ObjectData> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ObjectData> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_proxy(&self) -> bool {
        self.read().target.is_some()
    }

    pub fn deproxy(&self) -> ObjectRef {
        let mut current = self.clone();
        loop {
            let next = current.read().target.clone();
            match next {
                Some(target) => current = target,
                None => return current,
            }
        }
    }

    pub fn class_name(&self) -> String {
        self.read().class.clone()
    }

    /// Field value, or null when the field has never been set.
    pub fn get(&self, field: &str) -> Value {
        let target = self.read().target.clone();
        match target {
            Some(target) => target.get(field),
            None => self.read().fields.get(field).cloned().unwrap_or_default(),
        }
    }

    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) {
        let target = self.read().target.clone();
        match target {
            Some(target) => target.set(field, value),
            None => {
                self.write().fields.insert(field.into(), value.into());
            }
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.deproxy().read().fields.contains_key(field)
    }

    /// Snapshot of all fields, in name order.
    pub fn fields(&self) -> Vec<(String, Value)> {
        self.deproxy()
            .read()
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.class_name(), self.identity())
    }
}

/// Shared handle to an insertion-ordered map.
#[derive(Clone, Default)]
pub struct MapRef(Arc<RwLock<Vec<(Value, Value)>>>);

impl MapRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let map = Self::new();
        for (k, v) in entries {
            map.put(k, v);
        }
        map
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(Value, Value)>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(Value, Value)>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Insert or replace; a replaced key keeps its position.
    pub fn put(&self, key: impl Into<Value>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        let mut entries = self.write();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        let mut entries = self.write();
        let index = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(index).1)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for MapRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map[{}]@{:#x}", self.len(), self.identity())
    }
}
