//! Class and enum definitions that stand in for reflection.
//!
//! A [`Schema`] describes the shape of every class the engine can read or
//! build: declared field types, the inheritance lattice, key fields used for
//! relationship matching, and named callbacks (custom getters, setters and
//! create methods).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::CallbackError;
use crate::types::TypeRef;
use crate::value::{ObjectRef, Value};

/// Custom getter: reads a logical property from an object.
pub type GetterFn = Arc<dyn Fn(&ObjectRef) -> Result<Value, CallbackError> + Send + Sync>;

/// Custom setter: writes a logical property on an object.
pub type SetterFn = Arc<dyn Fn(&ObjectRef, Value) -> Result<(), CallbackError> + Send + Sync>;

/// Create method: builds a new instance, optionally seeded from the source value.
pub type CreateFn = Arc<dyn Fn(&Value) -> Result<ObjectRef, CallbackError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    #[default]
    Concrete,
    Abstract,
    Interface,
}

/// Declared field of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub required: bool,
}

/// Named getter with the type it produces.
#[derive(Clone)]
pub struct Getter {
    pub ty: TypeRef,
    pub call: GetterFn,
}

/// Named setter with the type it accepts.
#[derive(Clone)]
pub struct Setter {
    pub ty: TypeRef,
    pub call: SetterFn,
}

/// Definition of a class, abstract class or interface.
#[derive(Clone, Default)]
pub struct ClassDef {
    pub name: String,
    pub kind: ClassKind,
    pub superclass: Option<String>,
    /// Implemented interfaces; for an interface, the interfaces it extends.
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDef>,
    /// Fields whose values define equality for relationship matching.
    pub key_fields: Vec<String>,
    getters: BTreeMap<String, Getter>,
    setters: BTreeMap<String, Setter>,
    create_methods: BTreeMap<String, CreateFn>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn abstract_class(mut self) -> Self {
        self.kind = ClassKind::Abstract;
        self
    }

    pub fn interface(mut self) -> Self {
        self.kind = ClassKind::Interface;
        self
    }

    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
            required: false,
        });
        self
    }

    pub fn required_field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
            required: true,
        });
        self
    }

    /// Add a key field; equality between instances compares these.
    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.key_fields.push(field.into());
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, ty: TypeRef, call: F) -> Self
    where
        F: Fn(&ObjectRef) -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        self.getters.insert(
            name.into(),
            Getter {
                ty,
                call: Arc::new(call),
            },
        );
        self
    }

    pub fn setter<F>(mut self, name: impl Into<String>, ty: TypeRef, call: F) -> Self
    where
        F: Fn(&ObjectRef, Value) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.setters.insert(
            name.into(),
            Setter {
                ty,
                call: Arc::new(call),
            },
        );
        self
    }

    pub fn create_method<F>(mut self, name: impl Into<String>, call: F) -> Self
    where
        F: Fn(&Value) -> Result<ObjectRef, CallbackError> + Send + Sync + 'static,
    {
        self.create_methods.insert(name.into(), Arc::new(call));
        self
    }

    pub fn is_instantiable(&self) -> bool {
        self.kind == ClassKind::Concrete
    }

    fn own_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("superclass", &self.superclass)
            .field("interfaces", &self.interfaces)
            .field("fields", &self.fields)
            .field("key_fields", &self.key_fields)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .field("create_methods", &self.create_methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Definition of an enum: an ordered set of member names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<String>,
}

impl EnumDef {
    pub fn new<S: Into<String>>(name: impl Into<String>, members: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

/// Registry of class and enum definitions.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    classes: HashMap<String, ClassDef>,
    enums: HashMap<String, EnumDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.register_class(class);
        self
    }

    pub fn with_enum(mut self, def: EnumDef) -> Self {
        self.register_enum(def);
        self
    }

    pub fn register_class(&mut self, class: ClassDef) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn register_enum(&mut self, def: EnumDef) {
        self.enums.insert(def.name.clone(), def);
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    /// Superclass chain starting at `name` itself.
    fn lineage(&self, name: &str) -> Vec<&ClassDef> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(name);
        while let Some(current) = next {
            if !visited.insert(current) {
                break;
            }
            let Some(def) = self.classes.get(current) else {
                break;
            };
            chain.push(def);
            next = def.superclass.as_deref();
        }
        chain
    }

    /// Field declared on the class or any superclass.
    pub fn field(&self, class: &str, field: &str) -> Option<&FieldDef> {
        self.lineage(class).into_iter().find_map(|c| c.own_field(field))
    }

    /// Declared type of a field, searching superclasses.
    pub fn field_type(&self, class: &str, field: &str) -> Option<&TypeRef> {
        self.field(class, field).map(|f| &f.ty)
    }

    /// All fields visible on a class, inherited ones first.
    pub fn fields(&self, class: &str) -> Vec<&FieldDef> {
        let mut out: Vec<&FieldDef> = Vec::new();
        for def in self.lineage(class).into_iter().rev() {
            for field in &def.fields {
                match out.iter_mut().find(|f| f.name == field.name) {
                    Some(existing) => *existing = field,
                    None => out.push(field),
                }
            }
        }
        out
    }

    pub fn getter(&self, class: &str, name: &str) -> Option<&Getter> {
        self.lineage(class).into_iter().find_map(|c| c.getters.get(name))
    }

    pub fn setter(&self, class: &str, name: &str) -> Option<&Setter> {
        self.lineage(class).into_iter().find_map(|c| c.setters.get(name))
    }

    pub fn create_method(&self, class: &str, name: &str) -> Option<&CreateFn> {
        self.lineage(class)
            .into_iter()
            .find_map(|c| c.create_methods.get(name))
    }

    /// Ancestors of a class: superclasses nearest first, then every
    /// interface reachable from the hierarchy, breadth-first.
    pub fn ancestors(&self, class: &str) -> Vec<String> {
        let lineage = self.lineage(class);
        let mut out: Vec<String> = lineage.iter().skip(1).map(|c| c.name.clone()).collect();
        if let Some(missing) = lineage
            .last()
            .and_then(|c| c.superclass.as_ref())
            .filter(|s| !self.classes.contains_key(s.as_str()))
        {
            out.push(missing.clone());
        }

        let mut queue: VecDeque<&str> = lineage
            .iter()
            .flat_map(|c| c.interfaces.iter().map(String::as_str))
            .collect();
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(interface) = queue.pop_front() {
            if interface == class || !seen.insert(interface) {
                continue;
            }
            out.push(interface.to_string());
            if let Some(def) = self.classes.get(interface) {
                queue.extend(def.interfaces.iter().map(String::as_str));
            }
        }
        out
    }

    /// Type ancestors for class types; empty for anything else.
    pub fn type_ancestors(&self, ty: &TypeRef) -> Vec<TypeRef> {
        match ty {
            TypeRef::Class(name) => self.ancestors(name).into_iter().map(TypeRef::Class).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether a value of type `from` may be stored where `to` is declared.
    ///
    /// Container element types are not compared; an abstract collection
    /// accepts lists and sets.
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        match (from, to) {
            (_, TypeRef::Any) => true,
            (TypeRef::Class(a), TypeRef::Class(b)) => a == b || self.ancestors(a).iter().any(|x| x == b),
            (TypeRef::List(_), TypeRef::List(_))
            | (TypeRef::Set(_), TypeRef::Set(_))
            | (TypeRef::Map(..), TypeRef::Map(..))
            | (TypeRef::List(_) | TypeRef::Set(_) | TypeRef::Collection(_), TypeRef::Collection(_)) => true,
            (TypeRef::Array(a), TypeRef::Array(b)) => a == b || (!a.is_scalar() && self.is_assignable(a, b)),
            _ => from == to,
        }
    }

    /// Turn `Class(name)` into `Enum(name)` where `name` is a declared enum,
    /// recursively through containers.
    pub fn normalize(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Class(name) if self.enums.contains_key(name) => TypeRef::Enum(name.clone()),
            TypeRef::List(e) => TypeRef::list(self.normalize(e)),
            TypeRef::Set(e) => TypeRef::set(self.normalize(e)),
            TypeRef::Array(e) => TypeRef::array(self.normalize(e)),
            TypeRef::Collection(e) => TypeRef::Collection(Box::new(self.normalize(e))),
            TypeRef::Map(k, v) => TypeRef::map(self.normalize(k), self.normalize(v)),
            other => other.clone(),
        }
    }

    /// Equality used when matching elements of non-cumulative relationships.
    ///
    /// Objects are equal when they are the same instance, or when they share
    /// a class that declares key fields and all key fields are equal.
    pub fn equivalent(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => {
                let (x, y) = (x.deproxy(), y.deproxy());
                if x.ptr_eq(&y) {
                    return true;
                }
                let class = x.class_name();
                if class != y.class_name() {
                    return false;
                }
                let keys = self.key_fields(&class);
                !keys.is_empty() && keys.iter().all(|k| self.equivalent(&x.get(k), &y.get(k)))
            }
            _ => a == b,
        }
    }

    /// Key fields declared on the class or inherited from the nearest ancestor
    /// that declares any.
    pub fn key_fields(&self, class: &str) -> Vec<String> {
        self.lineage(class)
            .into_iter()
            .find(|c| !c.key_fields.is_empty())
            .map(|c| c.key_fields.clone())
            .unwrap_or_default()
    }
}
