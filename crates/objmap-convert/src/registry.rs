//! Registries of converters and conditions.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use objmap_model::{CallbackRef, ConverterDescription, Schema, TypeRef};
use tracing::debug;

use crate::custom::{ConverterHandle, MappingCondition};

/// Converter applied globally to a pair of types.
#[derive(Debug, Clone)]
struct GlobalConverter {
    class_a: TypeRef,
    class_b: TypeRef,
    handle: ConverterHandle,
}

/// Outcome of a converter lookup for a pair of types.
#[derive(Debug, Clone)]
pub enum ConverterMatch {
    Found(ConverterHandle),
    /// A description matched but names a converter that is not registered.
    Unregistered(CallbackRef),
    None,
}

/// Converters addressed by id, by type name, or by a pair of value types.
#[derive(Default)]
pub struct ConverterRegistry {
    by_id: HashMap<String, ConverterHandle>,
    by_type: HashMap<String, ConverterHandle>,
    global: Vec<GlobalConverter>,
    /// Index into `global` for each (source, destination) pair seen so far.
    pair_cache: RwLock<HashMap<(TypeRef, TypeRef), Option<usize>>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter instance under an id.
    pub fn register_id(&mut self, id: impl Into<String>, converter: ConverterHandle) {
        self.by_id.insert(id.into(), converter);
    }

    /// Register a converter under a type name, for references by type.
    pub fn register_type(&mut self, type_name: impl Into<String>, converter: ConverterHandle) {
        self.by_type.insert(type_name.into(), converter);
    }

    /// Register a converter for every value pair of `class_a` and `class_b`,
    /// in either direction.
    pub fn register_global(&mut self, class_a: TypeRef, class_b: TypeRef, converter: ConverterHandle) {
        self.global.push(GlobalConverter {
            class_a,
            class_b,
            handle: converter,
        });
        self.pair_cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn resolve(&self, reference: &CallbackRef) -> Option<ConverterHandle> {
        match reference {
            CallbackRef::Id(id) => self.by_id.get(id).cloned(),
            CallbackRef::Type(name) => self.by_type.get(name).cloned(),
        }
    }

    pub fn by_id(&self, id: &str) -> Option<ConverterHandle> {
        self.by_id.get(id).cloned()
    }

    /// Converter for a (source, destination) pair: descriptions scoped to
    /// the class mapping first, then global registrations.
    pub fn find(
        &self,
        schema: &Schema,
        scoped: &[ConverterDescription],
        source: &TypeRef,
        destination: &TypeRef,
    ) -> ConverterMatch {
        if let Some(description) = scoped
            .iter()
            .find(|d| pair_matches(schema, &d.class_a, &d.class_b, source, destination))
        {
            return match self.resolve(&description.converter) {
                Some(handle) => ConverterMatch::Found(handle),
                None => ConverterMatch::Unregistered(description.converter.clone()),
            };
        }
        if self.global.is_empty() {
            return ConverterMatch::None;
        }

        let key = (source.clone(), destination.clone());
        let cached = self
            .pair_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied();
        let index = match cached {
            Some(index) => index,
            None => {
                let index = self
                    .global
                    .iter()
                    .position(|g| pair_matches(schema, &g.class_a, &g.class_b, source, destination));
                debug!(source = %source, destination = %destination, found = index.is_some(), "cached converter lookup");
                self.pair_cache
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(key)
                    .or_insert(index);
                index
            }
        };
        match index.and_then(|i| self.global.get(i)) {
            Some(g) => ConverterMatch::Found(g.handle.clone()),
            None => ConverterMatch::None,
        }
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("by_id", &self.by_id.keys().collect::<Vec<_>>())
            .field("by_type", &self.by_type.keys().collect::<Vec<_>>())
            .field("global", &self.global.len())
            .finish_non_exhaustive()
    }
}

/// Whether a converter declared for (`a`, `b`) applies to values flowing
/// from `source` to `destination`, in either orientation.
fn pair_matches(schema: &Schema, a: &TypeRef, b: &TypeRef, source: &TypeRef, destination: &TypeRef) -> bool {
    let fits = |actual: &TypeRef, declared: &TypeRef| {
        actual == declared || (!actual.is_any() && schema.is_assignable(actual, declared))
    };
    (fits(destination, a) && fits(source, b)) || (fits(source, a) && fits(destination, b))
}

/// Conditions addressed by id or by type name.
#[derive(Default)]
pub struct ConditionRegistry {
    by_id: HashMap<String, Arc<dyn MappingCondition>>,
    by_type: HashMap<String, Arc<dyn MappingCondition>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_id(&mut self, id: impl Into<String>, condition: impl MappingCondition + 'static) {
        self.by_id.insert(id.into(), Arc::new(condition));
    }

    pub fn register_type(&mut self, type_name: impl Into<String>, condition: impl MappingCondition + 'static) {
        self.by_type.insert(type_name.into(), Arc::new(condition));
    }

    pub fn resolve(&self, reference: &CallbackRef) -> Option<Arc<dyn MappingCondition>> {
        match reference {
            CallbackRef::Id(id) => self.by_id.get(id).cloned(),
            CallbackRef::Type(name) => self.by_type.get(name).cloned(),
        }
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("by_id", &self.by_id.keys().collect::<Vec<_>>())
            .field("by_type", &self.by_type.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use objmap_model::{CallbackError, ClassDef, Value};

    use super::*;

    fn constant(text: &'static str) -> ConverterHandle {
        ConverterHandle::plain(
            move |_: &Value, _: &Value, _: &TypeRef, _: &TypeRef| -> Result<Value, CallbackError> {
                Ok(Value::from(text))
            },
        )
    }

    fn run(m: ConverterMatch) -> Option<Value> {
        match m {
            ConverterMatch::Found(h) => h
                .invoke(&Value::Null, &Value::Null, &TypeRef::Any, &TypeRef::Any, None)
                .ok(),
            _ => None,
        }
    }

    fn schema() -> Schema {
        Schema::new()
            .with_class(ClassDef::new("Money"))
            .with_class(ClassDef::new("Euro").extends("Money"))
    }

    #[test]
    fn global_converter_matches_either_direction() {
        let mut registry = ConverterRegistry::new();
        registry.register_global(TypeRef::class("Money"), TypeRef::string(), constant("money"));
        let schema = schema();

        let forward = registry.find(&schema, &[], &TypeRef::class("Euro"), &TypeRef::string());
        assert_eq!(run(forward), Some(Value::from("money")));
        let backward = registry.find(&schema, &[], &TypeRef::string(), &TypeRef::class("Money"));
        assert_eq!(run(backward), Some(Value::from("money")));
        let unrelated = registry.find(&schema, &[], &TypeRef::int(), &TypeRef::string());
        assert!(matches!(unrelated, ConverterMatch::None));
    }

    #[test]
    fn scoped_descriptions_win_over_global() {
        let mut registry = ConverterRegistry::new();
        registry.register_global(TypeRef::class("Money"), TypeRef::string(), constant("global"));
        registry.register_type("MoneyFormatter", constant("scoped"));
        let scoped = [ConverterDescription {
            class_a: TypeRef::class("Money"),
            class_b: TypeRef::string(),
            converter: CallbackRef::Type("MoneyFormatter".into()),
        }];
        let found = registry.find(&schema(), &scoped, &TypeRef::class("Money"), &TypeRef::string());
        assert_eq!(run(found), Some(Value::from("scoped")));
    }

    #[test]
    fn unregistered_reference_is_reported() {
        let registry = ConverterRegistry::new();
        let scoped = [ConverterDescription {
            class_a: TypeRef::class("Money"),
            class_b: TypeRef::string(),
            converter: CallbackRef::Id("missing".into()),
        }];
        let found = registry.find(&schema(), &scoped, &TypeRef::string(), &TypeRef::class("Money"));
        assert!(matches!(found, ConverterMatch::Unregistered(CallbackRef::Id(id)) if id == "missing"));
    }

    #[test]
    fn conditions_resolve_by_id_and_type() {
        let mut registry = ConditionRegistry::new();
        let always = |_: &Value, _: &Value, _: &TypeRef, _: &TypeRef| -> Result<bool, CallbackError> { Ok(true) };
        registry.register_id("always", always);
        registry.register_type("acme.Always", always);
        assert!(registry.resolve(&CallbackRef::Id("always".into())).is_some());
        assert!(registry.resolve(&CallbackRef::Type("acme.Always".into())).is_some());
        assert!(registry.resolve(&CallbackRef::Id("never".into())).is_none());
    }
}
