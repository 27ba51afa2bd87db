//! Ancestor class mappings applied before a class mapping's own fields.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use objmap_model::{ClassMapping, MappingModel, TypeRef};
use tracing::debug;

type SuperMappings = Arc<Vec<Arc<ClassMapping>>>;

/// Cache of declared mappings between the ancestors of a runtime
/// (source, destination) pair, most general first.
#[derive(Debug, Default)]
pub struct SuperTypeCache {
    entries: RwLock<HashMap<(TypeRef, TypeRef), SuperMappings>>,
}

impl SuperTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared mappings between `source` or its ancestors and `destination`
    /// or its ancestors, excluding the exact pair itself.
    pub fn super_mappings(&self, model: &dyn MappingModel, source: &TypeRef, destination: &TypeRef) -> SuperMappings {
        let key = (destination.clone(), source.clone());
        if let Some(found) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(found);
        }

        let schema = model.schema();
        let chain = |ty: &TypeRef| {
            let mut types = vec![ty.clone()];
            types.extend(schema.type_ancestors(ty));
            types
        };
        let (sources, destinations) = (chain(source), chain(destination));

        let mut found = Vec::new();
        for src in &sources {
            for dest in &destinations {
                if src == source && dest == destination {
                    continue;
                }
                if let Some(mapping) = model.find_declared(src, dest) {
                    found.push(mapping);
                }
            }
        }
        found.reverse();
        debug!(source = %source, destination = %destination, count = found.len(), "resolved ancestor mappings");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(found)))
    }
}

#[cfg(test)]
mod tests {
    use objmap_model::{ClassDef, ClassMappings, Configuration, MappingBuilder, Schema};

    use super::*;

    #[test]
    fn ancestors_are_listed_most_general_first() {
        let schema = Schema::new()
            .with_class(ClassDef::new("Entity").abstract_class().field("id", TypeRef::int()))
            .with_class(ClassDef::new("Animal").abstract_class().extends("Entity"))
            .with_class(ClassDef::new("Dog").extends("Animal"))
            .with_class(ClassDef::new("EntityDto").abstract_class().field("id", TypeRef::int()))
            .with_class(ClassDef::new("AnimalDto").abstract_class().extends("EntityDto"))
            .with_class(ClassDef::new("DogDto").extends("AnimalDto"));
        let mut model = ClassMappings::new(Arc::new(schema), Configuration::default());
        for (a, b) in [("Entity", "EntityDto"), ("Animal", "AnimalDto"), ("Dog", "DogDto")] {
            model.add(MappingBuilder::new(a, b).one_way().build().unwrap()).unwrap();
        }

        let cache = SuperTypeCache::new();
        let found = cache.super_mappings(&model, &TypeRef::class("Dog"), &TypeRef::class("DogDto"));
        let pairs: Vec<String> = found.iter().map(|m| m.key().to_string()).collect();
        assert_eq!(pairs, vec!["Entity -> EntityDto", "Animal -> AnimalDto"]);

        let again = cache.super_mappings(&model, &TypeRef::class("Dog"), &TypeRef::class("DogDto"));
        assert!(Arc::ptr_eq(&found, &again));
    }
}
