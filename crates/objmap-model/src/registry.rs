//! Mapping model provider.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::{Configuration, MappingDirection};
use crate::error::{ModelError, Result};
use crate::mapping::{ClassMapping, MappingKey};
use crate::schema::{ClassKind, Schema};
use crate::types::TypeRef;

/// Source of class mappings for the engine.
///
/// Implementations are shared between threads; `register_default` must be
/// insert-if-absent so concurrent first use of a pair yields one mapping.
pub trait MappingModel: Send + Sync {
    /// Mapping for a runtime (source, destination) pair and optional map-id.
    fn find(&self, source: &TypeRef, destination: &TypeRef, map_id: Option<&str>) -> Option<Arc<ClassMapping>>;

    /// Declared mapping for an exact pair, ignoring structural defaults.
    fn find_declared(&self, source: &TypeRef, destination: &TypeRef) -> Option<Arc<ClassMapping>>;

    /// Store an on-demand mapping and return the one now registered for its key.
    fn register_default(&self, mapping: ClassMapping) -> Arc<ClassMapping>;

    fn schema(&self) -> &Schema;

    fn configuration(&self) -> &Configuration;
}

/// In-memory mapping model.
#[derive(Debug)]
pub struct ClassMappings {
    schema: Arc<Schema>,
    configuration: Configuration,
    declared: HashMap<MappingKey, Arc<ClassMapping>>,
    /// Declaration order, for deterministic fallback searches.
    order: Vec<MappingKey>,
    /// Keys whose mapping was generated as the reverse of a bidirectional one.
    generated: HashSet<MappingKey>,
    defaults: RwLock<HashMap<MappingKey, Arc<ClassMapping>>>,
}

impl ClassMappings {
    pub fn new(schema: Arc<Schema>, configuration: Configuration) -> Self {
        Self {
            schema,
            configuration,
            declared: HashMap::new(),
            order: Vec::new(),
            generated: HashSet::new(),
            defaults: RwLock::new(HashMap::new()),
        }
    }

    /// Register a declared mapping, and its reverse when bidirectional.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateMapping`] when a mapping with the same
    /// key is already declared. A reverse that collides with an explicit
    /// declaration is skipped.
    pub fn add(&mut self, mapping: ClassMapping) -> Result<()> {
        let reverse = (mapping.direction == MappingDirection::Bidirectional).then(|| mapping.reversed());
        self.insert(mapping)?;
        if let Some(mut reverse) = reverse {
            reverse.resolve(&self.schema, &self.configuration);
            let key = reverse.key();
            if !self.declared.contains_key(&key) {
                self.declared.insert(key.clone(), Arc::new(reverse));
                self.generated.insert(key.clone());
                self.order.push(key);
            }
        }
        Ok(())
    }

    fn insert(&mut self, mut mapping: ClassMapping) -> Result<()> {
        mapping.resolve(&self.schema, &self.configuration);
        let key = mapping.key();
        if self.declared.contains_key(&key) {
            // Only a generated reverse gives way to an explicit declaration.
            if !self.generated.remove(&key) {
                return Err(ModelError::DuplicateMapping(key.to_string()));
            }
        } else {
            self.order.push(key.clone());
        }
        debug!(mapping = %key, fields = mapping.field_mappings.len(), "registered class mapping");
        self.declared.insert(key, Arc::new(mapping));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    fn is_abstract(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Any => true,
            TypeRef::Class(name) => self
                .schema
                .class(name)
                .is_some_and(|c| c.kind != ClassKind::Concrete),
            _ => false,
        }
    }

    fn defaults_get(&self, key: &MappingKey) -> Option<Arc<ClassMapping>> {
        self.defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl MappingModel for ClassMappings {
    fn find(&self, source: &TypeRef, destination: &TypeRef, map_id: Option<&str>) -> Option<Arc<ClassMapping>> {
        let key = MappingKey::new(source.clone(), destination.clone(), map_id.map(str::to_string));
        if let Some(found) = self.declared.get(&key) {
            return Some(Arc::clone(found));
        }

        if let Some(id) = map_id {
            // Any mapping with this id whose types accept the runtime pair.
            return self.order.iter().find_map(|k| {
                let candidate = self.declared.get(k)?;
                (candidate.map_id.as_deref() == Some(id)
                    && self.schema.is_assignable(source, &candidate.source.ty)
                    && self.schema.is_assignable(&candidate.destination.ty, destination))
                .then(|| Arc::clone(candidate))
            });
        }

        if self.is_abstract(destination) {
            // Requested an abstract destination: use a declared concrete one.
            let concrete = self.order.iter().find_map(|k| {
                let candidate = self.declared.get(k)?;
                (candidate.map_id.is_none()
                    && candidate.source.ty == *source
                    && candidate.destination.ty != *destination
                    && self.schema.is_assignable(&candidate.destination.ty, destination))
                .then(|| Arc::clone(candidate))
            });
            if concrete.is_some() {
                return concrete;
            }
        }

        self.defaults_get(&key)
    }

    fn find_declared(&self, source: &TypeRef, destination: &TypeRef) -> Option<Arc<ClassMapping>> {
        self.declared
            .get(&MappingKey::new(source.clone(), destination.clone(), None))
            .cloned()
    }

    fn register_default(&self, mapping: ClassMapping) -> Arc<ClassMapping> {
        let key = mapping.key();
        let mut defaults = self.defaults.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(defaults.entry(key).or_insert_with(|| Arc::new(mapping)))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn configuration(&self) -> &Configuration {
        &self.configuration
    }
}
