//! Per-call mapping state.

use std::collections::HashMap;

use objmap_model::{Schema, TypeRef, Value};

#[derive(Debug)]
struct Visit {
    destination_type: TypeRef,
    destination: Value,
}

#[derive(Debug)]
struct Visited {
    /// Held so the handle address stays unique for the whole call.
    _source: Value,
    visits: Vec<Visit>,
}

/// Source instances already mapped during one top-level call, with the
/// destinations produced for them. Keyed by handle identity, so cyclic and
/// shared sub-graphs map to shared destinations. Registered sources are kept
/// alive until the context is dropped.
#[derive(Debug, Default)]
pub struct MappingContext {
    visited: HashMap<usize, Visited>,
}

impl MappingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` maps to `destination`. A second destination of
    /// the same type replaces the first. Values without identity are ignored.
    pub fn register(&mut self, source: &Value, destination: &Value) {
        let Some(id) = source.identity() else {
            return;
        };
        let destination_type = destination.resolved_type();
        let visits = &mut self
            .visited
            .entry(id)
            .or_insert_with(|| Visited {
                _source: source.clone(),
                visits: Vec::new(),
            })
            .visits;
        visits.retain(|v| v.destination_type != destination_type);
        visits.push(Visit {
            destination_type,
            destination: destination.clone(),
        });
    }

    /// Destination already produced for `source` whose type is
    /// `destination_type`, or failing that assignable to it.
    pub fn mapped_value(&self, schema: &Schema, source: &Value, destination_type: &TypeRef) -> Option<Value> {
        let visits = &self.visited.get(&source.identity()?)?.visits;
        visits
            .iter()
            .find(|v| v.destination_type == *destination_type)
            .or_else(|| {
                visits
                    .iter()
                    .find(|v| schema.is_assignable(&v.destination_type, destination_type))
            })
            .map(|v| v.destination.clone())
    }

    /// Number of distinct source instances seen.
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
