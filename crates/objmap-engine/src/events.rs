//! Mapping lifecycle events.
//!
//! Listeners are registered on the mapper and called synchronously, in
//! registration order, on the mapping thread.

use objmap_model::{ClassMapping, FieldMapping, Value};

/// Point in a mapping run at which an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingEventType {
    MappingStarted,
    PreWritingDestValue,
    PostWritingDestValue,
    MappingFinished,
}

/// Event passed to listeners.
#[derive(Debug, Clone, Copy)]
pub struct MappingEvent<'a> {
    pub event_type: MappingEventType,
    pub class_mapping: &'a ClassMapping,
    /// Set for the write events only.
    pub field_mapping: Option<&'a FieldMapping>,
    pub source: &'a Value,
    /// Null for `MappingStarted` when a new destination is being created.
    pub destination: &'a Value,
    /// Value being written, for the write events.
    pub written_value: Option<&'a Value>,
}

/// Receives mapping lifecycle events.
pub trait MappingEventListener: Send + Sync {
    fn on_event(&self, event: &MappingEvent<'_>);
}

impl<F> MappingEventListener for F
where
    F: Fn(&MappingEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &MappingEvent<'_>) {
        self(event);
    }
}
