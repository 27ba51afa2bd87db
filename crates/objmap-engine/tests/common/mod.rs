#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use objmap_engine::{MappingEvent, MappingEventListener, MappingEventType};
use objmap_model::{ClassDef, EnumDef, ObjectRef, Schema, TypeRef, Value};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test writer; `RUST_LOG=objmap_engine=debug`
/// shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

pub fn people_schema() -> Schema {
    Schema::new()
        .with_enum(EnumDef::new("Status", ["ACTIVE", "INACTIVE"]))
        .with_enum(EnumDef::new("State", ["ACTIVE", "INACTIVE"]))
        .with_class(
            ClassDef::new("Address")
                .field("street", TypeRef::string())
                .field("city", TypeRef::string()),
        )
        .with_class(
            ClassDef::new("AddressDto")
                .field("street", TypeRef::string())
                .field("city", TypeRef::string()),
        )
        .with_class(
            ClassDef::new("Person")
                .field("name", TypeRef::string())
                .field("age", TypeRef::string())
                .field("status", TypeRef::enumeration("Status"))
                .field("address", TypeRef::class("Address")),
        )
        .with_class(
            ClassDef::new("PersonDto")
                .field("fullName", TypeRef::string())
                .field("age", TypeRef::int())
                .field("status", TypeRef::enumeration("State"))
                .field("address", TypeRef::class("AddressDto")),
        )
}

pub fn pet_schema() -> Schema {
    Schema::new()
        .with_class(
            ClassDef::new("Pet")
                .field("name", TypeRef::string())
                .field("age", TypeRef::int()),
        )
        .with_class(
            ClassDef::new("PetDto")
                .field("name", TypeRef::string())
                .field("age", TypeRef::int())
                .field("origin", TypeRef::string()),
        )
}

pub fn address(street: &str, city: &str) -> ObjectRef {
    ObjectRef::with_fields("Address", [("street", street), ("city", city)])
}

pub fn pet(name: &str, age: i32) -> Value {
    let pet = ObjectRef::new("Pet");
    pet.set("name", name);
    pet.set("age", age);
    Value::Object(pet)
}

/// Field of an object value; panics when `value` is not an object.
pub fn field(value: &Value, name: &str) -> Value {
    value
        .as_object()
        .unwrap_or_else(|| panic!("expected an object, got {value:?}"))
        .get(name)
}

pub fn class_of(value: &Value) -> String {
    value.as_object().map(ObjectRef::class_name).unwrap_or_default()
}

/// Listener that records event types in arrival order.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<MappingEventType>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<MappingEventType> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl MappingEventListener for Recorder {
    fn on_event(&self, event: &MappingEvent<'_>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.event_type);
    }
}
