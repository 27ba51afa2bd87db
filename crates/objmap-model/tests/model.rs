use std::sync::Arc;

use objmap_model::{
    ClassDef, ClassMapping, ClassMappings, Configuration, EnumDef, FieldMappingBuilder,
    FieldMappingKind, MapRef, MappingBuilder, MappingModel, ObjectRef, RelationshipType, Schema,
    TypeRef, Value,
};

fn schema() -> Schema {
    Schema::new()
        .with_enum(EnumDef::new("Status", ["ACTIVE", "RETIRED"]))
        .with_class(
            ClassDef::new("Employee")
                .field("name", TypeRef::string())
                .field("status", TypeRef::class("Status"))
                .field("tags", "list<string>".parse().unwrap()),
        )
        .with_class(
            ClassDef::new("EmployeeDto")
                .field("name", TypeRef::string())
                .field("status", TypeRef::class("Status"))
                .field("labels", "string[]".parse().unwrap()),
        )
}

#[test]
fn registration_normalizes_enum_types_and_resolves_options() {
    let config = Configuration::default().with_relationship_type(RelationshipType::NonCumulative);
    let mut model = ClassMappings::new(Arc::new(schema()), config);
    model
        .add(
            MappingBuilder::new("Employee", "EmployeeDto")
                .map_null(false)
                .field_with(
                    FieldMappingBuilder::new()
                        .a("tags")
                        .b("labels")
                        .b_hint("Status")
                        .relationship(RelationshipType::Cumulative),
                )
                .build()
                .unwrap(),
        )
        .unwrap();

    let mapping = model
        .find(&TypeRef::class("Employee"), &TypeRef::class("EmployeeDto"), None)
        .unwrap();
    assert!(!mapping.options.map_null);
    assert_eq!(mapping.options.relationship, RelationshipType::NonCumulative);

    let labels = &mapping.field_mappings[0];
    assert_eq!(
        labels.destination.hint.as_ref().and_then(|h| h.hint()),
        Some(&TypeRef::enumeration("Status"))
    );
    assert!(!labels.is_non_cumulative(&mapping.options));

    // wildcard fills in the same-name fields after the declared one
    let keys = mapping.field_keys();
    assert_eq!(keys, vec!["labels", "name", "status"]);
}

#[test]
fn structural_default_between_maps_maps_self() {
    let schema = schema();
    let mapping = ClassMapping::structural_default(
        &schema,
        &Configuration::default(),
        TypeRef::map(TypeRef::Any, TypeRef::Any),
        TypeRef::map(TypeRef::Any, TypeRef::Any),
    );
    assert_eq!(mapping.field_mappings.len(), 1);
    assert!(mapping.field_mappings[0].is_self_to_self());
    assert_eq!(mapping.field_mappings[0].kind, FieldMappingKind::MapBacked);
}

#[test]
fn structural_default_from_object_to_map_uses_source_fields() {
    let schema = schema();
    let mapping = ClassMapping::structural_default(
        &schema,
        &Configuration::default(),
        TypeRef::class("Employee"),
        TypeRef::map(TypeRef::string(), TypeRef::Any),
    );
    assert_eq!(mapping.field_keys(), vec!["name", "status", "tags"]);
    assert!(
        mapping
            .field_mappings
            .iter()
            .all(|fm| fm.kind == FieldMappingKind::MapBacked)
    );
}

#[test]
fn object_graph_handles_share_state() {
    let employee = ObjectRef::with_fields("Employee", [("name", Value::from("Ada"))]);
    let alias = employee.clone();
    alias.set("name", "Grace");
    assert_eq!(employee.get("name"), Value::from("Grace"));

    let meta = MapRef::from_entries([("k", 1)]);
    employee.set("meta", meta.clone());
    meta.put("k", 2);
    let stored = employee.get("meta");
    assert_eq!(stored.as_map().and_then(|m| m.get(&Value::from("k"))), Some(Value::Int(2)));
}
