mod common;

use objmap_engine::{BeanMapper, DestBeanCreator, Mapper};
use objmap_model::{
    ClassDef, FieldMappingBuilder, MapRef, MappingBuilder, ObjectRef, RelationshipType, Schema, TypeRef, Value,
};

use common::{address, class_of, field, init_tracing, people_schema, pet, pet_schema};

fn holder(class: &str, name: &str, value: Value) -> Value {
    let object = ObjectRef::new(class);
    object.set(name, value);
    Value::Object(object)
}

fn strings(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::from(*s)).collect()
}

#[test]
fn list_to_set_drops_duplicates() {
    let schema = Schema::new()
        .with_class(ClassDef::new("Bag").field("items", TypeRef::list(TypeRef::string())))
        .with_class(ClassDef::new("BagDto").field("items", TypeRef::set(TypeRef::string())));
    let mapper = BeanMapper::builder(schema).build().unwrap();

    let bag = holder("Bag", "items", Value::List(strings(&["a", "b", "a"])));
    let dto = mapper.map_new(&bag, &TypeRef::class("BagDto"), None).unwrap();
    assert_eq!(field(&dto, "items"), Value::Set(strings(&["a", "b"])));
}

#[test]
fn list_elements_are_mapped_to_element_type() {
    init_tracing();
    let schema = pet_schema()
        .with_class(ClassDef::new("Shelter").field("pets", TypeRef::list(TypeRef::class("Pet"))))
        .with_class(ClassDef::new("ShelterDto").field("pets", TypeRef::list(TypeRef::class("PetDto"))));
    let mapper = BeanMapper::builder(schema).build().unwrap();

    let shelter = holder("Shelter", "pets", Value::List(vec![pet("Rex", 3), pet("Tom", 5)]));
    let dto = mapper.map_new(&shelter, &TypeRef::class("ShelterDto"), None).unwrap();

    let pets = field(&dto, "pets").into_items().unwrap();
    assert_eq!(pets.len(), 2);
    assert!(pets.iter().all(|p| class_of(p) == "PetDto"));
    assert_eq!(field(&pets[1], "name"), Value::from("Tom"));
    assert_eq!(field(&pets[1], "age"), Value::Int(5));
}

fn codes_schema() -> Schema {
    Schema::new()
        .with_class(ClassDef::new("Codes").field("codes", TypeRef::array(TypeRef::int())))
        .with_class(ClassDef::new("CodeList").field("codes", TypeRef::list(TypeRef::string())))
        .with_class(ClassDef::new("MoreCodes").field("codes", TypeRef::array(TypeRef::int())))
}

#[test]
fn arrays_and_lists_convert_both_ways() {
    let mapper = BeanMapper::builder(codes_schema()).build().unwrap();

    let codes = holder("Codes", "codes", Value::array(TypeRef::int(), vec![Value::Int(1), Value::Int(2)]));
    let list = mapper.map_new(&codes, &TypeRef::class("CodeList"), None).unwrap();
    assert_eq!(field(&list, "codes"), Value::List(strings(&["1", "2"])));

    let list = holder("CodeList", "codes", Value::List(strings(&["3"])));
    let codes = mapper.map_new(&list, &TypeRef::class("Codes"), None).unwrap();
    assert_eq!(field(&codes, "codes"), Value::array(TypeRef::int(), vec![Value::Int(3)]));
}

#[test]
fn primitive_arrays_accumulate() {
    let mapper = BeanMapper::builder(codes_schema()).build().unwrap();

    let source = holder(
        "Codes",
        "codes",
        Value::array(TypeRef::int(), vec![Value::Int(2), Value::Int(3)]),
    );
    let destination = holder("MoreCodes", "codes", Value::array(TypeRef::int(), vec![Value::Int(1)]));
    mapper.map_into(&source, &destination, None).unwrap();

    assert_eq!(
        field(&destination, "codes"),
        Value::array(TypeRef::int(), vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

fn order_schema() -> Schema {
    Schema::new()
        .with_class(
            ClassDef::new("Line")
                .field("sku", TypeRef::string())
                .field("qty", TypeRef::int()),
        )
        .with_class(
            ClassDef::new("LineDto")
                .field("sku", TypeRef::string())
                .field("qty", TypeRef::int())
                .key("sku"),
        )
        .with_class(ClassDef::new("Order").field("lines", TypeRef::list(TypeRef::class("Line"))))
        .with_class(ClassDef::new("OrderDto").field("lines", TypeRef::list(TypeRef::class("LineDto"))))
}

fn line(class: &str, sku: &str, qty: i32) -> Value {
    Value::Object(ObjectRef::with_fields(class, [("sku", Value::from(sku)), ("qty", Value::Int(qty))]))
}

fn lines_mapper(remove_orphans: bool) -> BeanMapper {
    BeanMapper::builder(order_schema())
        .with_mapping(
            MappingBuilder::new("Order", "OrderDto")
                .field_with(
                    FieldMappingBuilder::new()
                        .a("lines")
                        .b("lines")
                        .relationship(RelationshipType::NonCumulative)
                        .remove_orphans(remove_orphans),
                )
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

#[test]
fn non_cumulative_lists_update_matching_elements() {
    let mapper = lines_mapper(false);
    let existing = line("LineDto", "A", 1);
    let destination = holder("OrderDto", "lines", Value::List(vec![existing.clone()]));
    let source = holder(
        "Order",
        "lines",
        Value::List(vec![line("Line", "A", 5), line("Line", "B", 2)]),
    );

    mapper.map_into(&source, &destination, None).unwrap();

    let lines = field(&destination, "lines").into_items().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].as_object().unwrap().ptr_eq(existing.as_object().unwrap()));
    assert_eq!(field(&lines[0], "qty"), Value::Int(5));
    assert_eq!(field(&lines[1], "sku"), Value::from("B"));
}

#[test]
fn remove_orphans_drops_unmatched_elements() {
    let mapper = lines_mapper(true);
    let kept = line("LineDto", "A", 1);
    let destination = holder(
        "OrderDto",
        "lines",
        Value::List(vec![kept.clone(), line("LineDto", "B", 1), line("LineDto", "C", 1)]),
    );
    let source = holder("Order", "lines", Value::List(vec![line("Line", "A", 9)]));

    mapper.map_into(&source, &destination, None).unwrap();

    let lines = field(&destination, "lines").into_items().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].as_object().unwrap().ptr_eq(kept.as_object().unwrap()));
    assert_eq!(field(&lines[0], "qty"), Value::Int(9));
}

#[test]
fn cumulative_lists_append() {
    let mapper = BeanMapper::builder(order_schema()).build().unwrap();
    let destination = holder("OrderDto", "lines", Value::List(vec![line("LineDto", "A", 1)]));
    let source = holder("Order", "lines", Value::List(vec![line("Line", "A", 5)]));

    mapper.map_into(&source, &destination, None).unwrap();

    let lines = field(&destination, "lines").into_items().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(field(&lines[0], "qty"), Value::Int(1));
    assert_eq!(field(&lines[1], "qty"), Value::Int(5));
}

#[test]
fn map_values_are_mapped_entry_by_entry() {
    let schema = people_schema()
        .with_class(
            ClassDef::new("Book").field("locations", TypeRef::map(TypeRef::string(), TypeRef::class("Address"))),
        )
        .with_class(
            ClassDef::new("BookDto")
                .field("locations", TypeRef::map(TypeRef::string(), TypeRef::class("AddressDto"))),
        );
    let mapper = BeanMapper::builder(schema).build().unwrap();

    let locations = MapRef::from_entries([("home", address("Main St", "Paris"))]);
    locations.put("work", Value::Null);
    let book = holder("Book", "locations", Value::Map(locations.clone()));

    let dto = mapper.map_new(&book, &TypeRef::class("BookDto"), None).unwrap();
    let mapped = field(&dto, "locations");
    let mapped = mapped.as_map().unwrap();
    assert!(!mapped.ptr_eq(&locations));
    assert_eq!(mapped.len(), 2);

    let home = mapped.get(&Value::from("home")).unwrap();
    assert_eq!(class_of(&home), "AddressDto");
    assert_eq!(field(&home, "city"), Value::from("Paris"));
    assert_eq!(mapped.get(&Value::from("work")), Some(Value::Null));
}

fn zoo_schema() -> Schema {
    Schema::new()
        .with_class(ClassDef::new("Dog").field("name", TypeRef::string()))
        .with_class(ClassDef::new("Cat").field("name", TypeRef::string()))
        .with_class(ClassDef::new("DogDto").field("name", TypeRef::string()))
        .with_class(ClassDef::new("CatDto").field("name", TypeRef::string()))
        .with_class(ClassDef::new("Zoo").field("animals", TypeRef::list(TypeRef::Any)))
        .with_class(ClassDef::new("ZooDto").field("animals", TypeRef::list(TypeRef::Any)))
}

fn animal(class: &str, name: &str) -> Value {
    Value::Object(ObjectRef::with_fields(class, [("name", name)]))
}

#[test]
fn destination_hint_types_untyped_elements() {
    let mapper = BeanMapper::builder(zoo_schema())
        .with_mapping(
            MappingBuilder::new("Zoo", "ZooDto")
                .field_with(FieldMappingBuilder::new().a("animals").b("animals").b_hint("DogDto"))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let zoo = holder("Zoo", "animals", Value::List(vec![animal("Dog", "Rex")]));
    let dto = mapper.map_new(&zoo, &TypeRef::class("ZooDto"), None).unwrap();

    let animals = field(&dto, "animals").into_items().unwrap();
    assert_eq!(class_of(&animals[0]), "DogDto");
    assert_eq!(field(&animals[0], "name"), Value::from("Rex"));
}

#[test]
fn multiple_hints_pair_by_position() {
    let mapper = BeanMapper::builder(zoo_schema())
        .with_mapping(
            MappingBuilder::new("Zoo", "ZooDto")
                .field_with(
                    FieldMappingBuilder::new()
                        .a("animals")
                        .a_hint("Dog, Cat")
                        .b("animals")
                        .b_hint("DogDto, CatDto"),
                )
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let zoo = holder(
        "Zoo",
        "animals",
        Value::List(vec![animal("Cat", "Tom"), animal("Dog", "Rex")]),
    );
    let dto = mapper.map_new(&zoo, &TypeRef::class("ZooDto"), None).unwrap();

    let classes: Vec<String> = field(&dto, "animals").into_items().unwrap().iter().map(class_of).collect();
    assert_eq!(classes, vec!["CatDto", "DogDto"]);
}

#[test]
fn unsupported_collection_pair_is_unresolved() {
    let schema = Schema::new()
        .with_class(ClassDef::new("Registry").field("tags", TypeRef::map(TypeRef::string(), TypeRef::string())))
        .with_class(ClassDef::new("RegistryDto").field("tags", TypeRef::list(TypeRef::string())));
    let mapper = BeanMapper::builder(schema).build().unwrap();

    let registry = holder("Registry", "tags", Value::Map(MapRef::from_entries([("a", "b")])));
    let err = mapper
        .map_new(&registry, &TypeRef::class("RegistryDto"), None)
        .unwrap_err();
    insta::assert_snapshot!(
        err,
        @"Unresolved mapping: unsupported collection mapping map<any,any> -> list<string> for field 'tags'"
    );
}

#[test]
fn abstract_collection_field_is_built_and_merged_as_a_list() {
    let collection = TypeRef::Collection(Box::new(TypeRef::string()));
    let schema = Schema::new()
        .with_class(ClassDef::new("Bag").field("items", TypeRef::list(TypeRef::string())))
        .with_class(ClassDef::new("Basket").field("items", collection.clone()));
    let mapper = BeanMapper::builder(schema.clone()).build().unwrap();

    assert_eq!(
        DestBeanCreator::new().instantiate(&schema, &collection).unwrap(),
        Value::List(Vec::new())
    );

    let bag = holder("Bag", "items", Value::List(strings(&["a", "b"])));
    let basket = mapper.map_new(&bag, &TypeRef::class("Basket"), None).unwrap();
    assert_eq!(field(&basket, "items"), Value::List(strings(&["a", "b"])));

    let existing = holder("Basket", "items", Value::List(strings(&["x"])));
    mapper.map_into(&bag, &existing, None).unwrap();
    assert_eq!(field(&existing, "items"), Value::List(strings(&["x", "a", "b"])));
}

#[test]
fn set_maps_to_list() {
    let schema = Schema::new()
        .with_class(ClassDef::new("Tagged").field("tags", TypeRef::set(TypeRef::string())))
        .with_class(ClassDef::new("TaggedDto").field("tags", TypeRef::list(TypeRef::string())));
    let mapper = BeanMapper::builder(schema).build().unwrap();

    let tagged = holder("Tagged", "tags", Value::Set(strings(&["red", "blue"])));
    let dto = mapper.map_new(&tagged, &TypeRef::class("TaggedDto"), None).unwrap();
    assert_eq!(field(&dto, "tags"), Value::List(strings(&["red", "blue"])));
}

#[test]
fn array_maps_to_set_without_duplicates() {
    let schema = Schema::new()
        .with_class(ClassDef::new("Codes").field("codes", TypeRef::array(TypeRef::int())))
        .with_class(ClassDef::new("CodeSet").field("codes", TypeRef::set(TypeRef::string())));
    let mapper = BeanMapper::builder(schema).build().unwrap();

    let codes = holder(
        "Codes",
        "codes",
        Value::array(TypeRef::int(), vec![Value::Int(1), Value::Int(1), Value::Int(2)]),
    );
    let set = mapper.map_new(&codes, &TypeRef::class("CodeSet"), None).unwrap();
    assert_eq!(field(&set, "codes"), Value::Set(strings(&["1", "2"])));
}

#[test]
fn list_into_map_typed_field_is_stored_as_a_list() {
    let schema = Schema::new()
        .with_class(ClassDef::new("Bag").field("items", TypeRef::list(TypeRef::string())))
        .with_class(ClassDef::new("Index").field("items", TypeRef::map(TypeRef::string(), TypeRef::string())));
    let mapper = BeanMapper::builder(schema).build().unwrap();

    let bag = holder("Bag", "items", Value::List(strings(&["a", "b"])));
    let index = mapper.map_new(&bag, &TypeRef::class("Index"), None).unwrap();
    assert_eq!(field(&index, "items"), Value::List(strings(&["a", "b"])));
}
