//! Class and field mappings.
//!
//! A [`ClassMapping`] ties a source type to a destination type (optionally
//! under a map-id) and holds the ordered [`FieldMapping`]s applied between
//! them. Mappings are built with [`crate::MappingBuilder`] and resolved
//! against the global [`Configuration`] when registered.

use std::collections::HashSet;
use std::fmt;

use crate::config::{Configuration, MappingDirection, RelationshipType};
use crate::error::{ModelError, Result};
use crate::schema::Schema;
use crate::types::{TypeRef, split_top_level};

/// Field name that refers to the object itself rather than one of its fields.
pub const SELF_KEYWORD: &str = "this";

/// Ordered list of candidate types for a field or collection element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HintContainer {
    hints: Vec<TypeRef>,
}

impl HintContainer {
    pub fn new(hints: Vec<TypeRef>) -> Self {
        Self { hints }
    }

    pub fn single(hint: TypeRef) -> Self {
        Self { hints: vec![hint] }
    }

    /// Parse a comma-separated hint list such as `Dog, Cat`.
    pub fn parse(expr: &str) -> Result<Self> {
        let parts = split_top_level(expr).ok_or_else(|| ModelError::InvalidType(expr.to_string()))?;
        let hints = parts
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<TypeRef>>>()?;
        Ok(Self { hints })
    }

    pub fn hints(&self) -> &[TypeRef] {
        &self.hints
    }

    /// The hint, when exactly one is declared.
    pub fn hint(&self) -> Option<&TypeRef> {
        match self.hints.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn has_more_than_one_hint(&self) -> bool {
        self.hints.len() > 1
    }

    /// Destination hint paired with the source hint that names `runtime`.
    ///
    /// A single hint applies to every element; otherwise hints are matched
    /// by position against the source side's hints.
    pub fn hint_for(&self, runtime: &TypeRef, source_hints: Option<&HintContainer>) -> Option<&TypeRef> {
        if let Some(only) = self.hint() {
            return Some(only);
        }
        let index = source_hints?.hints.iter().position(|h| h == runtime)?;
        self.hints.get(index)
    }

    pub fn get(&self, index: usize) -> Option<&TypeRef> {
        self.hints.get(index)
    }

    fn normalize(&self, schema: &Schema) -> Self {
        Self {
            hints: self.hints.iter().map(|h| schema.normalize(h)).collect(),
        }
    }
}

/// One side of a field mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Field name, dotted for deep paths, or `this`.
    pub name: String,
    /// Declared type overriding what the schema says.
    pub declared_type: Option<TypeRef>,
    /// Index into the collection held by the last path segment.
    pub index: Option<usize>,
    pub hint: Option<HintContainer>,
    /// Types of the intermediate segments of a deep path.
    pub deep_hint: Option<HintContainer>,
    pub get_method: Option<String>,
    pub set_method: Option<String>,
    /// Map key when the field lives in a map.
    pub key: Option<String>,
    pub create_method: Option<String>,
    pub required: bool,
    pub default_value: Option<String>,
    pub date_format: Option<String>,
    /// Append values one by one instead of assigning a collection.
    pub iterate: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse `name`, `a.b.c`, `items[2]` or `a.items[0].b[1]`.
    ///
    /// A trailing index becomes [`FieldDescriptor::index`]; indexes on
    /// intermediate segments stay in the name.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let invalid = || ModelError::InvalidField(expr.to_string());
        if expr.is_empty() {
            return Err(invalid());
        }
        for segment in expr.split('.') {
            split_segment(segment).ok_or_else(invalid)?;
        }
        let (name, index) = match expr.rsplit_once('.') {
            Some((head, last)) => {
                let (field, index) = split_segment(last).ok_or_else(invalid)?;
                (format!("{head}.{field}"), index)
            }
            None => {
                let (field, index) = split_segment(expr).ok_or_else(invalid)?;
                (field.to_string(), index)
            }
        };
        Ok(Self {
            name,
            index,
            ..Self::default()
        })
    }

    pub fn is_self(&self) -> bool {
        self.name == SELF_KEYWORD
    }

    pub fn is_deep(&self) -> bool {
        self.name.contains('.')
    }

    pub fn has_custom_methods(&self) -> bool {
        self.get_method.is_some() || self.set_method.is_some()
    }

    /// Identity of this side within a class mapping.
    pub fn key_string(&self) -> String {
        let mut out = self.name.clone();
        if let Some(index) = self.index {
            out.push_str(&format!("[{index}]"));
        }
        if let Some(key) = &self.key {
            out.push_str(&format!("{{{key}}}"));
        }
        out
    }

    fn normalize(&mut self, schema: &Schema) {
        self.declared_type = self.declared_type.as_ref().map(|t| schema.normalize(t));
        self.hint = self.hint.as_ref().map(|h| h.normalize(schema));
        self.deep_hint = self.deep_hint.as_ref().map(|h| h.normalize(schema));
    }
}

/// Split `name[3]` into (`name`, Some(3)).
pub fn split_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    let valid_name = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '$'));
    match segment.strip_suffix(']') {
        Some(rest) => {
            let (name, index) = rest.split_once('[')?;
            let index = index.trim().parse().ok()?;
            valid_name(name).then_some((name, Some(index)))
        }
        None => valid_name(segment).then_some((segment, None)),
    }
}

/// Reference to a converter or condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackRef {
    /// Registered instance looked up by id.
    Id(String),
    /// Registered instance looked up by type name.
    Type(String),
}

impl fmt::Display for CallbackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id '{id}'"),
            Self::Type(name) => write!(f, "type '{name}'"),
        }
    }
}

/// Variant of a field mapping, fixed when the model is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMappingKind {
    Generic,
    Excluded,
    /// At least one side is stored under a map key.
    MapBacked,
    /// At least one side uses a named getter or setter.
    CustomMethod,
    /// Several source fields combined by a custom converter.
    MultiSource(Vec<FieldDescriptor>),
    /// No source field; the destination gets its default value or converter output.
    EmptySource,
}

/// Field options after class-level defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOptions {
    pub map_null: bool,
    pub map_empty_string: bool,
    pub trim_strings: bool,
    pub stop_on_errors: bool,
    pub relationship: RelationshipType,
    pub date_format: Option<String>,
}

/// Correspondence between one source field and one destination field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub kind: FieldMappingKind,
    pub source: FieldDescriptor,
    pub destination: FieldDescriptor,
    pub direction: MappingDirection,
    pub relationship: Option<RelationshipType>,
    pub remove_orphans: bool,
    pub copy_by_reference: Option<bool>,
    pub converter: Option<CallbackRef>,
    pub converter_param: Option<String>,
    pub condition: Option<CallbackRef>,
    /// Map-id used when recursing into this field's value.
    pub map_id: Option<String>,
    pub map_null: Option<bool>,
    pub map_empty_string: Option<bool>,
    pub trim_strings: Option<bool>,
    pub stop_on_errors: Option<bool>,
}

impl FieldMapping {
    pub fn new(kind: FieldMappingKind, source: FieldDescriptor, destination: FieldDescriptor) -> Self {
        Self {
            kind,
            source,
            destination,
            direction: MappingDirection::Bidirectional,
            relationship: None,
            remove_orphans: false,
            copy_by_reference: None,
            converter: None,
            converter_param: None,
            condition: None,
            map_id: None,
            map_null: None,
            map_empty_string: None,
            trim_strings: None,
            stop_on_errors: None,
        }
    }

    /// Same-name style mapping between two plain fields.
    pub fn generic(source: &str, destination: &str) -> Result<Self> {
        Ok(Self::new(
            FieldMappingKind::Generic,
            FieldDescriptor::parse(source)?,
            FieldDescriptor::parse(destination)?,
        ))
    }

    pub fn is_excluded(&self) -> bool {
        self.kind == FieldMappingKind::Excluded
    }

    pub fn is_self_to_self(&self) -> bool {
        self.source.is_self() && self.destination.is_self()
    }

    /// Key identifying the destination side within a class mapping.
    pub fn destination_key(&self) -> String {
        self.destination.key_string()
    }

    pub fn relationship_type(&self, class: &ClassOptions) -> RelationshipType {
        self.relationship.unwrap_or(class.relationship)
    }

    pub fn is_non_cumulative(&self, class: &ClassOptions) -> bool {
        self.relationship_type(class) == RelationshipType::NonCumulative
    }

    /// Resolve per-field overrides against the owning class mapping.
    pub fn options(&self, class: &ClassOptions) -> FieldOptions {
        FieldOptions {
            map_null: self.map_null.unwrap_or(class.map_null),
            map_empty_string: self.map_empty_string.unwrap_or(class.map_empty_string),
            trim_strings: self.trim_strings.unwrap_or(class.trim_strings),
            stop_on_errors: self.stop_on_errors.unwrap_or(class.stop_on_errors),
            relationship: self.relationship_type(class),
            date_format: self
                .destination
                .date_format
                .clone()
                .or_else(|| self.source.date_format.clone())
                .or_else(|| class.date_format.clone()),
        }
    }

    /// Mapping for the opposite direction, if this one applies both ways.
    pub fn reversed(&self) -> Option<Self> {
        if self.direction == MappingDirection::OneWay {
            return None;
        }
        if matches!(
            self.kind,
            FieldMappingKind::MultiSource(_) | FieldMappingKind::EmptySource
        ) {
            return None;
        }
        let mut reversed = self.clone();
        std::mem::swap(&mut reversed.source, &mut reversed.destination);
        Some(reversed)
    }

    fn resolve(&mut self, schema: &Schema, source_type: &TypeRef, destination_type: &TypeRef) {
        self.source.normalize(schema);
        self.destination.normalize(schema);
        if let FieldMappingKind::MultiSource(sources) = &mut self.kind {
            for source in sources {
                source.normalize(schema);
            }
        }
        if self.kind == FieldMappingKind::Generic {
            if self.source.key.is_some()
                || self.destination.key.is_some()
                || source_type.is_map()
                || destination_type.is_map()
            {
                self.kind = FieldMappingKind::MapBacked;
            } else if self.source.has_custom_methods() || self.destination.has_custom_methods() {
                self.kind = FieldMappingKind::CustomMethod;
            }
        }
    }
}

/// One side of a class mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSide {
    pub ty: TypeRef,
    /// Named bean factory used to create instances of this side.
    pub bean_factory: Option<String>,
    /// Id passed to the bean factory.
    pub factory_bean_id: Option<String>,
    /// Create method declared on the class.
    pub create_method: Option<String>,
}

impl ClassSide {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            bean_factory: None,
            factory_bean_id: None,
            create_method: None,
        }
    }
}

/// Class-level option overrides as declared; unset values fall back to the
/// global configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub map_null: Option<bool>,
    pub map_empty_string: Option<bool>,
    pub trim_strings: Option<bool>,
    pub stop_on_errors: Option<bool>,
    pub wildcard: Option<bool>,
    pub relationship: Option<RelationshipType>,
    pub date_format: Option<String>,
    pub allowed_errors: Vec<String>,
}

/// Effective class-level options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassOptions {
    pub map_null: bool,
    pub map_empty_string: bool,
    pub trim_strings: bool,
    pub stop_on_errors: bool,
    pub wildcard: bool,
    pub relationship: RelationshipType,
    pub date_format: Option<String>,
    pub allowed_errors: Vec<String>,
}

impl ClassOptions {
    pub fn resolve(overrides: &OptionOverrides, config: &Configuration) -> Self {
        let mut allowed_errors = config.allowed_errors.clone();
        for kind in &overrides.allowed_errors {
            if !allowed_errors.contains(kind) {
                allowed_errors.push(kind.clone());
            }
        }
        Self {
            map_null: overrides.map_null.unwrap_or(config.map_null),
            map_empty_string: overrides.map_empty_string.unwrap_or(config.map_empty_string),
            trim_strings: overrides.trim_strings.unwrap_or(config.trim_strings),
            stop_on_errors: overrides.stop_on_errors.unwrap_or(config.stop_on_errors),
            wildcard: overrides.wildcard.unwrap_or(config.wildcard),
            relationship: overrides.relationship.unwrap_or(config.relationship_type),
            date_format: overrides.date_format.clone().or_else(|| config.date_format.clone()),
            allowed_errors,
        }
    }

    /// Whether failures of this kind always propagate.
    pub fn is_allowed(&self, kind: &str) -> bool {
        self.allowed_errors.iter().any(|k| k == kind)
    }
}

impl Default for ClassOptions {
    fn default() -> Self {
        Self::resolve(&OptionOverrides::default(), &Configuration::default())
    }
}

/// Converter scoped to a pair of types, matched in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConverterDescription {
    pub class_a: TypeRef,
    pub class_b: TypeRef,
    pub converter: CallbackRef,
}

/// Lookup key of a class mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub source: TypeRef,
    pub destination: TypeRef,
    pub map_id: Option<String>,
}

impl MappingKey {
    pub fn new(source: TypeRef, destination: TypeRef, map_id: Option<String>) -> Self {
        Self {
            source,
            destination,
            map_id,
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)?;
        if let Some(id) = &self.map_id {
            write!(f, " (map-id '{id}')")?;
        }
        Ok(())
    }
}

/// Mapping between a source type and a destination type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    pub source: ClassSide,
    pub destination: ClassSide,
    pub map_id: Option<String>,
    pub direction: MappingDirection,
    pub field_mappings: Vec<FieldMapping>,
    pub converters: Vec<ConverterDescription>,
    pub overrides: OptionOverrides,
    /// Effective options; filled in when the mapping is resolved.
    pub options: ClassOptions,
    /// Created on demand rather than declared.
    pub structural: bool,
}

impl ClassMapping {
    pub fn new(source: TypeRef, destination: TypeRef) -> Self {
        Self {
            source: ClassSide::new(source),
            destination: ClassSide::new(destination),
            map_id: None,
            direction: MappingDirection::Bidirectional,
            field_mappings: Vec::new(),
            converters: Vec::new(),
            overrides: OptionOverrides::default(),
            options: ClassOptions::default(),
            structural: false,
        }
    }

    /// Mapping created on demand for a pair with no declared mapping.
    pub fn structural_default(
        schema: &Schema,
        config: &Configuration,
        source: TypeRef,
        destination: TypeRef,
    ) -> Self {
        let mut mapping = Self::new(source, destination);
        mapping.structural = true;
        if mapping.source.ty.is_map() && mapping.destination.ty.is_map() {
            mapping.field_mappings.push(FieldMapping::new(
                FieldMappingKind::MapBacked,
                FieldDescriptor::new(SELF_KEYWORD),
                FieldDescriptor::new(SELF_KEYWORD),
            ));
        }
        mapping.resolve(schema, config);
        mapping
    }

    pub fn key(&self) -> MappingKey {
        MappingKey::new(
            self.source.ty.clone(),
            self.destination.ty.clone(),
            self.map_id.clone(),
        )
    }

    /// Destination keys of all field mappings, in order.
    pub fn field_keys(&self) -> Vec<String> {
        self.field_mappings.iter().map(FieldMapping::destination_key).collect()
    }

    /// Copy of this mapping without the field mappings whose destination
    /// key is in `keys`.
    pub fn copy_without(&self, keys: &HashSet<String>) -> Self {
        let mut copy = self.clone();
        copy.field_mappings
            .retain(|fm| !keys.contains(&fm.destination_key()));
        copy
    }

    /// Mapping for the opposite direction, with one-way fields dropped.
    pub fn reversed(&self) -> Self {
        let mut reversed = Self::new(self.destination.ty.clone(), self.source.ty.clone());
        reversed.source = self.destination.clone();
        reversed.destination = self.source.clone();
        reversed.map_id = self.map_id.clone();
        reversed.direction = self.direction;
        reversed.converters = self.converters.clone();
        reversed.overrides = self.overrides.clone();
        reversed.field_mappings = self
            .field_mappings
            .iter()
            .filter_map(FieldMapping::reversed)
            .collect();
        reversed
    }

    /// Normalize types, resolve options and add wildcard field mappings.
    pub fn resolve(&mut self, schema: &Schema, config: &Configuration) {
        self.source.ty = schema.normalize(&self.source.ty);
        self.destination.ty = schema.normalize(&self.destination.ty);
        self.options = ClassOptions::resolve(&self.overrides, config);
        if self.source.bean_factory.is_none() {
            self.source.bean_factory = config.bean_factory.clone();
        }
        if self.destination.bean_factory.is_none() {
            self.destination.bean_factory = config.bean_factory.clone();
        }
        for description in &mut self.converters {
            description.class_a = schema.normalize(&description.class_a);
            description.class_b = schema.normalize(&description.class_b);
        }
        let (source_type, destination_type) = (self.source.ty.clone(), self.destination.ty.clone());
        for field_mapping in &mut self.field_mappings {
            field_mapping.resolve(schema, &source_type, &destination_type);
        }
        if self.options.wildcard {
            self.add_wildcard_fields(schema);
        }
    }

    fn add_wildcard_fields(&mut self, schema: &Schema) {
        let candidates: Vec<String> = match (&self.source.ty, &self.destination.ty) {
            (TypeRef::Class(src), TypeRef::Class(dest)) => schema
                .fields(dest)
                .into_iter()
                .filter(|f| schema.field(src, &f.name).is_some())
                .map(|f| f.name.clone())
                .collect(),
            (TypeRef::Class(src), TypeRef::Map(..)) => {
                schema.fields(src).into_iter().map(|f| f.name.clone()).collect()
            }
            (TypeRef::Map(..), TypeRef::Class(dest)) => {
                schema.fields(dest).into_iter().map(|f| f.name.clone()).collect()
            }
            _ => Vec::new(),
        };
        let claimed: HashSet<String> = self
            .field_mappings
            .iter()
            .flat_map(|fm| [fm.source.name.clone(), fm.destination.name.clone()])
            .collect();
        let kind = if self.source.ty.is_map() || self.destination.ty.is_map() {
            FieldMappingKind::MapBacked
        } else {
            FieldMappingKind::Generic
        };
        for name in candidates {
            if claimed.contains(&name) {
                continue;
            }
            self.field_mappings.push(FieldMapping::new(
                kind.clone(),
                FieldDescriptor::new(name.clone()),
                FieldDescriptor::new(name),
            ));
        }
    }
}
