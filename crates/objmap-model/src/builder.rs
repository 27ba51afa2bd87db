//! Fluent construction of class mappings.
//!
//! # Example
//!
//! ```
//! use objmap_model::{FieldMappingBuilder, MappingBuilder, RelationshipType};
//!
//! let mapping = MappingBuilder::new("Order", "OrderDto")
//!     .map_null(false)
//!     .field("id", "orderId")
//!     .field_with(
//!         FieldMappingBuilder::new()
//!             .a("lines")
//!             .b("items")
//!             .b_hint("LineDto")
//!             .relationship(RelationshipType::NonCumulative),
//!     )
//!     .exclude("internalNote", "internalNote")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(mapping.field_mappings.len(), 3);
//! ```

use crate::config::{MappingDirection, RelationshipType};
use crate::error::{ModelError, Result};
use crate::mapping::{
    CallbackRef, ClassMapping, ConverterDescription, FieldDescriptor, FieldMapping,
    FieldMappingKind, HintContainer, MappingKey,
};
use crate::types::TypeRef;

/// Which side of a field mapping a setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// Setting recorded before the field expressions are parsed.
#[derive(Debug, Clone)]
enum SideSetting {
    Type(String),
    Hint(String),
    DeepHint(String),
    GetMethod(String),
    SetMethod(String),
    Key(String),
    CreateMethod(String),
    Required,
    DefaultValue(String),
    DateFormat(String),
    Iterate,
}

/// Builder for a single [`FieldMapping`].
///
/// `a` is the source side and `b` the destination side. Calling `a` more
/// than once declares a multi-source mapping; never calling it declares an
/// empty-source mapping. Side settings apply to the most recent `a` (or the
/// `b`) declared before them.
#[derive(Debug, Clone, Default)]
pub struct FieldMappingBuilder {
    sources: Vec<(String, Vec<SideSetting>)>,
    destination: Option<(String, Vec<SideSetting>)>,
    excluded: bool,
    direction: MappingDirection,
    relationship: Option<RelationshipType>,
    remove_orphans: bool,
    copy_by_reference: Option<bool>,
    converter: Option<CallbackRef>,
    converter_param: Option<String>,
    condition: Option<CallbackRef>,
    map_id: Option<String>,
    map_null: Option<bool>,
    map_empty_string: Option<bool>,
    trim_strings: Option<bool>,
    stop_on_errors: Option<bool>,
}

impl FieldMappingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn a(mut self, field: impl Into<String>) -> Self {
        self.sources.push((field.into(), Vec::new()));
        self
    }

    pub fn b(mut self, field: impl Into<String>) -> Self {
        self.destination = Some((field.into(), Vec::new()));
        self
    }

    fn push(mut self, side: Side, setting: SideSetting) -> Self {
        let slot = match side {
            Side::A => self.sources.last_mut().map(|(_, s)| s),
            Side::B => self.destination.as_mut().map(|(_, s)| s),
        };
        if let Some(settings) = slot {
            settings.push(setting);
        }
        self
    }

    pub fn a_type(self, ty: impl Into<String>) -> Self {
        self.push(Side::A, SideSetting::Type(ty.into()))
    }

    pub fn b_type(self, ty: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::Type(ty.into()))
    }

    pub fn a_hint(self, hints: impl Into<String>) -> Self {
        self.push(Side::A, SideSetting::Hint(hints.into()))
    }

    pub fn b_hint(self, hints: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::Hint(hints.into()))
    }

    pub fn a_deep_hint(self, hints: impl Into<String>) -> Self {
        self.push(Side::A, SideSetting::DeepHint(hints.into()))
    }

    pub fn b_deep_hint(self, hints: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::DeepHint(hints.into()))
    }

    pub fn a_get_method(self, name: impl Into<String>) -> Self {
        self.push(Side::A, SideSetting::GetMethod(name.into()))
    }

    pub fn a_set_method(self, name: impl Into<String>) -> Self {
        self.push(Side::A, SideSetting::SetMethod(name.into()))
    }

    pub fn b_get_method(self, name: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::GetMethod(name.into()))
    }

    pub fn b_set_method(self, name: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::SetMethod(name.into()))
    }

    pub fn a_key(self, key: impl Into<String>) -> Self {
        self.push(Side::A, SideSetting::Key(key.into()))
    }

    pub fn b_key(self, key: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::Key(key.into()))
    }

    pub fn b_create_method(self, name: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::CreateMethod(name.into()))
    }

    pub fn b_required(self) -> Self {
        self.push(Side::B, SideSetting::Required)
    }

    pub fn b_default_value(self, value: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::DefaultValue(value.into()))
    }

    pub fn a_date_format(self, format: impl Into<String>) -> Self {
        self.push(Side::A, SideSetting::DateFormat(format.into()))
    }

    pub fn b_date_format(self, format: impl Into<String>) -> Self {
        self.push(Side::B, SideSetting::DateFormat(format.into()))
    }

    pub fn b_iterate(self) -> Self {
        self.push(Side::B, SideSetting::Iterate)
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub fn one_way(mut self) -> Self {
        self.direction = MappingDirection::OneWay;
        self
    }

    pub fn relationship(mut self, relationship: RelationshipType) -> Self {
        self.relationship = Some(relationship);
        self
    }

    pub fn remove_orphans(mut self, enabled: bool) -> Self {
        self.remove_orphans = enabled;
        self
    }

    pub fn copy_by_reference(mut self, enabled: bool) -> Self {
        self.copy_by_reference = Some(enabled);
        self
    }

    pub fn converter(mut self, type_name: impl Into<String>) -> Self {
        self.converter = Some(CallbackRef::Type(type_name.into()));
        self
    }

    pub fn converter_id(mut self, id: impl Into<String>) -> Self {
        self.converter = Some(CallbackRef::Id(id.into()));
        self
    }

    pub fn converter_param(mut self, param: impl Into<String>) -> Self {
        self.converter_param = Some(param.into());
        self
    }

    pub fn condition(mut self, type_name: impl Into<String>) -> Self {
        self.condition = Some(CallbackRef::Type(type_name.into()));
        self
    }

    pub fn condition_id(mut self, id: impl Into<String>) -> Self {
        self.condition = Some(CallbackRef::Id(id.into()));
        self
    }

    pub fn map_id(mut self, id: impl Into<String>) -> Self {
        self.map_id = Some(id.into());
        self
    }

    pub fn map_null(mut self, enabled: bool) -> Self {
        self.map_null = Some(enabled);
        self
    }

    pub fn map_empty_string(mut self, enabled: bool) -> Self {
        self.map_empty_string = Some(enabled);
        self
    }

    pub fn trim_strings(mut self, enabled: bool) -> Self {
        self.trim_strings = Some(enabled);
        self
    }

    pub fn stop_on_errors(mut self, enabled: bool) -> Self {
        self.stop_on_errors = Some(enabled);
        self
    }

    /// Parse field expressions and pick the mapping variant.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingDestination`] when no `b` was given, and
    /// parse errors for malformed field or type expressions.
    pub fn build(self, owner: &str) -> Result<FieldMapping> {
        let Some((dest_expr, dest_settings)) = self.destination else {
            return Err(ModelError::MissingDestination {
                mapping: owner.to_string(),
            });
        };
        let destination = descriptor(&dest_expr, dest_settings)?;
        let mut sources = self
            .sources
            .into_iter()
            .map(|(expr, settings)| descriptor(&expr, settings))
            .collect::<Result<Vec<_>>>()?;

        let (kind, source) = match sources.len() {
            0 => (FieldMappingKind::EmptySource, FieldDescriptor::default()),
            1 => {
                let source = sources.remove(0);
                let kind = if self.excluded {
                    FieldMappingKind::Excluded
                } else {
                    FieldMappingKind::Generic
                };
                (kind, source)
            }
            _ => (FieldMappingKind::MultiSource(sources.clone()), sources.remove(0)),
        };

        Ok(FieldMapping {
            kind,
            source,
            destination,
            direction: self.direction,
            relationship: self.relationship,
            remove_orphans: self.remove_orphans,
            copy_by_reference: self.copy_by_reference,
            converter: self.converter,
            converter_param: self.converter_param,
            condition: self.condition,
            map_id: self.map_id,
            map_null: self.map_null,
            map_empty_string: self.map_empty_string,
            trim_strings: self.trim_strings,
            stop_on_errors: self.stop_on_errors,
        })
    }
}

fn descriptor(expr: &str, settings: Vec<SideSetting>) -> Result<FieldDescriptor> {
    let mut fd = FieldDescriptor::parse(expr)?;
    for setting in settings {
        match setting {
            SideSetting::Type(ty) => fd.declared_type = Some(ty.parse()?),
            SideSetting::Hint(h) => fd.hint = Some(HintContainer::parse(&h)?),
            SideSetting::DeepHint(h) => fd.deep_hint = Some(HintContainer::parse(&h)?),
            SideSetting::GetMethod(m) => fd.get_method = Some(m),
            SideSetting::SetMethod(m) => fd.set_method = Some(m),
            SideSetting::Key(k) => fd.key = Some(k),
            SideSetting::CreateMethod(m) => fd.create_method = Some(m),
            SideSetting::Required => fd.required = true,
            SideSetting::DefaultValue(v) => fd.default_value = Some(v),
            SideSetting::DateFormat(f) => fd.date_format = Some(f),
            SideSetting::Iterate => fd.iterate = true,
        }
    }
    Ok(fd)
}

/// Builder for a [`ClassMapping`].
#[derive(Debug, Clone)]
pub struct MappingBuilder {
    source: String,
    destination: String,
    map_id: Option<String>,
    direction: MappingDirection,
    source_factory: (Option<String>, Option<String>, Option<String>),
    destination_factory: (Option<String>, Option<String>, Option<String>),
    map_null: Option<bool>,
    map_empty_string: Option<bool>,
    trim_strings: Option<bool>,
    stop_on_errors: Option<bool>,
    wildcard: Option<bool>,
    relationship: Option<RelationshipType>,
    date_format: Option<String>,
    allowed_errors: Vec<String>,
    converters: Vec<(String, String, CallbackRef)>,
    fields: Vec<FieldMappingBuilder>,
}

impl MappingBuilder {
    /// Start a mapping between two type expressions, e.g. `"Order"` and
    /// `"map<string,any>"`.
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            map_id: None,
            direction: MappingDirection::Bidirectional,
            source_factory: (None, None, None),
            destination_factory: (None, None, None),
            map_null: None,
            map_empty_string: None,
            trim_strings: None,
            stop_on_errors: None,
            wildcard: None,
            relationship: None,
            date_format: None,
            allowed_errors: Vec::new(),
            converters: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn map_id(mut self, id: impl Into<String>) -> Self {
        self.map_id = Some(id.into());
        self
    }

    pub fn one_way(mut self) -> Self {
        self.direction = MappingDirection::OneWay;
        self
    }

    pub fn map_null(mut self, enabled: bool) -> Self {
        self.map_null = Some(enabled);
        self
    }

    pub fn map_empty_string(mut self, enabled: bool) -> Self {
        self.map_empty_string = Some(enabled);
        self
    }

    pub fn trim_strings(mut self, enabled: bool) -> Self {
        self.trim_strings = Some(enabled);
        self
    }

    pub fn stop_on_errors(mut self, enabled: bool) -> Self {
        self.stop_on_errors = Some(enabled);
        self
    }

    pub fn wildcard(mut self, enabled: bool) -> Self {
        self.wildcard = Some(enabled);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipType) -> Self {
        self.relationship = Some(relationship);
        self
    }

    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn allowed_error(mut self, kind: impl Into<String>) -> Self {
        self.allowed_errors.push(kind.into());
        self
    }

    /// Bean factory used for the destination side.
    pub fn b_bean_factory(mut self, name: impl Into<String>) -> Self {
        self.destination_factory.0 = Some(name.into());
        self
    }

    pub fn b_factory_bean_id(mut self, id: impl Into<String>) -> Self {
        self.destination_factory.1 = Some(id.into());
        self
    }

    pub fn b_create_method(mut self, name: impl Into<String>) -> Self {
        self.destination_factory.2 = Some(name.into());
        self
    }

    /// Bean factory used for the source side when the mapping is reversed.
    pub fn a_bean_factory(mut self, name: impl Into<String>) -> Self {
        self.source_factory.0 = Some(name.into());
        self
    }

    pub fn a_create_method(mut self, name: impl Into<String>) -> Self {
        self.source_factory.2 = Some(name.into());
        self
    }

    /// Converter applied to values of this pair of types, in either direction.
    pub fn converter(mut self, class_a: impl Into<String>, class_b: impl Into<String>, converter: CallbackRef) -> Self {
        self.converters.push((class_a.into(), class_b.into(), converter));
        self
    }

    pub fn field(self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.field_with(FieldMappingBuilder::new().a(a).b(b))
    }

    pub fn exclude(self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.field_with(FieldMappingBuilder::new().a(a).b(b).excluded())
    }

    pub fn field_with(mut self, field: FieldMappingBuilder) -> Self {
        self.fields.push(field);
        self
    }

    /// Parse all type and field expressions into a [`ClassMapping`].
    ///
    /// The result is not yet resolved against a configuration; registering
    /// it with [`crate::ClassMappings`] does that.
    ///
    /// # Errors
    ///
    /// Returns the first parse error encountered.
    pub fn build(self) -> Result<ClassMapping> {
        let source: TypeRef = self.source.parse()?;
        let destination: TypeRef = self.destination.parse()?;
        let owner = MappingKey::new(source.clone(), destination.clone(), self.map_id.clone()).to_string();

        let mut mapping = ClassMapping::new(source, destination);
        mapping.map_id = self.map_id;
        mapping.direction = self.direction;
        (
            mapping.source.bean_factory,
            mapping.source.factory_bean_id,
            mapping.source.create_method,
        ) = self.source_factory;
        (
            mapping.destination.bean_factory,
            mapping.destination.factory_bean_id,
            mapping.destination.create_method,
        ) = self.destination_factory;
        mapping.overrides.map_null = self.map_null;
        mapping.overrides.map_empty_string = self.map_empty_string;
        mapping.overrides.trim_strings = self.trim_strings;
        mapping.overrides.stop_on_errors = self.stop_on_errors;
        mapping.overrides.wildcard = self.wildcard;
        mapping.overrides.relationship = self.relationship;
        mapping.overrides.date_format = self.date_format;
        mapping.overrides.allowed_errors = self.allowed_errors;

        for (a, b, converter) in self.converters {
            mapping.converters.push(ConverterDescription {
                class_a: a.parse()?,
                class_b: b.parse()?,
                converter,
            });
        }
        for field in self.fields {
            let mut field_mapping = field.build(&owner)?;
            if mapping.direction == MappingDirection::OneWay {
                field_mapping.direction = MappingDirection::OneWay;
            }
            mapping.field_mappings.push(field_mapping);
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_sources_make_multi_source_mapping() {
        let fm = FieldMappingBuilder::new()
            .a("first")
            .a("last")
            .b("fullName")
            .converter_id("join")
            .build("Person -> PersonDto")
            .unwrap();
        match &fm.kind {
            FieldMappingKind::MultiSource(sources) => {
                let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["first", "last"]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(fm.source.name, "first");
    }

    #[test]
    fn missing_destination_is_reported() {
        let err = FieldMappingBuilder::new().a("x").build("A -> B").unwrap_err();
        insta::assert_snapshot!(err, @"Field mapping in A -> B has no destination field");
    }

    #[test]
    fn side_settings_apply_to_latest_side() {
        let fm = FieldMappingBuilder::new()
            .a("props")
            .a_key("colour")
            .b("colour[0]")
            .b_hint("string")
            .b_required()
            .build("A -> B")
            .unwrap();
        assert_eq!(fm.source.key.as_deref(), Some("colour"));
        assert_eq!(fm.destination.index, Some(0));
        assert!(fm.destination.required);
        assert_eq!(fm.destination.hint.as_ref().and_then(HintContainer::hint), Some(&TypeRef::string()));
    }

    #[test]
    fn empty_source_without_a() {
        let fm = FieldMappingBuilder::new()
            .b("status")
            .b_default_value("NEW")
            .build("A -> B")
            .unwrap();
        assert_eq!(fm.kind, FieldMappingKind::EmptySource);
    }

    #[test]
    fn one_way_class_marks_fields_one_way() {
        let mapping = MappingBuilder::new("A", "B").one_way().field("x", "y").build().unwrap();
        assert_eq!(mapping.field_mappings[0].direction, MappingDirection::OneWay);
    }

    #[test]
    fn invalid_type_expression_fails_build() {
        let err = MappingBuilder::new("list<", "B").build().unwrap_err();
        insta::assert_snapshot!(err, @"Invalid type expression 'list<'");
    }
}
