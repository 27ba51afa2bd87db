//! Recursive mapping of one object graph onto another.
//!
//! Each public call runs [`BeanMapper::map_root`] with a fresh
//! [`MappingContext`]. Class mappings are applied field by field; field
//! values are converted, recursed into, or handed to collection handling
//! depending on their runtime types.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use objmap_convert::{ConverterHandle, ConverterMatch, PrimitiveConverter};
use objmap_model::{
    ClassMapping, FieldMapping, FieldMappingKind, FieldOptions, HintContainer, RelationshipType, SELF_KEYWORD,
    TypeRef, Value,
};
use tracing::{debug, error, trace};

use crate::accessor::PropertyAccessor;
use crate::context::MappingContext;
use crate::error::{MappingError, Result};
use crate::events::{MappingEvent, MappingEventType};
use crate::factory::BeanCreationDirective;
use crate::mapper::BeanMapper;
use crate::stats::StatisticType;

/// Destination of a top-level call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    Type(&'a TypeRef),
    Instance(&'a Value),
}

/// One field mapping being applied to one (source, destination) pair.
#[derive(Clone)]
pub(crate) struct FieldScope<'a> {
    pub(crate) class_mapping: &'a ClassMapping,
    pub(crate) field: &'a FieldMapping,
    pub(crate) options: FieldOptions,
    pub(crate) source: &'a Value,
    pub(crate) destination: &'a Value,
    /// Declared type of the source field.
    pub(crate) source_type: TypeRef,
    pub(crate) source_field: Option<Arc<PropertyAccessor>>,
    pub(crate) destination_field: Arc<PropertyAccessor>,
    pub(crate) required: bool,
    /// Set while mapping the elements of a collection or map; the field's
    /// current destination value is then not the element's existing value.
    pub(crate) element: bool,
}

impl FieldScope<'_> {
    pub(crate) fn destination_type(&self) -> &TypeRef {
        self.destination_field.field_type()
    }

    pub(crate) fn destination_hints(&self) -> Option<&HintContainer> {
        self.field.destination.hint.as_ref()
    }

    pub(crate) fn source_hints(&self) -> Option<&HintContainer> {
        self.field.source.hint.as_ref()
    }

    pub(crate) fn is_map_backed(&self) -> bool {
        self.field.kind == FieldMappingKind::MapBacked
    }

    pub(crate) fn is_non_cumulative(&self) -> bool {
        self.options.relationship == RelationshipType::NonCumulative
    }

    pub(crate) fn for_elements(&self) -> Self {
        Self {
            element: true,
            ..self.clone()
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl BeanMapper {
    pub(crate) fn map_root(&self, source: &Value, target: Target<'_>, map_id: Option<&str>) -> Result<Value> {
        if source.is_null() {
            return Err(MappingError::InvalidRequest("source value must not be null".to_string()));
        }
        let source = source.clone().deproxy();
        let source_type = source.resolved_type();
        let (destination_type, existing) = match target {
            Target::Type(ty) => {
                let ty = self.schema().normalize(ty);
                // an untyped request with no mapping copies into the source's own type
                if ty.is_any() && self.model.find(&source_type, &ty, map_id).is_none() {
                    (source_type.clone(), None)
                } else {
                    (ty, None)
                }
            }
            Target::Instance(destination) => {
                if destination.is_null() {
                    return Err(MappingError::InvalidRequest(
                        "destination value must not be null".to_string(),
                    ));
                }
                let destination = destination.clone().deproxy();
                (destination.resolved_type(), Some(destination))
            }
        };
        debug!(source = %source_type, destination = %destination_type, map_id = ?map_id, "mapping");

        let started = Instant::now();
        let mut ctx = MappingContext::new();
        let outcome = self
            .class_mapping(&source_type, &destination_type, map_id)
            .and_then(|class_mapping| {
                let pending = existing.clone().unwrap_or_default();
                self.fire(MappingEventType::MappingStarted, &class_mapping, &source, &pending);
                let result = self.map_root_value(
                    &mut ctx,
                    &class_mapping,
                    &source,
                    &destination_type,
                    existing,
                    map_id,
                );
                let produced = result.as_ref().map_or(pending, Clone::clone);
                self.fire(MappingEventType::MappingFinished, &class_mapping, &source, &produced);
                result
            });

        self.statistics.increment(StatisticType::MappingTime, elapsed_ms(started));
        match &outcome {
            Ok(_) => self.statistics.increment(StatisticType::MappingSuccessCount, 1),
            Err(err) => {
                self.statistics.increment(StatisticType::MappingFailureCount, 1);
                error!(source = %source_type, destination = %destination_type, error = %err, "mapping failed");
            }
        }
        outcome
    }

    fn map_root_value(
        &self,
        ctx: &mut MappingContext,
        class_mapping: &Arc<ClassMapping>,
        source: &Value,
        destination_type: &TypeRef,
        existing: Option<Value>,
        map_id: Option<&str>,
    ) -> Result<Value> {
        let source_type = source.resolved_type();
        if let Some(converter) = self.converter_for(class_mapping, &source_type, destination_type)? {
            let existing = existing.unwrap_or_default();
            return self.invoke_converter(&converter, &existing, source, destination_type, &source_type, None);
        }
        let destination = match existing {
            Some(destination) => destination,
            None => self.create_bean(source, class_mapping, destination_type, None)?,
        };
        self.map_class(ctx, Some(Arc::clone(class_mapping)), source, &destination, false, map_id)?;
        Ok(destination)
    }

    /// Class mapping for a runtime pair, created and registered on first
    /// use when none is declared.
    pub(crate) fn class_mapping(
        &self,
        source: &TypeRef,
        destination: &TypeRef,
        map_id: Option<&str>,
    ) -> Result<Arc<ClassMapping>> {
        if let Some(found) = self.model.find(source, destination, map_id) {
            return Ok(found);
        }
        if let Some(id) = map_id {
            return Err(MappingError::unresolved(format!(
                "no class mapping with map-id '{id}' for {source} -> {destination}"
            )));
        }
        let default = ClassMapping::structural_default(
            self.schema(),
            self.configuration(),
            source.clone(),
            destination.clone(),
        );
        debug!(
            source = %source,
            destination = %destination,
            fields = default.field_mappings.len(),
            "created default class mapping"
        );
        Ok(self.model.register_default(default))
    }

    pub(crate) fn create_bean(
        &self,
        source: &Value,
        class_mapping: &ClassMapping,
        requested: &TypeRef,
        create_method: Option<&str>,
    ) -> Result<Value> {
        let directive = BeanCreationDirective {
            source,
            source_type: &class_mapping.source.ty,
            destination_type: &class_mapping.destination.ty,
            runtime_destination_type: requested,
            factory: class_mapping.destination.bean_factory.as_deref(),
            factory_id: class_mapping.destination.factory_bean_id.as_deref(),
            create_method: create_method.or(class_mapping.destination.create_method.as_deref()),
        };
        self.beans.create(self.schema(), &directive)
    }

    /// Apply a class mapping to `destination`. Ancestor mappings run first
    /// unless `bypass_super` is set; fields they cover are then skipped.
    pub(crate) fn map_class(
        &self,
        ctx: &mut MappingContext,
        class_mapping: Option<Arc<ClassMapping>>,
        source: &Value,
        destination: &Value,
        bypass_super: bool,
        map_id: Option<&str>,
    ) -> Result<()> {
        let source = source.clone().deproxy();
        ctx.register(&source, destination);
        let source_type = source.resolved_type();
        let destination_type = destination.resolved_type();
        let class_mapping = match class_mapping {
            Some(class_mapping) => class_mapping,
            None => self.class_mapping(&source_type, &destination_type, map_id)?,
        };

        if let Some(converter) = self.converter_for(&class_mapping, &source_type, &destination_type)? {
            self.invoke_converter(&converter, destination, &source, &destination_type, &source_type, None)?;
            return Ok(());
        }

        let inherited = if bypass_super {
            HashSet::new()
        } else {
            self.map_parent_fields(ctx, &class_mapping, &source, destination, map_id)?
        };
        trace!(mapping = %class_mapping.key(), fields = class_mapping.field_mappings.len(), "mapping fields");
        for field in &class_mapping.field_mappings {
            if inherited.contains(&field.destination_key()) {
                continue;
            }
            self.map_field(ctx, &class_mapping, field, &source, destination)?;
        }
        Ok(())
    }

    /// Run ancestor mappings, minus the fields `class_mapping` redefines.
    /// Returns the destination keys they handled.
    fn map_parent_fields(
        &self,
        ctx: &mut MappingContext,
        class_mapping: &ClassMapping,
        source: &Value,
        destination: &Value,
        map_id: Option<&str>,
    ) -> Result<HashSet<String>> {
        let parents = self.super_types.super_mappings(
            self.model.as_ref(),
            &source.resolved_type(),
            &destination.resolved_type(),
        );
        let mut handled = HashSet::new();
        if parents.is_empty() {
            return Ok(handled);
        }
        let overridden: HashSet<String> = class_mapping.field_keys().into_iter().collect();
        for parent in parents.iter() {
            let trimmed = Arc::new(parent.copy_without(&overridden));
            handled.extend(trimmed.field_keys());
            self.map_class(ctx, Some(trimmed), source, destination, true, map_id)?;
        }
        Ok(handled)
    }

    fn map_field(
        &self,
        ctx: &mut MappingContext,
        class_mapping: &ClassMapping,
        field: &FieldMapping,
        source: &Value,
        destination: &Value,
    ) -> Result<()> {
        if field.is_excluded() {
            return Ok(());
        }
        let options = field.options(&class_mapping.options);
        let stop_on_errors = options.stop_on_errors;
        let mut source_value = Value::Null;
        let outcome = self
            .field_scope(class_mapping, field, options, source, destination)
            .and_then(|scope| self.try_map_field(ctx, &scope, &mut source_value));

        match outcome {
            Ok(()) => {
                self.statistics.increment(StatisticType::FieldMappingSuccessCount, 1);
                Ok(())
            }
            Err(err) => {
                error!(
                    source_type = %source.resolved_type(),
                    destination_type = %destination.resolved_type(),
                    source_field = %field.source.key_string(),
                    destination_field = %field.destination_key(),
                    source_value = ?source_value,
                    error = %err,
                    "field mapping failed"
                );
                self.statistics.increment(StatisticType::FieldMappingFailureCount, 1);
                if stop_on_errors || class_mapping.options.is_allowed(err.kind()) {
                    return Err(err);
                }
                self.statistics.increment(StatisticType::FieldMappingFailureIgnoredCount, 1);
                Ok(())
            }
        }
    }

    fn field_scope<'a>(
        &self,
        class_mapping: &'a ClassMapping,
        field: &'a FieldMapping,
        options: FieldOptions,
        source: &'a Value,
        destination: &'a Value,
    ) -> Result<FieldScope<'a>> {
        let schema = self.schema();
        let source_field = match &field.kind {
            FieldMappingKind::MultiSource(_) | FieldMappingKind::EmptySource => None,
            _ => Some(self.accessors.resolve(schema, &source.resolved_type(), &field.source)?),
        };
        let source_type = match (&field.kind, &source_field) {
            (FieldMappingKind::MultiSource(_), _) => TypeRef::list(TypeRef::Any),
            (_, Some(accessor)) => accessor.field_type().clone(),
            (_, None) => TypeRef::Any,
        };
        let destination_owner = destination.resolved_type();
        let destination_field = self.accessors.resolve(schema, &destination_owner, &field.destination)?;
        let declared_required = match &destination_owner {
            TypeRef::Class(class) if !field.destination.is_deep() && field.destination.key.is_none() => {
                schema.field(class, &field.destination.name).is_some_and(|f| f.required)
            }
            _ => false,
        };
        Ok(FieldScope {
            class_mapping,
            field,
            options,
            source,
            destination,
            source_type,
            source_field,
            destination_field,
            required: field.destination.required || declared_required,
            element: false,
        })
    }

    fn try_map_field(&self, ctx: &mut MappingContext, scope: &FieldScope<'_>, source_value: &mut Value) -> Result<()> {
        *source_value = self.read_source(scope)?;
        if let Some(custom) = &self.field_mapper {
            let handled = custom
                .map_field(scope.source, scope.destination, source_value, scope.class_mapping, scope.field)
                .map_err(|e| MappingError::callback("custom field mapper failed", e))?;
            if handled {
                return Ok(());
            }
        }
        let value = source_value.clone();
        let multi_source = matches!(scope.field.kind, FieldMappingKind::MultiSource(_));
        if scope.field.destination.iterate && !multi_source {
            return self.map_iterated(ctx, scope, &value);
        }
        self.map_from_field_map(ctx, scope, value)
    }

    fn read_source(&self, scope: &FieldScope<'_>) -> Result<Value> {
        if let FieldMappingKind::MultiSource(sources) = &scope.field.kind {
            let owner = scope.source.resolved_type();
            let mut values = Vec::with_capacity(sources.len());
            for descriptor in sources {
                let accessor = self.accessors.resolve(self.schema(), &owner, descriptor)?;
                values.push(accessor.read(self.env(), scope.source)?);
            }
            return Ok(Value::List(values));
        }
        match &scope.source_field {
            Some(accessor) => accessor.read(self.env(), scope.source),
            None => Ok(Value::Null),
        }
    }

    fn map_from_field_map(&self, ctx: &mut MappingContext, scope: &FieldScope<'_>, source_value: Value) -> Result<()> {
        let destination_type = scope.destination_type().clone();
        let source_type = if source_value.is_null() {
            scope.source_type.clone()
        } else {
            source_value.resolved_type()
        };

        if let Some(reference) = &scope.field.condition {
            let condition = self
                .conditions
                .resolve(reference)
                .ok_or_else(|| MappingError::unresolved(format!("mapping condition {reference} is not registered")))?;
            let existing = self.existing_value(scope, &destination_type)?;
            let proceed = condition
                .evaluate(&source_value, &existing, &source_type, &destination_type)
                .map_err(|e| MappingError::callback(format!("mapping condition {reference} failed"), e))?;
            if !proceed {
                trace!(field = %scope.field.destination_key(), "condition skipped field");
                return Ok(());
            }
        }

        let value = match &scope.field.converter {
            Some(reference) => {
                let converter = self
                    .converters
                    .resolve(reference)
                    .ok_or_else(|| MappingError::unresolved(format!("converter {reference} is not registered")))?;
                let existing = self.existing_value(scope, &destination_type)?;
                self.invoke_converter(
                    &converter,
                    &existing,
                    &source_value,
                    &destination_type,
                    &source_type,
                    scope.field.converter_param.as_deref(),
                )?
            }
            None if matches!(scope.field.kind, FieldMappingKind::MultiSource(_)) => {
                return Err(MappingError::unresolved(format!(
                    "custom converter should be provided for multi-source field '{}'",
                    scope.field.destination_key()
                )));
            }
            None => self.map_or_recurse(ctx, scope, &source_value, &destination_type)?,
        };

        self.write_destination(scope, value, &source_value)?;
        debug!(
            source_field = %scope.field.source.key_string(),
            destination_field = %scope.field.destination_key(),
            "field mapped"
        );
        Ok(())
    }

    /// Append each element of a collection source to the destination
    /// field, one write per element.
    fn map_iterated(&self, ctx: &mut MappingContext, scope: &FieldScope<'_>, source_value: &Value) -> Result<()> {
        if source_value.is_null() {
            return Ok(());
        }
        let items = source_value.items().ok_or_else(|| {
            MappingError::unresolved(format!(
                "iterate field '{}' needs a collection source, got {}",
                scope.field.destination_key(),
                source_value.resolved_type()
            ))
        })?;
        let hint = scope
            .destination_hints()
            .or_else(|| scope.source_hints())
            .and_then(HintContainer::hint)
            .cloned()
            .ok_or_else(|| {
                MappingError::unresolved(format!(
                    "iterate field '{}' must have a source or destination type hint",
                    scope.field.destination_key()
                ))
            })?;

        for item in items {
            if item.is_null() {
                continue;
            }
            let item = item.clone().deproxy();
            let item_type = item.resolved_type();
            let value = match self.converter_for(scope.class_mapping, &item_type, &hint)? {
                Some(converter) => {
                    self.invoke_converter(&converter, &Value::Null, &item, &hint, &item_type, None)?
                }
                None => match ctx.mapped_value(self.schema(), &item, &hint) {
                    Some(mapped) => mapped,
                    None => self.map_standalone(ctx, &item, &hint)?,
                },
            };
            if !value.is_null() {
                self.write_destination(scope, value, &Value::Null)?;
            }
        }
        Ok(())
    }

    /// Map a value to `target` with no enclosing field.
    fn map_standalone(&self, ctx: &mut MappingContext, value: &Value, target: &TypeRef) -> Result<Value> {
        let value_type = value.resolved_type();
        if value_type.is_scalar() || target.is_scalar() || target.is_enum() {
            return Ok(PrimitiveConverter::new(self.schema()).convert(value, target)?);
        }
        let class_mapping = self.class_mapping(&value_type, target, None)?;
        let created = self.create_bean(value, &class_mapping, target, None)?;
        self.map_class(ctx, Some(class_mapping), value, &created, false, None)?;
        Ok(created)
    }

    /// Produce the destination value for `source_value`.
    pub(crate) fn map_or_recurse(
        &self,
        ctx: &mut MappingContext,
        scope: &FieldScope<'_>,
        source_value: &Value,
        destination_type: &TypeRef,
    ) -> Result<Value> {
        let source_value = source_value.clone().deproxy();
        let source_type = if source_value.is_null() {
            scope.source_type.clone()
        } else {
            source_value.resolved_type()
        };

        if let Some(converter) = self.converter_for(scope.class_mapping, &source_type, destination_type)? {
            let existing = self.existing_value(scope, destination_type)?;
            return self.invoke_converter(
                &converter,
                &existing,
                &source_value,
                destination_type,
                &source_type,
                scope.field.converter_param.as_deref(),
            );
        }
        if source_value.is_null() {
            return Ok(Value::Null);
        }
        if !scope.field.is_self_to_self()
            && let Some(mapped) = ctx.mapped_value(self.schema(), &source_value, destination_type)
        {
            return Ok(mapped);
        }
        let by_reference = scope
            .field
            .copy_by_reference
            .unwrap_or_else(|| self.configuration().is_copy_by_reference(&source_type));
        if by_reference {
            return Ok(source_value);
        }

        let mut destination_type = destination_type.clone();
        if destination_type.is_any() {
            destination_type = scope
                .destination_hints()
                .and_then(HintContainer::hint)
                .cloned()
                .unwrap_or_else(|| source_type.clone());
        }

        if let (Value::Map(map), TypeRef::Map(..)) = (&source_value, &destination_type) {
            return self.map_map(ctx, scope, map, &destination_type);
        }

        if source_type.is_scalar() || destination_type.is_scalar() {
            if let Some(hint) = scope.destination_hints().and_then(HintContainer::hint) {
                destination_type = hint.clone();
            }
            let mut value = source_value;
            if scope.options.trim_strings
                && let Value::Str(text) = &mut value
            {
                *text = text.trim().to_string();
            }
            // map entries of a non-scalar declared type keep the scalar as is
            if scope.is_map_backed() && !destination_type.is_scalar() && !destination_type.is_enum() {
                return Ok(value);
            }
            return Ok(self.primitive(scope).convert(&value, &destination_type)?);
        }

        if source_value.is_collection() || destination_type.is_collection() {
            return self.map_collection(ctx, scope, &source_value, &destination_type);
        }

        if let (Value::Enum(_), TypeRef::Enum(_)) = (&source_value, &destination_type) {
            return Ok(self.primitive(scope).convert(&source_value, &destination_type)?);
        }

        self.map_custom_object(ctx, scope, &source_value, &destination_type)
    }

    fn map_custom_object(
        &self,
        ctx: &mut MappingContext,
        scope: &FieldScope<'_>,
        source_value: &Value,
        destination_type: &TypeRef,
    ) -> Result<Value> {
        let map_id = scope.field.map_id.as_deref();
        let existing = self.existing_value(scope, destination_type)?;
        if matches!(existing, Value::Object(_) | Value::Map(_)) {
            self.map_class(ctx, None, source_value, &existing, false, map_id)?;
            return Ok(existing);
        }

        let source_type = source_value.resolved_type();
        let target = match scope.destination_hints() {
            Some(hints) => hints
                .hint_for(&source_type, scope.source_hints())
                .cloned()
                .ok_or_else(|| {
                    MappingError::unresolved(format!(
                        "no destination hint for {source_type} in field '{}'",
                        scope.field.destination_key()
                    ))
                })?,
            None => destination_type.clone(),
        };
        let class_mapping = self.class_mapping(&source_type, &target, map_id)?;
        let created = self.create_bean(
            source_value,
            &class_mapping,
            &target,
            scope.field.destination.create_method.as_deref(),
        )?;
        self.map_class(ctx, Some(class_mapping), source_value, &created, false, map_id)?;
        Ok(created)
    }

    /// Write `value` into the destination field, applying the null, empty
    /// string, trimming and required-field rules.
    pub(crate) fn write_destination(&self, scope: &FieldScope<'_>, value: Value, source_value: &Value) -> Result<()> {
        let mut value = if value.is_null() {
            self.default_value(scope, source_value)?.unwrap_or_default()
        } else {
            value
        };
        let mut bypass = value.is_null() && !scope.options.map_null;
        if value.is_null() && scope.required {
            return Err(MappingError::RequiredFieldViolation {
                field: scope.field.destination_key(),
            });
        }
        if let Value::Str(text) = &mut value {
            if text.is_empty() && !scope.options.map_empty_string {
                bypass = true;
            }
            if scope.options.trim_strings {
                *text = text.trim().to_string();
            }
        }
        if bypass {
            trace!(field = %scope.field.destination_key(), "write skipped");
            return Ok(());
        }

        trace!(field = %scope.field.destination_key(), value = ?value, "writing destination value");
        self.fire_write(MappingEventType::PreWritingDestValue, scope, &value);
        scope
            .destination_field
            .write(self.env(), scope.destination, value.clone())?;
        self.fire_write(MappingEventType::PostWritingDestValue, scope, &value);
        Ok(())
    }

    fn default_value(&self, scope: &FieldScope<'_>, source_value: &Value) -> Result<Option<Value>> {
        let Some(default) = &scope.field.destination.default_value else {
            return Ok(None);
        };
        let destination_type = scope.destination_type();
        if default == SELF_KEYWORD {
            let directive = BeanCreationDirective {
                source: source_value,
                source_type: &scope.source_type,
                destination_type,
                runtime_destination_type: destination_type,
                factory: None,
                factory_id: None,
                create_method: scope.field.destination.create_method.as_deref(),
            };
            return self.beans.create(self.schema(), &directive).map(Some);
        }
        let target = if destination_type.is_any() {
            TypeRef::string()
        } else {
            destination_type.clone()
        };
        Ok(Some(
            self.primitive(scope)
                .convert(&Value::from(default.as_str()), &target)?,
        ))
    }

    /// Current value of the destination field. Containers are not reported
    /// as existing values for non-container destination types.
    pub(crate) fn existing_value(&self, scope: &FieldScope<'_>, destination_type: &TypeRef) -> Result<Value> {
        let current = self.current_destination(scope)?;
        let container = current.is_collection() || current.as_map().is_some();
        if container && !(destination_type.is_collection() || destination_type.is_map()) {
            return Ok(Value::Null);
        }
        Ok(current)
    }

    pub(crate) fn current_destination(&self, scope: &FieldScope<'_>) -> Result<Value> {
        if scope.element {
            return Ok(Value::Null);
        }
        scope.destination_field.read(self.env(), scope.destination)
    }

    pub(crate) fn primitive<'s>(&'s self, scope: &'s FieldScope<'_>) -> PrimitiveConverter<'s> {
        PrimitiveConverter::new(self.schema()).with_date_format(scope.options.date_format.as_deref())
    }

    /// Merge `source` into an equivalent element already present in the
    /// destination.
    pub(crate) fn merge_into_existing(&self, ctx: &mut MappingContext, source: &Value, existing: &Value) -> Result<()> {
        let mergeable = |v: &Value| matches!(v, Value::Object(_) | Value::Map(_));
        if mergeable(source) && mergeable(existing) {
            self.map_class(ctx, None, source, existing, false, None)?;
        }
        Ok(())
    }

    fn converter_for(
        &self,
        class_mapping: &ClassMapping,
        source_type: &TypeRef,
        destination_type: &TypeRef,
    ) -> Result<Option<ConverterHandle>> {
        match self
            .converters
            .find(self.schema(), &class_mapping.converters, source_type, destination_type)
        {
            ConverterMatch::Found(converter) => Ok(Some(converter)),
            ConverterMatch::Unregistered(reference) => Err(MappingError::unresolved(format!(
                "converter {reference} is not registered"
            ))),
            ConverterMatch::None => Ok(None),
        }
    }

    fn invoke_converter(
        &self,
        converter: &ConverterHandle,
        existing: &Value,
        source: &Value,
        destination_type: &TypeRef,
        source_type: &TypeRef,
        parameter: Option<&str>,
    ) -> Result<Value> {
        let started = Instant::now();
        let value = converter
            .invoke_with(self, existing, source, destination_type, source_type, parameter)
            .map_err(|e| {
                MappingError::callback(format!("custom converter failed for {source_type} -> {destination_type}"), e)
            })?;
        self.statistics.increment(StatisticType::CustomConverterSuccessCount, 1);
        self.statistics.increment(StatisticType::CustomConverterTime, elapsed_ms(started));
        Ok(value)
    }

    fn fire(&self, event_type: MappingEventType, class_mapping: &ClassMapping, source: &Value, destination: &Value) {
        if self.listeners.is_empty() {
            return;
        }
        let event = MappingEvent {
            event_type,
            class_mapping,
            field_mapping: None,
            source,
            destination,
            written_value: None,
        };
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    fn fire_write(&self, event_type: MappingEventType, scope: &FieldScope<'_>, value: &Value) {
        if self.listeners.is_empty() {
            return;
        }
        let event = MappingEvent {
            event_type,
            class_mapping: scope.class_mapping,
            field_mapping: Some(scope.field),
            source: scope.source,
            destination: scope.destination,
            written_value: Some(value),
        };
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}
