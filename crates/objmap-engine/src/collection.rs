//! Collection, array and map handling.
//!
//! Supported source/destination shapes:
//!
//! | source        | destination | result                                   |
//! |---------------|-------------|------------------------------------------|
//! | array         | array       | primitive arrays append, others merge    |
//! | array         | list        | list                                     |
//! | list, set     | array       | array of the destination component type  |
//! | list, set     | list        | list                                     |
//! | array, list, set | set      | set                                      |
//! | list, set     | map         | list stored under the map-typed field    |
//! | map           | map         | entry-wise                               |
//!
//! Anything else is an unresolved mapping.

use objmap_model::{HintContainer, MapRef, Schema, Shape, TypeRef, Value};

use crate::context::MappingContext;
use crate::error::{MappingError, Result};
use crate::mapper::BeanMapper;
use crate::processor::FieldScope;

impl BeanMapper {
    pub(crate) fn map_collection(
        &self,
        ctx: &mut MappingContext,
        scope: &FieldScope<'_>,
        source: &Value,
        destination_type: &TypeRef,
    ) -> Result<Value> {
        let hints = scope.destination_hints().cloned().or_else(|| {
            destination_type
                .element_type()
                .filter(|t| !t.is_any())
                .map(|t| HintContainer::single(t.clone()))
        });
        let hints = hints.as_ref();
        let source_type = source.resolved_type();
        let items = source.items().unwrap_or_default();

        match (source_type.shape(), destination_type.shape()) {
            (Some(Shape::Array), Some(Shape::Array)) => {
                let component = component_of(destination_type)
                    .or_else(|| component_of(&source_type))
                    .unwrap_or(TypeRef::Any);
                if source_type.is_primitive_array() {
                    return self.add_to_primitive_array(ctx, scope, items, &component);
                }
                let entry = (!component.is_any()).then(|| component.clone());
                let list = self.add_or_update_list(ctx, scope, items, entry, hints)?;
                Ok(Value::array(component, list))
            }
            (Some(Shape::Array), Some(Shape::List)) => {
                let entry = hints
                    .and_then(HintContainer::hint)
                    .cloned()
                    .or_else(|| component_of(&source_type));
                Ok(Value::List(self.add_or_update_list(ctx, scope, items, entry, hints)?))
            }
            (Some(Shape::List | Shape::Set), Some(Shape::Array)) => {
                let component = component_of(destination_type)
                    .or_else(|| hints.and_then(HintContainer::hint).cloned())
                    .unwrap_or(TypeRef::Any);
                let entry = (!component.is_any()).then(|| component.clone());
                let list = self.add_or_update_list(ctx, scope, items, entry, hints)?;
                Ok(Value::array(component, list))
            }
            (Some(Shape::List | Shape::Set), Some(Shape::List | Shape::Map)) => {
                Ok(Value::List(self.add_or_update_list(ctx, scope, items, None, hints)?))
            }
            (Some(Shape::Array | Shape::List | Shape::Set), Some(Shape::Set)) => {
                Ok(Value::Set(self.add_to_set(ctx, scope, items, hints)?))
            }
            _ => Err(MappingError::unresolved(format!(
                "unsupported collection mapping {source_type} -> {destination_type} for field '{}'",
                scope.field.destination_key()
            ))),
        }
    }

    /// Primitive arrays always accumulate: existing items, then the new ones.
    fn add_to_primitive_array(
        &self,
        ctx: &mut MappingContext,
        scope: &FieldScope<'_>,
        items: &[Value],
        component: &TypeRef,
    ) -> Result<Value> {
        let mut out = self.current_destination(scope)?.into_items().unwrap_or_default();
        let elements = scope.for_elements();
        for item in items {
            out.push(self.map_or_recurse(ctx, &elements, item, component)?);
        }
        Ok(Value::array(component.clone(), out))
    }

    fn add_or_update_list(
        &self,
        ctx: &mut MappingContext,
        scope: &FieldScope<'_>,
        items: &[Value],
        entry: Option<TypeRef>,
        hints: Option<&HintContainer>,
    ) -> Result<Vec<Value>> {
        let schema = self.schema();
        let mut result = match self.current_destination(scope)? {
            current @ (Value::List(_) | Value::Array(_)) => current.into_items().unwrap_or_default(),
            _ => Vec::new(),
        };
        let mut mapped = Vec::new();
        let mut entry = entry;
        let elements = scope.for_elements();

        for item in items {
            let value = self.map_element(ctx, &elements, item, &mut entry, hints)?;
            if scope.is_non_cumulative()
                && let Some(existing) = result.iter().find(|r| schema.equivalent(r, &value)).cloned()
            {
                self.merge_into_existing(ctx, item, &existing)?;
                if !existing.is_null() {
                    mapped.push(existing);
                }
                continue;
            }
            result.push(value.clone());
            mapped.push(value);
        }

        if scope.field.remove_orphans {
            retain_mapped(schema, &mut result, &mapped);
        }
        Ok(result)
    }

    fn add_to_set(
        &self,
        ctx: &mut MappingContext,
        scope: &FieldScope<'_>,
        items: &[Value],
        hints: Option<&HintContainer>,
    ) -> Result<Vec<Value>> {
        let schema = self.schema();
        let mut result = Vec::new();
        for existing in self.current_destination(scope)?.into_items().unwrap_or_default() {
            push_unique(schema, &mut result, existing);
        }
        let mut mapped = Vec::new();
        let mut entry = None;
        let elements = scope.for_elements();

        for item in items {
            let value = self.map_element(ctx, &elements, item, &mut entry, hints)?;
            if scope.is_non_cumulative()
                && let Some(existing) = result.iter().find(|r| schema.equivalent(r, &value)).cloned()
            {
                self.merge_into_existing(ctx, item, &existing)?;
                push_unique(schema, &mut mapped, existing);
                continue;
            }
            push_unique(schema, &mut result, value.clone());
            push_unique(schema, &mut mapped, value);
        }

        if scope.field.remove_orphans {
            result = mapped;
        }
        Ok(result)
    }

    /// Map one collection element. The entry type is re-derived when unknown
    /// or when several hints apply; a null element keeps the previous one.
    fn map_element(
        &self,
        ctx: &mut MappingContext,
        elements: &FieldScope<'_>,
        item: &Value,
        entry: &mut Option<TypeRef>,
        hints: Option<&HintContainer>,
    ) -> Result<Value> {
        let multiple = hints.is_some_and(HintContainer::has_more_than_one_hint);
        if (entry.is_none() || multiple) && !item.is_null() {
            *entry = Some(element_target(elements, hints, &item.resolved_type())?);
        }
        if !item.is_null() && self.configuration().is_copy_by_reference(&item.resolved_type()) {
            return Ok(item.clone());
        }
        let target = entry.clone().unwrap_or(TypeRef::Any);
        self.map_or_recurse(ctx, elements, item, &target)
    }

    pub(crate) fn map_map(
        &self,
        ctx: &mut MappingContext,
        scope: &FieldScope<'_>,
        source: &MapRef,
        destination_type: &TypeRef,
    ) -> Result<Value> {
        let schema = self.schema();
        let result = match self.current_destination(scope)? {
            Value::Map(existing) if !existing.ptr_eq(source) => {
                if scope.field.remove_orphans {
                    existing.clear();
                }
                existing
            }
            _ => MapRef::new(),
        };
        let value_type = destination_type.element_type().filter(|t| !t.is_any()).cloned();
        let elements = scope.for_elements();

        for (key, value) in source.entries() {
            if value.is_null() {
                result.put(key, Value::Null);
                continue;
            }
            let target = value_type.clone().unwrap_or_else(|| value.resolved_type());
            let mapped = self.map_or_recurse(ctx, &elements, &value, &target)?;
            match result.get(&key) {
                Some(current)
                    if !current.is_null() && scope.is_non_cumulative() && schema.equivalent(&current, &mapped) =>
                {
                    self.merge_into_existing(ctx, &value, &current)?;
                }
                _ => result.put(key, mapped),
            }
        }
        Ok(Value::Map(result))
    }
}

fn component_of(ty: &TypeRef) -> Option<TypeRef> {
    ty.element_type().filter(|t| !t.is_any()).cloned()
}

fn element_target(scope: &FieldScope<'_>, hints: Option<&HintContainer>, runtime: &TypeRef) -> Result<TypeRef> {
    match hints {
        None => Ok(TypeRef::Any),
        Some(hints) => hints.hint_for(runtime, scope.source_hints()).cloned().ok_or_else(|| {
            MappingError::unresolved(format!(
                "no destination hint matches element type {runtime} in field '{}'",
                scope.field.destination_key()
            ))
        }),
    }
}

fn push_unique(schema: &Schema, items: &mut Vec<Value>, value: Value) {
    if !items.iter().any(|existing| schema.equivalent(existing, &value)) {
        items.push(value);
    }
}

/// Keep only elements produced or matched by this pass, then add any of
/// those still missing.
fn retain_mapped(schema: &Schema, result: &mut Vec<Value>, mapped: &[Value]) {
    result.retain(|r| mapped.iter().any(|m| schema.equivalent(m, r)));
    for m in mapped {
        if !result.iter().any(|r| schema.equivalent(r, m)) {
            result.push(m.clone());
        }
    }
}
