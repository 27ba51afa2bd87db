//! Public mapper facade and its builder.
//!
//! # Example
//!
//! ```
//! use objmap_engine::{BeanMapper, Mapper};
//! use objmap_model::{ClassDef, MappingBuilder, ObjectRef, Schema, TypeRef, Value};
//!
//! let schema = Schema::new()
//!     .with_class(ClassDef::new("Person").field("name", TypeRef::string()).field("age", TypeRef::string()))
//!     .with_class(ClassDef::new("PersonDto").field("fullName", TypeRef::string()).field("age", TypeRef::int()));
//!
//! let mapper = BeanMapper::builder(schema)
//!     .with_mapping(MappingBuilder::new("Person", "PersonDto").field("name", "fullName").build().unwrap())
//!     .build()
//!     .unwrap();
//!
//! let person = ObjectRef::with_fields("Person", [("name", "Ada"), ("age", "36")]);
//! let dto = mapper.map_new(&Value::from(person), &TypeRef::class("PersonDto"), None).unwrap();
//! let dto = dto.as_object().unwrap();
//! assert_eq!(dto.get("fullName"), Value::from("Ada"));
//! assert_eq!(dto.get("age"), Value::Int(36));
//! ```

use std::fmt;
use std::sync::Arc;

use objmap_convert::{ConditionRegistry, ConverterHandle, ConverterRegistry, MappingCondition, NestedMapper};
use objmap_model::{
    CallbackError, ClassMapping, ClassMappings, Configuration, FieldMapping, MappingModel, Schema, TypeRef, Value,
};
use tracing::info;

use crate::accessor::{AccessEnv, AccessorCache};
use crate::error::Result;
use crate::events::MappingEventListener;
use crate::factory::{BeanFactory, DestBeanCreator};
use crate::processor::Target;
use crate::stats::{NoopStatistics, StatisticsSink};
use crate::supertypes::SuperTypeCache;

/// Entry points for mapping one object graph onto another.
pub trait Mapper {
    /// Map `source` into a new instance of `destination_type`.
    ///
    /// # Errors
    ///
    /// Any [`MappingError`](crate::MappingError) not absorbed by the field
    /// error policy.
    fn map_new(&self, source: &Value, destination_type: &TypeRef, map_id: Option<&str>) -> Result<Value>;

    /// Map `source` onto an existing `destination`.
    ///
    /// # Errors
    ///
    /// Same as [`Mapper::map_new`].
    fn map_into(&self, source: &Value, destination: &Value, map_id: Option<&str>) -> Result<()>;
}

/// Hook that may take over individual field mappings.
pub trait CustomFieldMapper: Send + Sync {
    /// Return `true` when the field has been handled and the engine should
    /// skip it.
    fn map_field(
        &self,
        source: &Value,
        destination: &Value,
        source_value: &Value,
        class_mapping: &ClassMapping,
        field_mapping: &FieldMapping,
    ) -> std::result::Result<bool, CallbackError>;
}

impl<F> CustomFieldMapper for F
where
    F: Fn(&Value, &Value, &Value, &ClassMapping, &FieldMapping) -> std::result::Result<bool, CallbackError>
        + Send
        + Sync,
{
    fn map_field(
        &self,
        source: &Value,
        destination: &Value,
        source_value: &Value,
        class_mapping: &ClassMapping,
        field_mapping: &FieldMapping,
    ) -> std::result::Result<bool, CallbackError> {
        self(source, destination, source_value, class_mapping, field_mapping)
    }
}

/// Mapper over a fixed mapping model. Shareable between threads; each call
/// keeps its own visited set.
pub struct BeanMapper {
    pub(crate) model: Arc<dyn MappingModel>,
    pub(crate) converters: ConverterRegistry,
    pub(crate) conditions: ConditionRegistry,
    pub(crate) beans: DestBeanCreator,
    pub(crate) listeners: Vec<Arc<dyn MappingEventListener>>,
    pub(crate) statistics: Arc<dyn StatisticsSink>,
    pub(crate) field_mapper: Option<Arc<dyn CustomFieldMapper>>,
    pub(crate) accessors: AccessorCache,
    pub(crate) super_types: SuperTypeCache,
}

impl BeanMapper {
    pub fn builder(schema: Schema) -> BeanMapperBuilder {
        BeanMapperBuilder::new(schema)
    }

    pub fn model(&self) -> &dyn MappingModel {
        self.model.as_ref()
    }

    pub fn schema(&self) -> &Schema {
        self.model.schema()
    }

    pub(crate) fn configuration(&self) -> &Configuration {
        self.model.configuration()
    }

    pub(crate) fn env(&self) -> AccessEnv<'_> {
        AccessEnv {
            schema: self.model.schema(),
            beans: &self.beans,
        }
    }
}

impl Mapper for BeanMapper {
    fn map_new(&self, source: &Value, destination_type: &TypeRef, map_id: Option<&str>) -> Result<Value> {
        self.map_root(source, Target::Type(destination_type), map_id)
    }

    fn map_into(&self, source: &Value, destination: &Value, map_id: Option<&str>) -> Result<()> {
        self.map_root(source, Target::Instance(destination), map_id).map(|_| ())
    }
}

impl NestedMapper for BeanMapper {
    fn map_nested(
        &self,
        source: &Value,
        destination_type: &TypeRef,
        map_id: Option<&str>,
    ) -> std::result::Result<Value, CallbackError> {
        self.map_new(source, destination_type, map_id)
            .map_err(|err| CallbackError::new(err.kind(), err.to_string()))
    }
}

impl fmt::Debug for BeanMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanMapper")
            .field("converters", &self.converters)
            .field("conditions", &self.conditions)
            .field("beans", &self.beans)
            .field("listeners", &self.listeners.len())
            .field("custom_field_mapper", &self.field_mapper.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`BeanMapper`].
pub struct BeanMapperBuilder {
    schema: Schema,
    configuration: Configuration,
    mappings: Vec<ClassMapping>,
    model: Option<Arc<dyn MappingModel>>,
    converters: ConverterRegistry,
    conditions: ConditionRegistry,
    beans: DestBeanCreator,
    listeners: Vec<Arc<dyn MappingEventListener>>,
    statistics: Arc<dyn StatisticsSink>,
    field_mapper: Option<Arc<dyn CustomFieldMapper>>,
}

impl BeanMapperBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            configuration: Configuration::default(),
            mappings: Vec::new(),
            model: None,
            converters: ConverterRegistry::new(),
            conditions: ConditionRegistry::new(),
            beans: DestBeanCreator::new(),
            listeners: Vec::new(),
            statistics: Arc::new(NoopStatistics),
            field_mapper: None,
        }
    }

    #[must_use]
    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: ClassMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Use a prebuilt model; schema, configuration and mappings given to
    /// this builder are then ignored.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn MappingModel>) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn with_converter_id(mut self, id: impl Into<String>, converter: ConverterHandle) -> Self {
        self.converters.register_id(id, converter);
        self
    }

    #[must_use]
    pub fn with_converter_type(mut self, type_name: impl Into<String>, converter: ConverterHandle) -> Self {
        self.converters.register_type(type_name, converter);
        self
    }

    /// Converter applied to every value pair matching (`class_a`, `class_b`)
    /// in either direction.
    #[must_use]
    pub fn with_global_converter(mut self, class_a: TypeRef, class_b: TypeRef, converter: ConverterHandle) -> Self {
        self.converters.register_global(class_a, class_b, converter);
        self
    }

    #[must_use]
    pub fn with_condition_id(mut self, id: impl Into<String>, condition: impl MappingCondition + 'static) -> Self {
        self.conditions.register_id(id, condition);
        self
    }

    #[must_use]
    pub fn with_condition_type(
        mut self,
        type_name: impl Into<String>,
        condition: impl MappingCondition + 'static,
    ) -> Self {
        self.conditions.register_type(type_name, condition);
        self
    }

    #[must_use]
    pub fn with_bean_factory(mut self, name: impl Into<String>, factory: impl BeanFactory + 'static) -> Self {
        self.beans.register(name, factory);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: impl MappingEventListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    #[must_use]
    pub fn with_statistics(mut self, statistics: Arc<dyn StatisticsSink>) -> Self {
        self.statistics = statistics;
        self
    }

    #[must_use]
    pub fn with_custom_field_mapper(mut self, mapper: impl CustomFieldMapper + 'static) -> Self {
        self.field_mapper = Some(Arc::new(mapper));
        self
    }

    /// Register the mappings and assemble the mapper.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateMapping`](objmap_model::ModelError::DuplicateMapping)
    /// when two mappings share a key.
    pub fn build(self) -> objmap_model::Result<BeanMapper> {
        let model = match self.model {
            Some(model) => model,
            None => {
                let mut mappings = ClassMappings::new(Arc::new(self.schema), self.configuration);
                for mapping in self.mappings {
                    mappings.add(mapping)?;
                }
                Arc::new(mappings) as Arc<dyn MappingModel>
            }
        };
        info!(
            listeners = self.listeners.len(),
            custom_field_mapper = self.field_mapper.is_some(),
            "bean mapper ready"
        );
        Ok(BeanMapper {
            model,
            converters: self.converters,
            conditions: self.conditions,
            beans: self.beans,
            listeners: self.listeners,
            statistics: self.statistics,
            field_mapper: self.field_mapper,
            accessors: AccessorCache::new(),
            super_types: SuperTypeCache::new(),
        })
    }
}
