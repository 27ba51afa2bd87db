//! Recursive object-graph mapping.
//!
//! [`BeanMapper`] walks a source graph and builds or updates a destination
//! graph according to the class mappings of a
//! [`MappingModel`](objmap_model::MappingModel). Types without a declared
//! mapping are mapped structurally, field by same-named field.
//!
//! - [`Mapper`]: the `map_new` / `map_into` entry points.
//! - [`MappingEventListener`]: lifecycle and per-write events.
//! - [`StatisticsSink`]: counters for mappings, fields and converters.
//! - [`BeanFactory`]: user factories for destination instances.

pub mod accessor;
mod collection;
pub mod context;
pub mod error;
pub mod events;
pub mod factory;
pub mod mapper;
mod processor;
pub mod stats;
pub mod supertypes;

pub use accessor::{AccessEnv, AccessorCache, MAX_WRITE_INDEX, PropertyAccessor};
pub use context::MappingContext;
pub use error::{MappingError, Result};
pub use events::{MappingEvent, MappingEventListener, MappingEventType};
pub use factory::{BeanCreationDirective, BeanFactory, DestBeanCreator};
pub use mapper::{BeanMapper, BeanMapperBuilder, CustomFieldMapper, Mapper};
pub use stats::{NoopStatistics, StatisticType, Statistics, StatisticsSink};
pub use supertypes::SuperTypeCache;
