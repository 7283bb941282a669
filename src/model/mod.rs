//! # Object Model
//!
//! Schema descriptors, identifiers and stored values. These types are
//! shared by the query layer and every storage engine.
//!
//! Design rule: pure data, no I/O, no engine handles.

pub mod id;
pub mod entity;
pub mod value;
pub mod record;

pub use id::{EntityId, PropertyId, ObjectId, ConditionId};
pub use entity::{Entity, EntityModel, Property, PropertyType};
pub use value::Value;
pub use record::{FromValue, PropertyMap, Record};
