//! Entity schema: the entity descriptor, its properties, and the decode
//! contract for turning raw records into caller objects.

use serde::{Deserialize, Serialize};

use super::{EntityId, PropertyId};
use crate::Result;

/// Declared storage type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    /// Platform-width signed integer, stored as 64 bits.
    Int,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// Platform-width unsigned integer, stored as 64 bits.
    UInt,
    /// Unicode scalar value, stored as a 32-bit integer.
    Rune,
    Byte,
    Float32,
    Float64,
    Text,
    ByteVector,
}

impl PropertyType {
    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PropertyType::Int8
                | PropertyType::Int16
                | PropertyType::Int32
                | PropertyType::Int64
                | PropertyType::Int
                | PropertyType::Rune
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            PropertyType::UInt8
                | PropertyType::UInt16
                | PropertyType::UInt32
                | PropertyType::UInt64
                | PropertyType::UInt
                | PropertyType::Byte
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, PropertyType::Float32 | PropertyType::Float64)
    }

    /// Storage width in bits for integer types, `None` otherwise.
    pub fn int_width(self) -> Option<u32> {
        match self {
            PropertyType::Int8 | PropertyType::UInt8 | PropertyType::Byte => Some(8),
            PropertyType::Int16 | PropertyType::UInt16 => Some(16),
            PropertyType::Int32 | PropertyType::UInt32 | PropertyType::Rune => Some(32),
            PropertyType::Int64
            | PropertyType::UInt64
            | PropertyType::Int
            | PropertyType::UInt => Some(64),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Bool => "Bool",
            PropertyType::Int8 => "Int8",
            PropertyType::Int16 => "Int16",
            PropertyType::Int32 => "Int32",
            PropertyType::Int64 => "Int64",
            PropertyType::Int => "Int",
            PropertyType::UInt8 => "UInt8",
            PropertyType::UInt16 => "UInt16",
            PropertyType::UInt32 => "UInt32",
            PropertyType::UInt64 => "UInt64",
            PropertyType::UInt => "UInt",
            PropertyType::Rune => "Rune",
            PropertyType::Byte => "Byte",
            PropertyType::Float32 => "Float32",
            PropertyType::Float64 => "Float64",
            PropertyType::Text => "Text",
            PropertyType::ByteVector => "ByteVector",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single declared field of an entity.
///
/// Created once when the schema is loaded and owned by its `EntityModel`.
/// Typed property views borrow it; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub entity: EntityId,
    pub name: String,
    pub kind: PropertyType,
}

/// Schema of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityModel {
    pub id: EntityId,
    pub name: String,
    pub properties: Vec<Property>,
}

impl EntityModel {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), properties: Vec::new() }
    }

    /// Declare a property. Ids are caller-assigned and must be unique
    /// within the entity.
    pub fn with_property(mut self, id: u32, name: impl Into<String>, kind: PropertyType) -> Self {
        self.properties.push(Property {
            id: PropertyId(id),
            entity: self.id,
            name: name.into(),
            kind,
        });
        self
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn property_by_name(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A caller type stored as one entity.
///
/// Decoding is owned by the schema/serialization side; the query layer
/// only hands over the raw record bytes the engine returned.
pub trait Entity: Sized {
    const ENTITY_ID: EntityId;

    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}
