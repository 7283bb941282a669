//! Raw record codec: the byte form an object takes inside the engine.
//!
//! A record is the object id plus its property values keyed by
//! `PropertyId`, encoded as JSON. Caller types implement
//! [`Entity::from_bytes`](super::Entity::from_bytes) on top of
//! [`Record::decode`] and [`Record::get`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ObjectId, PropertyId, Value};
use crate::{Error, Result};

static NULL: Value = Value::Null;

/// Property values of one object.
pub type PropertyMap = BTreeMap<PropertyId, Value>;

/// Decoded form of a raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: ObjectId,
    pub properties: PropertyMap,
}

impl Record {
    pub fn new(id: ObjectId, properties: PropertyMap) -> Self {
        Self { id, properties }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::DecodeError(format!("malformed record: {e}")))
    }

    /// Raw value of a property; absent properties read as `Null`.
    pub fn value(&self, property: PropertyId) -> &Value {
        self.properties.get(&property).unwrap_or(&NULL)
    }

    /// Get a typed value from the record.
    pub fn get<T: FromValue>(&self, property: PropertyId) -> Result<T> {
        T::from_value(self.value(property)).map_err(|e| match e {
            Error::TypeMismatch { expected, got, .. } => Error::TypeMismatch {
                property,
                expected,
                got,
            },
            other => other,
        })
    }
}

/// Convert from Value to concrete types.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, val: &Value) -> Error {
    Error::TypeMismatch {
        property: PropertyId(0),
        expected: expected.into(),
        got: val.type_name().into(),
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_str().map(str::to_owned).ok_or_else(|| mismatch("STRING", val))
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| mismatch("INTEGER", val))
    }
}

impl FromValue for i32 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| mismatch("INTEGER", val))
    }
}

impl FromValue for u64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_uint().ok_or_else(|| mismatch("UNSIGNED", val))
    }
}

impl FromValue for u32 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_uint()
            .and_then(|u| u32::try_from(u).ok())
            .ok_or_else(|| mismatch("UNSIGNED", val))
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_float().ok_or_else(|| mismatch("FLOAT", val))
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_bool().ok_or_else(|| mismatch("BOOLEAN", val))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_bytes().map(<[u8]>::to_vec).ok_or_else(|| mismatch("BYTES", val))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(val: &Value) -> Result<Self> {
        if val.is_null() { Ok(None) } else { T::from_value(val).map(Some) }
    }
}
