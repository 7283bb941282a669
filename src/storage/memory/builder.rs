//! Builder sessions and compiled queries of the memory engine.

use smallvec::SmallVec;

use super::predicate::{Cmp, Predicate, Test, TextOp, int32_operand, int_operand};
use crate::model::*;
use crate::storage::EngineBuilder;
use crate::{Error, Result};

struct Slot {
    predicate: Predicate,
    /// Taken by a combinator; no longer a compile-time root.
    consumed: bool,
}

/// One builder session over a snapshot of an entity schema.
pub struct MemoryBuilder {
    id: u64,
    model: EntityModel,
    slots: Vec<Slot>,
}

/// A compiled memory query.
#[derive(Debug)]
pub struct MemoryQuery {
    pub(crate) id: u64,
    pub(crate) entity: EntityId,
    pub(crate) entity_name: String,
    pub(crate) predicate: Predicate,
}

/// Which family of primitives is being registered, for type checks.
#[derive(Debug, Clone, Copy)]
enum Family {
    Text,
    IntEquality,
    IntOrder,
    Int64Set,
    Int32Set,
    Float,
    Bytes,
}

impl Family {
    fn accepts(self, kind: PropertyType) -> bool {
        match self {
            Family::Text => kind == PropertyType::Text,
            Family::IntEquality => kind.is_integer() || kind == PropertyType::Bool,
            Family::IntOrder => kind.is_integer(),
            Family::Int64Set => kind.int_width() == Some(64),
            Family::Int32Set => kind.int_width().is_some_and(|w| w <= 32),
            Family::Float => kind.is_float(),
            Family::Bytes => kind == PropertyType::ByteVector,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Family::Text => "Text",
            Family::IntEquality => "integer or Bool",
            Family::IntOrder => "integer",
            Family::Int64Set => "64-bit integer",
            Family::Int32Set => "integer of at most 32 bits",
            Family::Float => "Float32 or Float64",
            Family::Bytes => "ByteVector",
        }
    }
}

fn reject_nan(property: PropertyId, operands: &[f64]) -> Result<()> {
    if operands.iter().any(|v| v.is_nan()) {
        return Err(Error::Unsupported(format!("NaN operand for property {property}")));
    }
    Ok(())
}

impl MemoryQuery {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

impl MemoryBuilder {
    pub(crate) fn new(id: u64, model: EntityModel) -> Self {
        Self { id, model, slots: Vec::new() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entity(&self) -> EntityId {
        self.model.id
    }

    fn property(&self, id: PropertyId, family: Option<Family>) -> Result<&Property> {
        let property = self.model.property(id).ok_or(Error::UnknownProperty {
            entity: self.model.id,
            property: id,
        })?;
        match family {
            Some(family) if !family.accepts(property.kind) => Err(Error::TypeMismatch {
                property: id,
                expected: family.expected().into(),
                got: property.kind.name().into(),
            }),
            _ => Ok(property),
        }
    }

    fn push(&mut self, predicate: Predicate) -> ConditionId {
        let index = self.slots.len() as u32;
        self.slots.push(Slot { predicate, consumed: false });
        ConditionId { builder: self.id, index }
    }

    fn push_test(&mut self, id: PropertyId, family: Option<Family>, test: impl FnOnce(PropertyType) -> Test) -> Result<ConditionId> {
        let property = self.property(id, family)?;
        let predicate = Predicate::Compare {
            property: id,
            name: property.name.clone(),
            test: test(property.kind),
        };
        Ok(self.push(predicate))
    }

    fn text(&mut self, id: PropertyId, op: TextOp, value: &str, case_sensitive: bool) -> Result<ConditionId> {
        self.push_test(id, Some(Family::Text), |_| Test::Text {
            op,
            value: value.to_owned(),
            case_sensitive,
        })
    }

    fn int(&mut self, id: PropertyId, family: Family, op: Cmp, value: i64) -> Result<ConditionId> {
        self.push_test(id, Some(family), |kind| Test::Int { op, value: int_operand(kind, value) })
    }

    fn take(&mut self, conditions: &[ConditionId]) -> Result<Vec<Predicate>> {
        let mut indexes: SmallVec<[usize; 8]> = SmallVec::with_capacity(conditions.len());
        for c in conditions {
            if c.builder != self.id {
                return Err(Error::BuildError(format!(
                    "condition {c} belongs to another builder (this is {})",
                    self.id
                )));
            }
            let index = c.index as usize;
            match self.slots.get(index) {
                None => return Err(Error::BuildError(format!("unknown condition {c}"))),
                Some(slot) if slot.consumed || indexes.contains(&index) => {
                    return Err(Error::BuildError(format!("condition {c} already combined")));
                }
                Some(_) => indexes.push(index),
            }
        }
        Ok(indexes
            .into_iter()
            .map(|i| {
                let slot = &mut self.slots[i];
                slot.consumed = true;
                slot.predicate.clone()
            })
            .collect())
    }

    /// Root predicate: the unconsumed slots, conjoined when more than one.
    pub(crate) fn root(&self) -> Predicate {
        let mut roots: Vec<Predicate> = self
            .slots
            .iter()
            .filter(|s| !s.consumed)
            .map(|s| s.predicate.clone())
            .collect();
        if roots.len() == 1 {
            roots.remove(0)
        } else {
            Predicate::All(roots)
        }
    }

    pub(crate) fn model(&self) -> &EntityModel {
        &self.model
    }
}

impl EngineBuilder for MemoryBuilder {
    fn string_equal(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId> {
        self.text(property, TextOp::Cmp(Cmp::Eq), value, case_sensitive)
    }

    fn string_not_equal(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId> {
        self.text(property, TextOp::Cmp(Cmp::Ne), value, case_sensitive)
    }

    fn string_contains(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId> {
        self.text(property, TextOp::Contains, value, case_sensitive)
    }

    fn string_starts_with(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId> {
        self.text(property, TextOp::StartsWith, value, case_sensitive)
    }

    fn string_ends_with(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId> {
        self.text(property, TextOp::EndsWith, value, case_sensitive)
    }

    fn string_greater(&mut self, property: PropertyId, value: &str, case_sensitive: bool, or_equal: bool) -> Result<ConditionId> {
        self.text(property, TextOp::Cmp(Cmp::greater(or_equal)), value, case_sensitive)
    }

    fn string_less(&mut self, property: PropertyId, value: &str, case_sensitive: bool, or_equal: bool) -> Result<ConditionId> {
        self.text(property, TextOp::Cmp(Cmp::less(or_equal)), value, case_sensitive)
    }

    fn string_in(&mut self, property: PropertyId, values: &[String], case_sensitive: bool) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Text), |_| Test::TextIn {
            values: values.to_vec(),
            case_sensitive,
        })
    }

    fn int_equal(&mut self, property: PropertyId, value: i64) -> Result<ConditionId> {
        self.int(property, Family::IntEquality, Cmp::Eq, value)
    }

    fn int_not_equal(&mut self, property: PropertyId, value: i64) -> Result<ConditionId> {
        self.int(property, Family::IntEquality, Cmp::Ne, value)
    }

    fn int_greater(&mut self, property: PropertyId, value: i64) -> Result<ConditionId> {
        self.int(property, Family::IntOrder, Cmp::Gt, value)
    }

    fn int_less(&mut self, property: PropertyId, value: i64) -> Result<ConditionId> {
        self.int(property, Family::IntOrder, Cmp::Lt, value)
    }

    fn int_between(&mut self, property: PropertyId, a: i64, b: i64) -> Result<ConditionId> {
        self.push_test(property, Some(Family::IntOrder), |kind| Test::IntBetween {
            low: int_operand(kind, a),
            high: int_operand(kind, b),
        })
    }

    fn int64_in(&mut self, property: PropertyId, values: &[i64]) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Int64Set), |kind| Test::IntIn {
            values: values.iter().map(|v| int_operand(kind, *v)).collect(),
            negate: false,
        })
    }

    fn int64_not_in(&mut self, property: PropertyId, values: &[i64]) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Int64Set), |kind| Test::IntIn {
            values: values.iter().map(|v| int_operand(kind, *v)).collect(),
            negate: true,
        })
    }

    fn int32_in(&mut self, property: PropertyId, values: &[i32]) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Int32Set), |kind| Test::IntIn {
            values: values.iter().map(|v| int32_operand(kind, *v)).collect(),
            negate: false,
        })
    }

    fn int32_not_in(&mut self, property: PropertyId, values: &[i32]) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Int32Set), |kind| Test::IntIn {
            values: values.iter().map(|v| int32_operand(kind, *v)).collect(),
            negate: true,
        })
    }

    fn double_greater(&mut self, property: PropertyId, value: f64) -> Result<ConditionId> {
        reject_nan(property, &[value])?;
        self.push_test(property, Some(Family::Float), |_| Test::Float { op: Cmp::Gt, value })
    }

    fn double_less(&mut self, property: PropertyId, value: f64) -> Result<ConditionId> {
        reject_nan(property, &[value])?;
        self.push_test(property, Some(Family::Float), |_| Test::Float { op: Cmp::Lt, value })
    }

    fn double_between(&mut self, property: PropertyId, a: f64, b: f64) -> Result<ConditionId> {
        reject_nan(property, &[a, b])?;
        self.push_test(property, Some(Family::Float), |_| Test::FloatBetween { low: a, high: b })
    }

    fn bytes_equal(&mut self, property: PropertyId, value: &[u8]) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Bytes), |_| Test::Bytes { op: Cmp::Eq, value: value.to_vec() })
    }

    fn bytes_greater(&mut self, property: PropertyId, value: &[u8], or_equal: bool) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Bytes), |_| Test::Bytes {
            op: Cmp::greater(or_equal),
            value: value.to_vec(),
        })
    }

    fn bytes_less(&mut self, property: PropertyId, value: &[u8], or_equal: bool) -> Result<ConditionId> {
        self.push_test(property, Some(Family::Bytes), |_| Test::Bytes {
            op: Cmp::less(or_equal),
            value: value.to_vec(),
        })
    }

    fn is_null(&mut self, property: PropertyId) -> Result<ConditionId> {
        self.push_test(property, None, |_| Test::Null { negate: false })
    }

    fn not_null(&mut self, property: PropertyId) -> Result<ConditionId> {
        self.push_test(property, None, |_| Test::Null { negate: true })
    }

    fn all(&mut self, conditions: &[ConditionId]) -> Result<ConditionId> {
        let children = self.take(conditions)?;
        Ok(self.push(Predicate::All(children)))
    }

    fn any(&mut self, conditions: &[ConditionId]) -> Result<ConditionId> {
        let children = self.take(conditions)?;
        Ok(self.push(Predicate::Any(children)))
    }
}
