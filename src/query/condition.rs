//! Conditions: lazily materialized predicate trees.
//!
//! A leaf is a plain [`Comparison`] value: property id, operator and the
//! captured operands. Nothing touches the engine until
//! [`Condition::materialize`] is called on a live builder session, so
//! conditions are cheap to build, compare, log, and share between
//! queries and threads.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::builder::QueryBuilder;
use crate::model::{ConditionId, PropertyId};
use crate::storage::{EngineBuilder, StorageEngine};
use crate::Result;

// ============================================================================
// Comparison (leaf)
// ============================================================================

/// Operator and operands of a single comparison.
///
/// Each variant maps onto exactly one [`EngineBuilder`] primitive.
/// Integer operands are already widened to the primitive's width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompareOp {
    StringEqual { value: String, case_sensitive: bool },
    StringNotEqual { value: String, case_sensitive: bool },
    StringContains { value: String, case_sensitive: bool },
    StringStartsWith { value: String, case_sensitive: bool },
    StringEndsWith { value: String, case_sensitive: bool },
    StringGreater { value: String, case_sensitive: bool, or_equal: bool },
    StringLess { value: String, case_sensitive: bool, or_equal: bool },
    StringIn { values: Vec<String>, case_sensitive: bool },

    IntEqual(i64),
    IntNotEqual(i64),
    IntGreater(i64),
    IntLess(i64),
    IntBetween(i64, i64),
    Int64In(Vec<i64>),
    Int64NotIn(Vec<i64>),
    Int32In(Vec<i32>),
    Int32NotIn(Vec<i32>),

    DoubleGreater(f64),
    DoubleLess(f64),
    DoubleBetween(f64, f64),

    BytesEqual(Vec<u8>),
    BytesGreater { value: Vec<u8>, or_equal: bool },
    BytesLess { value: Vec<u8>, or_equal: bool },

    IsNull,
    NotNull,
}

/// A comparison against one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub property: PropertyId,
    pub op: CompareOp,
}

impl Comparison {
    /// Forward to the matching engine primitive.
    pub fn apply<B: EngineBuilder + ?Sized>(&self, builder: &mut B) -> Result<ConditionId> {
        let p = self.property;
        match &self.op {
            CompareOp::StringEqual { value, case_sensitive } => builder.string_equal(p, value, *case_sensitive),
            CompareOp::StringNotEqual { value, case_sensitive } => builder.string_not_equal(p, value, *case_sensitive),
            CompareOp::StringContains { value, case_sensitive } => builder.string_contains(p, value, *case_sensitive),
            CompareOp::StringStartsWith { value, case_sensitive } => builder.string_starts_with(p, value, *case_sensitive),
            CompareOp::StringEndsWith { value, case_sensitive } => builder.string_ends_with(p, value, *case_sensitive),
            CompareOp::StringGreater { value, case_sensitive, or_equal } => {
                builder.string_greater(p, value, *case_sensitive, *or_equal)
            }
            CompareOp::StringLess { value, case_sensitive, or_equal } => {
                builder.string_less(p, value, *case_sensitive, *or_equal)
            }
            CompareOp::StringIn { values, case_sensitive } => builder.string_in(p, values, *case_sensitive),

            CompareOp::IntEqual(v) => builder.int_equal(p, *v),
            CompareOp::IntNotEqual(v) => builder.int_not_equal(p, *v),
            CompareOp::IntGreater(v) => builder.int_greater(p, *v),
            CompareOp::IntLess(v) => builder.int_less(p, *v),
            CompareOp::IntBetween(a, b) => builder.int_between(p, *a, *b),
            CompareOp::Int64In(values) => builder.int64_in(p, values),
            CompareOp::Int64NotIn(values) => builder.int64_not_in(p, values),
            CompareOp::Int32In(values) => builder.int32_in(p, values),
            CompareOp::Int32NotIn(values) => builder.int32_not_in(p, values),

            CompareOp::DoubleGreater(v) => builder.double_greater(p, *v),
            CompareOp::DoubleLess(v) => builder.double_less(p, *v),
            CompareOp::DoubleBetween(a, b) => builder.double_between(p, *a, *b),

            CompareOp::BytesEqual(v) => builder.bytes_equal(p, v),
            CompareOp::BytesGreater { value, or_equal } => builder.bytes_greater(p, value, *or_equal),
            CompareOp::BytesLess { value, or_equal } => builder.bytes_less(p, value, *or_equal),

            CompareOp::IsNull => builder.is_null(p),
            CompareOp::NotNull => builder.not_null(p),
        }
    }
}

// ============================================================================
// Condition tree
// ============================================================================

/// A composable predicate over the properties of one entity.
///
/// `All`/`Any` with no children match every object / no object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Compare(Comparison),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl From<Comparison> for Condition {
    fn from(c: Comparison) -> Self {
        Condition::Compare(c)
    }
}

impl Condition {
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::All(conditions.into_iter().collect())
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Any(conditions.into_iter().collect())
    }

    /// Conjunction. Appends to `self` when it is already an `All`.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::All(mut children) => {
                children.push(other);
                Condition::All(children)
            }
            this => Condition::All(vec![this, other]),
        }
    }

    /// Disjunction. Appends to `self` when it is already an `Any`.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Any(mut children) => {
                children.push(other);
                Condition::Any(children)
            }
            this => Condition::Any(vec![this, other]),
        }
    }

    /// Number of comparisons in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Condition::Compare(_) => 1,
            Condition::All(children) | Condition::Any(children) => {
                children.iter().map(Condition::leaf_count).sum()
            }
        }
    }

    /// Register this tree on a builder session and return the id of its root.
    ///
    /// Children are materialized in declaration order; the first failing
    /// child aborts the walk and its error is returned unchanged.
    pub fn materialize<E: StorageEngine>(&self, qb: &mut QueryBuilder<'_, E>) -> Result<ConditionId> {
        match self {
            Condition::Compare(comparison) => qb.register(comparison),
            Condition::All(children) => {
                let ids = Self::materialize_children(children, qb)?;
                qb.all(&ids)
            }
            Condition::Any(children) => {
                let ids = Self::materialize_children(children, qb)?;
                qb.any(&ids)
            }
        }
    }

    fn materialize_children<E: StorageEngine>(
        children: &[Condition],
        qb: &mut QueryBuilder<'_, E>,
    ) -> Result<SmallVec<[ConditionId; 4]>> {
        children.iter().map(|child| child.materialize(qb)).collect()
    }
}

// ============================================================================
// Display
// ============================================================================

fn case_suffix(case_sensitive: bool) -> &'static str {
    if case_sensitive { "" } else { " (ci)" }
}

fn write_list<T: fmt::Debug>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{v:?}")?;
    }
    write!(f, "]")
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.property;
        match &self.op {
            CompareOp::StringEqual { value, case_sensitive } => {
                write!(f, "#{p} == {value:?}{}", case_suffix(*case_sensitive))
            }
            CompareOp::StringNotEqual { value, case_sensitive } => {
                write!(f, "#{p} != {value:?}{}", case_suffix(*case_sensitive))
            }
            CompareOp::StringContains { value, case_sensitive } => {
                write!(f, "#{p} contains {value:?}{}", case_suffix(*case_sensitive))
            }
            CompareOp::StringStartsWith { value, case_sensitive } => {
                write!(f, "#{p} starts with {value:?}{}", case_suffix(*case_sensitive))
            }
            CompareOp::StringEndsWith { value, case_sensitive } => {
                write!(f, "#{p} ends with {value:?}{}", case_suffix(*case_sensitive))
            }
            CompareOp::StringGreater { value, case_sensitive, or_equal } => {
                let op = if *or_equal { ">=" } else { ">" };
                write!(f, "#{p} {op} {value:?}{}", case_suffix(*case_sensitive))
            }
            CompareOp::StringLess { value, case_sensitive, or_equal } => {
                let op = if *or_equal { "<=" } else { "<" };
                write!(f, "#{p} {op} {value:?}{}", case_suffix(*case_sensitive))
            }
            CompareOp::StringIn { values, case_sensitive } => {
                write!(f, "#{p} in ")?;
                write_list(f, values)?;
                write!(f, "{}", case_suffix(*case_sensitive))
            }
            CompareOp::IntEqual(v) => write!(f, "#{p} == {v}"),
            CompareOp::IntNotEqual(v) => write!(f, "#{p} != {v}"),
            CompareOp::IntGreater(v) => write!(f, "#{p} > {v}"),
            CompareOp::IntLess(v) => write!(f, "#{p} < {v}"),
            CompareOp::IntBetween(a, b) => write!(f, "#{p} between {a} and {b}"),
            CompareOp::Int64In(values) => {
                write!(f, "#{p} in ")?;
                write_list(f, values)
            }
            CompareOp::Int64NotIn(values) => {
                write!(f, "#{p} not in ")?;
                write_list(f, values)
            }
            CompareOp::Int32In(values) => {
                write!(f, "#{p} in ")?;
                write_list(f, values)
            }
            CompareOp::Int32NotIn(values) => {
                write!(f, "#{p} not in ")?;
                write_list(f, values)
            }
            CompareOp::DoubleGreater(v) => write!(f, "#{p} > {v}"),
            CompareOp::DoubleLess(v) => write!(f, "#{p} < {v}"),
            CompareOp::DoubleBetween(a, b) => write!(f, "#{p} between {a} and {b}"),
            CompareOp::BytesEqual(v) => write!(f, "#{p} == <bytes[{}]>", v.len()),
            CompareOp::BytesGreater { value, or_equal } => {
                let op = if *or_equal { ">=" } else { ">" };
                write!(f, "#{p} {op} <bytes[{}]>", value.len())
            }
            CompareOp::BytesLess { value, or_equal } => {
                let op = if *or_equal { "<=" } else { "<" };
                write!(f, "#{p} {op} <bytes[{}]>", value.len())
            }
            CompareOp::IsNull => write!(f, "#{p} is null"),
            CompareOp::NotNull => write!(f, "#{p} is not null"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (children, joiner, empty) = match self {
            Condition::Compare(c) => return write!(f, "{c}"),
            Condition::All(children) => (children, " AND ", "TRUE"),
            Condition::Any(children) => (children, " OR ", "FALSE"),
        };
        if children.is_empty() {
            return write!(f, "{empty}");
        }
        write!(f, "(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 { write!(f, "{joiner}")?; }
            write!(f, "{child}")?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// Tests
// ============================================================================
