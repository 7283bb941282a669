//! Resolved predicates evaluated by the memory engine.
//!
//! Registration resolves each comparison against the entity schema:
//! integer operands are mapped back onto the property's declared domain
//! (so an unsigned operand that arrived reinterpreted as a negative `i64`
//! becomes its original value again) and all integers are compared as
//! `i128`, which holds both the signed and the unsigned 64-bit range.

use std::cmp::Ordering;
use std::fmt;

use crate::model::{PropertyId, PropertyType, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cmp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Cmp {
    pub(crate) fn greater(or_equal: bool) -> Self {
        if or_equal { Cmp::Ge } else { Cmp::Gt }
    }

    pub(crate) fn less(or_equal: bool) -> Self {
        if or_equal { Cmp::Le } else { Cmp::Lt }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            Cmp::Eq => ord == Ordering::Equal,
            Cmp::Ne => ord != Ordering::Equal,
            Cmp::Gt => ord == Ordering::Greater,
            Cmp::Ge => ord != Ordering::Less,
            Cmp::Lt => ord == Ordering::Less,
            Cmp::Le => ord != Ordering::Greater,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Cmp::Eq => "==",
            Cmp::Ne => "!=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextOp {
    Cmp(Cmp),
    Contains,
    StartsWith,
    EndsWith,
}

/// The test applied to one property value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Test {
    Text { op: TextOp, value: String, case_sensitive: bool },
    TextIn { values: Vec<String>, case_sensitive: bool },
    Int { op: Cmp, value: i128 },
    IntBetween { low: i128, high: i128 },
    IntIn { values: Vec<i128>, negate: bool },
    Float { op: Cmp, value: f64 },
    FloatBetween { low: f64, high: f64 },
    Bytes { op: Cmp, value: Vec<u8> },
    Null { negate: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Compare { property: PropertyId, name: String, test: Test },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

/// Map an `i64` operand onto the domain of a property of type `kind`.
pub(crate) fn int_operand(kind: PropertyType, value: i64) -> i128 {
    if kind.is_unsigned() { i128::from(value as u64) } else { i128::from(value) }
}

/// Map an `i32` membership operand onto the domain of a property of type `kind`.
pub(crate) fn int32_operand(kind: PropertyType, value: i32) -> i128 {
    if kind.is_unsigned() { i128::from(value as u32) } else { i128::from(value) }
}

fn stored_int(value: &Value) -> Option<i128> {
    match value {
        Value::Int(i) => Some(i128::from(*i)),
        Value::UInt(u) => Some(i128::from(*u)),
        Value::Bool(b) => Some(i128::from(*b)),
        _ => None,
    }
}

fn fold(text: &str, case_sensitive: bool) -> String {
    if case_sensitive { text.to_owned() } else { text.to_lowercase() }
}

impl Test {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Test::Null { negate } => value.is_null() != *negate,
            Test::Text { op, value: operand, case_sensitive } => {
                let Some(stored) = value.as_str() else { return false };
                let stored = fold(stored, *case_sensitive);
                let operand = fold(operand, *case_sensitive);
                match op {
                    TextOp::Cmp(cmp) => cmp.holds(stored.as_str().cmp(operand.as_str())),
                    TextOp::Contains => stored.contains(&operand),
                    TextOp::StartsWith => stored.starts_with(&operand),
                    TextOp::EndsWith => stored.ends_with(&operand),
                }
            }
            Test::TextIn { values, case_sensitive } => {
                let Some(stored) = value.as_str() else { return false };
                let stored = fold(stored, *case_sensitive);
                values.iter().any(|v| fold(v, *case_sensitive) == stored)
            }
            Test::Int { op, value: operand } => {
                stored_int(value).is_some_and(|stored| op.holds(stored.cmp(operand)))
            }
            Test::IntBetween { low, high } => {
                stored_int(value).is_some_and(|stored| *low <= stored && stored <= *high)
            }
            Test::IntIn { values, negate } => {
                stored_int(value).is_some_and(|stored| values.contains(&stored) != *negate)
            }
            Test::Float { op, value: operand } => value
                .as_float()
                .and_then(|stored| stored.partial_cmp(operand))
                .is_some_and(|ord| op.holds(ord)),
            Test::FloatBetween { low, high } => {
                value.as_float().is_some_and(|stored| *low <= stored && stored <= *high)
            }
            Test::Bytes { op, value: operand } => value
                .as_bytes()
                .is_some_and(|stored| op.holds(stored.cmp(operand.as_slice()))),
        }
    }
}

impl Predicate {
    pub(crate) fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Compare { property, test, .. } => test.matches(record.value(*property)),
            Predicate::All(children) => children.iter().all(|c| c.matches(record)),
            Predicate::Any(children) => children.iter().any(|c| c.matches(record)),
        }
    }
}

// ============================================================================
// Display (used by `describe`)
// ============================================================================

fn ci(case_sensitive: bool) -> &'static str {
    if case_sensitive { "" } else { " [case-insensitive]" }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Text { op, value, case_sensitive } => {
                let op = match op {
                    TextOp::Cmp(cmp) => cmp.symbol(),
                    TextOp::Contains => "contains",
                    TextOp::StartsWith => "starts with",
                    TextOp::EndsWith => "ends with",
                };
                write!(f, "{op} {value:?}{}", ci(*case_sensitive))
            }
            Test::TextIn { values, case_sensitive } => {
                write!(f, "in {values:?}{}", ci(*case_sensitive))
            }
            Test::Int { op, value } => write!(f, "{} {value}", op.symbol()),
            Test::IntBetween { low, high } => write!(f, "between {low} and {high}"),
            Test::IntIn { values, negate } => {
                write!(f, "{}in {values:?}", if *negate { "not " } else { "" })
            }
            Test::Float { op, value } => write!(f, "{} {value}", op.symbol()),
            Test::FloatBetween { low, high } => write!(f, "between {low} and {high}"),
            Test::Bytes { op, value } => write!(f, "{} <bytes[{}]>", op.symbol(), value.len()),
            Test::Null { negate } => write!(f, "is {}null", if *negate { "not " } else { "" }),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (children, joiner, empty) = match self {
            Predicate::Compare { name, test, .. } => return write!(f, "{name} {test}"),
            Predicate::All(children) => (children, " AND ", "TRUE"),
            Predicate::Any(children) => (children, " OR ", "FALSE"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectId, PropertyMap};

    fn record(value: Value) -> Record {
        let mut props = PropertyMap::new();
        props.insert(PropertyId(1), value);
        Record::new(ObjectId(1), props)
    }

    fn compare(test: Test) -> Predicate {
        Predicate::Compare { property: PropertyId(1), name: "p".into(), test }
    }

    #[test]
    fn test_unsigned_operand_restored() {
        let op = int_operand(PropertyType::UInt64, (1u64 << 63) as i64);
        let p = compare(Test::Int { op: Cmp::Eq, value: op });
        assert!(p.matches(&record(Value::UInt(1 << 63))));
        assert!(!p.matches(&record(Value::Int(i64::MIN))));
    }

    #[test]
    fn test_case_folding() {
        let p = compare(Test::Text {
            op: TextOp::Cmp(Cmp::Eq),
            value: "ANN".into(),
            case_sensitive: false,
        });
        assert!(p.matches(&record(Value::from("ann"))));
        let strict = compare(Test::Text {
            op: TextOp::Cmp(Cmp::Eq),
            value: "ANN".into(),
            case_sensitive: true,
        });
        assert!(!strict.matches(&record(Value::from("ann"))));
    }

    #[test]
    fn test_null_only_matches_null_checks() {
        let missing = Record::new(ObjectId(1), PropertyMap::new());
        assert!(compare(Test::Null { negate: false }).matches(&missing));
        assert!(!compare(Test::Null { negate: true }).matches(&missing));
        assert!(!compare(Test::IntIn { values: vec![], negate: true }).matches(&missing));
        assert!(!compare(Test::Int { op: Cmp::Ne, value: 3 }).matches(&missing));
    }

    #[test]
    fn test_inverted_between_is_empty() {
        let p = compare(Test::IntBetween { low: 30, high: 20 });
        for v in [10, 20, 25, 30, 40] {
            assert!(!p.matches(&record(Value::Int(v))));
        }
    }

    #[test]
    fn test_bytes_ordering() {
        let r = record(Value::from(vec![1u8, 2, 3]));
        assert!(compare(Test::Bytes { op: Cmp::Eq, value: vec![1, 2, 3] }).matches(&r));
        assert!(compare(Test::Bytes { op: Cmp::Gt, value: vec![1, 2] }).matches(&r));
        assert!(compare(Test::Bytes { op: Cmp::Le, value: vec![1, 2, 3] }).matches(&r));
        assert!(!compare(Test::Bytes { op: Cmp::Lt, value: vec![1, 2, 3] }).matches(&r));
    }

    #[test]
    fn test_empty_combinators() {
        let r = record(Value::Int(1));
        assert!(Predicate::All(vec![]).matches(&r));
        assert!(!Predicate::Any(vec![]).matches(&r));
    }
}
