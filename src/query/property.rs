//! Typed property views.
//!
//! A [`PropertyView`] borrows one schema [`Property`] and is tagged with a
//! kind marker from [`kind`]. The marker decides which comparison methods
//! exist; every method only captures its operands into a [`Condition`].
//!
//! Integer operands are widened to the 64-bit compare primitives. Unsigned
//! values are reinterpreted bit-for-bit (`u64::MAX` becomes `-1`), never
//! clamped; the engine maps them back using the property's declared type.
//! Set membership keeps the 32-bit primitive for types up to 32 bits wide.

use std::marker::PhantomData;

use super::condition::{CompareOp, Comparison, Condition};
use crate::model::{Property, PropertyId};

/// Kind markers for [`PropertyView`].
pub mod kind {
    pub enum Text {}
    pub enum Bool {}
    pub enum Int8 {}
    pub enum Int16 {}
    pub enum Int32 {}
    pub enum Int64 {}
    pub enum Int {}
    pub enum UInt8 {}
    pub enum UInt16 {}
    pub enum UInt32 {}
    pub enum UInt64 {}
    pub enum UInt {}
    pub enum Rune {}
    pub enum Byte {}
    pub enum Float32 {}
    pub enum Float64 {}
    pub enum ByteVector {}
}

/// Read-only, typed view over a schema property.
pub struct PropertyView<'a, K> {
    property: &'a Property,
    kind: PhantomData<fn() -> K>,
}

impl<K> Clone for PropertyView<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for PropertyView<'_, K> {}

impl<K> std::fmt::Debug for PropertyView<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyView").field("property", self.property).finish()
    }
}

pub type PropertyString<'a> = PropertyView<'a, kind::Text>;
pub type PropertyBool<'a> = PropertyView<'a, kind::Bool>;
pub type PropertyInt8<'a> = PropertyView<'a, kind::Int8>;
pub type PropertyInt16<'a> = PropertyView<'a, kind::Int16>;
pub type PropertyInt32<'a> = PropertyView<'a, kind::Int32>;
pub type PropertyInt64<'a> = PropertyView<'a, kind::Int64>;
pub type PropertyInt<'a> = PropertyView<'a, kind::Int>;
pub type PropertyUint8<'a> = PropertyView<'a, kind::UInt8>;
pub type PropertyUint16<'a> = PropertyView<'a, kind::UInt16>;
pub type PropertyUint32<'a> = PropertyView<'a, kind::UInt32>;
pub type PropertyUint64<'a> = PropertyView<'a, kind::UInt64>;
pub type PropertyUint<'a> = PropertyView<'a, kind::UInt>;
pub type PropertyRune<'a> = PropertyView<'a, kind::Rune>;
pub type PropertyByte<'a> = PropertyView<'a, kind::Byte>;
pub type PropertyFloat32<'a> = PropertyView<'a, kind::Float32>;
pub type PropertyFloat64<'a> = PropertyView<'a, kind::Float64>;
pub type PropertyByteVector<'a> = PropertyView<'a, kind::ByteVector>;

impl<'a, K> PropertyView<'a, K> {
    pub fn new(property: &'a Property) -> Self {
        Self { property, kind: PhantomData }
    }

    pub fn property(&self) -> &'a Property {
        self.property
    }

    pub fn id(&self) -> PropertyId {
        self.property.id
    }

    pub fn is_null(&self) -> Condition {
        self.compare(CompareOp::IsNull)
    }

    pub fn not_null(&self) -> Condition {
        self.compare(CompareOp::NotNull)
    }

    fn compare(&self, op: CompareOp) -> Condition {
        Condition::Compare(Comparison { property: self.property.id, op })
    }
}

// ============================================================================
// Text
// ============================================================================

impl PropertyView<'_, kind::Text> {
    pub fn equal(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.compare(CompareOp::StringEqual { value: text.into(), case_sensitive })
    }

    pub fn not_equal(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.compare(CompareOp::StringNotEqual { value: text.into(), case_sensitive })
    }

    pub fn contains(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.compare(CompareOp::StringContains { value: text.into(), case_sensitive })
    }

    pub fn starts_with(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.compare(CompareOp::StringStartsWith { value: text.into(), case_sensitive })
    }

    pub fn ends_with(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.compare(CompareOp::StringEndsWith { value: text.into(), case_sensitive })
    }

    pub fn greater_than(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.greater(text.into(), case_sensitive, false)
    }

    pub fn greater_or_equal(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.greater(text.into(), case_sensitive, true)
    }

    pub fn less_than(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.less(text.into(), case_sensitive, false)
    }

    pub fn less_or_equal(&self, text: impl Into<String>, case_sensitive: bool) -> Condition {
        self.less(text.into(), case_sensitive, true)
    }

    pub fn is_in<S: Into<String>>(&self, texts: impl IntoIterator<Item = S>, case_sensitive: bool) -> Condition {
        let values = texts.into_iter().map(Into::into).collect();
        self.compare(CompareOp::StringIn { values, case_sensitive })
    }

    fn greater(&self, value: String, case_sensitive: bool, or_equal: bool) -> Condition {
        self.compare(CompareOp::StringGreater { value, case_sensitive, or_equal })
    }

    fn less(&self, value: String, case_sensitive: bool, or_equal: bool) -> Condition {
        self.compare(CompareOp::StringLess { value, case_sensitive, or_equal })
    }
}

// ============================================================================
// Integers
// ============================================================================

// `$member`/`$not_member` pick the set-membership primitive and `$elem`
// its element type; `as` is a sign-extension for signed sources and a
// bit reinterpretation for unsigned ones.
macro_rules! integer_view {
    ($kind:ident, $ty:ty, $member:ident, $not_member:ident, $elem:ty) => {
        impl PropertyView<'_, kind::$kind> {
            pub fn equal(&self, value: $ty) -> Condition {
                self.compare(CompareOp::IntEqual(value as i64))
            }

            pub fn not_equal(&self, value: $ty) -> Condition {
                self.compare(CompareOp::IntNotEqual(value as i64))
            }

            pub fn greater_than(&self, value: $ty) -> Condition {
                self.compare(CompareOp::IntGreater(value as i64))
            }

            pub fn less_than(&self, value: $ty) -> Condition {
                self.compare(CompareOp::IntLess(value as i64))
            }

            /// Inclusive range. `a > b` is not rejected here.
            pub fn between(&self, a: $ty, b: $ty) -> Condition {
                self.compare(CompareOp::IntBetween(a as i64, b as i64))
            }

            pub fn is_in(&self, values: impl IntoIterator<Item = $ty>) -> Condition {
                self.compare(CompareOp::$member(values.into_iter().map(|v| v as $elem).collect()))
            }

            pub fn not_in(&self, values: impl IntoIterator<Item = $ty>) -> Condition {
                self.compare(CompareOp::$not_member(values.into_iter().map(|v| v as $elem).collect()))
            }
        }
    };
}

integer_view!(Int64, i64, Int64In, Int64NotIn, i64);
integer_view!(Int, isize, Int64In, Int64NotIn, i64);
integer_view!(UInt64, u64, Int64In, Int64NotIn, i64);
integer_view!(UInt, usize, Int64In, Int64NotIn, i64);
integer_view!(Int32, i32, Int32In, Int32NotIn, i32);
integer_view!(UInt32, u32, Int32In, Int32NotIn, i32);
integer_view!(Int16, i16, Int32In, Int32NotIn, i32);
integer_view!(UInt16, u16, Int32In, Int32NotIn, i32);
integer_view!(Int8, i8, Int32In, Int32NotIn, i32);
integer_view!(UInt8, u8, Int32In, Int32NotIn, i32);
integer_view!(Byte, u8, Int32In, Int32NotIn, i32);
integer_view!(Rune, char, Int32In, Int32NotIn, i32);

// ============================================================================
// Bool, floats, byte vectors
// ============================================================================

impl PropertyView<'_, kind::Bool> {
    pub fn equal(&self, value: bool) -> Condition {
        self.compare(CompareOp::IntEqual(i64::from(value)))
    }

    pub fn not_equal(&self, value: bool) -> Condition {
        self.compare(CompareOp::IntNotEqual(i64::from(value)))
    }
}

macro_rules! float_view {
    ($kind:ident, $ty:ty) => {
        impl PropertyView<'_, kind::$kind> {
            pub fn greater_than(&self, value: $ty) -> Condition {
                self.compare(CompareOp::DoubleGreater(f64::from(value)))
            }

            pub fn less_than(&self, value: $ty) -> Condition {
                self.compare(CompareOp::DoubleLess(f64::from(value)))
            }

            pub fn between(&self, a: $ty, b: $ty) -> Condition {
                self.compare(CompareOp::DoubleBetween(f64::from(a), f64::from(b)))
            }
        }
    };
}

float_view!(Float32, f32);
float_view!(Float64, f64);

impl PropertyView<'_, kind::ByteVector> {
    pub fn equal(&self, value: impl Into<Vec<u8>>) -> Condition {
        self.compare(CompareOp::BytesEqual(value.into()))
    }

    pub fn greater_than(&self, value: impl Into<Vec<u8>>) -> Condition {
        self.compare(CompareOp::BytesGreater { value: value.into(), or_equal: false })
    }

    pub fn greater_or_equal(&self, value: impl Into<Vec<u8>>) -> Condition {
        self.compare(CompareOp::BytesGreater { value: value.into(), or_equal: true })
    }

    pub fn less_than(&self, value: impl Into<Vec<u8>>) -> Condition {
        self.compare(CompareOp::BytesLess { value: value.into(), or_equal: false })
    }

    pub fn less_or_equal(&self, value: impl Into<Vec<u8>>) -> Condition {
        self.compare(CompareOp::BytesLess { value: value.into(), or_equal: true })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, PropertyType};
    use pretty_assertions::assert_eq;

    fn prop(id: u32, kind: PropertyType) -> Property {
        Property { id: PropertyId(id), entity: EntityId(1), name: format!("p{id}"), kind }
    }

    fn op(c: Condition) -> CompareOp {
        match c {
            Condition::Compare(Comparison { op, .. }) => op,
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn test_text_threads_case_flag() {
        let p = prop(1, PropertyType::Text);
        let name = PropertyString::new(&p);

        assert_eq!(
            op(name.equal("Ann", false)),
            CompareOp::StringEqual { value: "Ann".into(), case_sensitive: false }
        );
        assert_eq!(
            op(name.greater_or_equal("b", true)),
            CompareOp::StringGreater { value: "b".into(), case_sensitive: true, or_equal: true }
        );
        assert_eq!(
            op(name.less_than("b", false)),
            CompareOp::StringLess { value: "b".into(), case_sensitive: false, or_equal: false }
        );
        assert_eq!(
            op(name.is_in(["x", "y"], true)),
            CompareOp::StringIn { values: vec!["x".into(), "y".into()], case_sensitive: true }
        );
    }

    #[test]
    fn test_unsigned_reinterpreted_not_clamped() {
        let p = prop(2, PropertyType::UInt64);
        let view = PropertyUint64::new(&p);

        assert_eq!(op(view.equal(1u64 << 63)), CompareOp::IntEqual(i64::MIN));
        assert_eq!(op(view.equal(u64::MAX)), CompareOp::IntEqual(-1));
        assert_eq!(op(view.is_in([u64::MAX])), CompareOp::Int64In(vec![-1]));
    }

    #[test]
    fn test_membership_keeps_width() {
        let p32 = prop(3, PropertyType::Int32);
        let pu32 = prop(4, PropertyType::UInt32);
        let p16 = prop(5, PropertyType::Int16);

        assert_eq!(op(PropertyInt32::new(&p32).is_in([-1, 2])), CompareOp::Int32In(vec![-1, 2]));
        assert_eq!(op(PropertyUint32::new(&pu32).not_in([u32::MAX])), CompareOp::Int32NotIn(vec![-1]));
        assert_eq!(op(PropertyInt16::new(&p16).is_in([7])), CompareOp::Int32In(vec![7]));
        // compare primitives are still the 64-bit ones
        assert_eq!(op(PropertyUint32::new(&pu32).equal(u32::MAX)), CompareOp::IntEqual(4_294_967_295));
    }

    #[test]
    fn test_empty_membership_is_valid() {
        let p = prop(3, PropertyType::Int32);
        assert_eq!(op(PropertyInt32::new(&p).is_in([])), CompareOp::Int32In(vec![]));
        assert_eq!(op(PropertyInt32::new(&p).not_in([])), CompareOp::Int32NotIn(vec![]));
    }

    #[test]
    fn test_between_is_not_validated() {
        let p = prop(3, PropertyType::Int32);
        assert_eq!(op(PropertyInt32::new(&p).between(30, 20)), CompareOp::IntBetween(30, 20));
    }

    #[test]
    fn test_views_share_the_property() {
        let p = prop(6, PropertyType::Bool);
        let a = PropertyBool::new(&p);
        let b = a;
        assert!(std::ptr::eq(a.property(), b.property()));
        assert_eq!(op(b.equal(true)), CompareOp::IntEqual(1));
        assert_eq!(op(a.is_null()), CompareOp::IsNull);
    }

    #[test]
    fn test_rune_and_float() {
        let r = prop(7, PropertyType::Rune);
        let f = prop(8, PropertyType::Float32);
        assert_eq!(op(PropertyRune::new(&r).is_in(['A'])), CompareOp::Int32In(vec![65]));
        assert_eq!(op(PropertyFloat32::new(&f).between(0.5, 1.5)), CompareOp::DoubleBetween(0.5, 1.5));
    }
}
