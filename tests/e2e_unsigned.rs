//! Unsigned properties: operands above the signed range must survive the
//! trip through the widened primitives unchanged.

use objstore_query::query::property::{PropertyUint32, PropertyUint64};
use objstore_query::{
    Entity, EntityId, EntityModel, MemoryEngine, ObjectId, PropertyId, PropertyMap, PropertyType,
    Record, Result, Store, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const COUNTER: EntityId = EntityId(3);

#[derive(Debug, PartialEq)]
struct Counter {
    big: Option<u64>,
    mid: Option<u32>,
}

impl Entity for Counter {
    const ENTITY_ID: EntityId = COUNTER;

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record = Record::decode(bytes)?;
        Ok(Counter { big: record.get(PropertyId(1))?, mid: record.get(PropertyId(2))? })
    }
}

fn model() -> EntityModel {
    EntityModel::new(COUNTER, "Counter")
        .with_property(1, "big", PropertyType::UInt64)
        .with_property(2, "mid", PropertyType::UInt32)
}

fn store_with(values: &[(u64, u32)]) -> (Store<MemoryEngine>, Vec<ObjectId>) {
    let store = Store::open_memory().unwrap();
    store.engine().register(model());
    let ids = values
        .iter()
        .map(|(big, mid)| {
            let mut props = PropertyMap::new();
            props.insert(PropertyId(1), Value::from(*big));
            props.insert(PropertyId(2), Value::from(*mid));
            store.engine().put(COUNTER, props).unwrap()
        })
        .collect();
    (store, ids)
}

#[test]
fn test_high_bit_values_order_above_small_ones() {
    let (store, ids) = store_with(&[(5, 5), (1 << 63, 1 << 31), (u64::MAX, u32::MAX)]);
    let model = model();
    let big = PropertyUint64::new(&model.properties[0]);
    let mid = PropertyUint32::new(&model.properties[1]);

    let mut query = store.query::<Counter>(big.between(1 << 63, u64::MAX));
    assert_eq!(query.find_ids().unwrap(), vec![ids[1], ids[2]]);

    query.set_condition(big.greater_than(5));
    assert_eq!(query.find_ids().unwrap(), vec![ids[1], ids[2]]);

    query.set_condition(mid.less_than(1 << 31));
    assert_eq!(query.find_ids().unwrap(), vec![ids[0]]);

    query.set_condition(mid.not_in([u32::MAX]));
    assert_eq!(query.find_ids().unwrap(), vec![ids[0], ids[1]]);

    query.set_condition(big.equal(u64::MAX));
    assert_eq!(
        query.find().unwrap(),
        vec![Counter { big: Some(u64::MAX), mid: Some(u32::MAX) }]
    );
}

proptest! {
    #[test]
    fn test_uint64_operands_round_trip(value in any::<u64>(), other in any::<u64>()) {
        prop_assume!(value != other);
        let (store, ids) = store_with(&[(value, 0), (other, 0)]);
        let model = model();
        let big = PropertyUint64::new(&model.properties[0]);

        let mut query = store.query::<Counter>(big.equal(value));
        prop_assert_eq!(query.find_ids().unwrap(), vec![ids[0]]);

        query.set_condition(big.is_in([value]));
        prop_assert_eq!(query.find_ids().unwrap(), vec![ids[0]]);

        query.set_condition(big.between(value, value));
        prop_assert_eq!(query.find_ids().unwrap(), vec![ids[0]]);

        query.set_condition(big.not_equal(value));
        prop_assert_eq!(query.find_ids().unwrap(), vec![ids[1]]);

        let above = usize::from(other > value);
        query.set_condition(big.greater_than(value));
        prop_assert_eq!(query.count().unwrap(), above as u64);
    }

    #[test]
    fn test_uint32_membership_round_trips(value in any::<u32>()) {
        let (store, ids) = store_with(&[(0, value)]);
        let model = model();
        let mid = PropertyUint32::new(&model.properties[1]);

        let mut query = store.query::<Counter>(mid.is_in([value]));
        prop_assert_eq!(query.find_ids().unwrap(), vec![ids[0]]);

        query.set_condition(mid.not_in([value]));
        prop_assert_eq!(query.count().unwrap(), 0);

        query.set_condition(mid.equal(value));
        prop_assert_eq!(query.count().unwrap(), 1);
    }
}
