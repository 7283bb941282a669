//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use objstore_query::storage::memory::{MemoryBuilder, MemoryCursor, MemoryQuery, MemoryTx};
use objstore_query::{
    Entity, EntityId, EntityModel, Error, MemoryEngine, ObjectId, PropertyId, PropertyMap,
    PropertyType, Record, Result, StorageEngine, Store, TxMode, Value,
};

// ============================================================================
// Person fixture
// ============================================================================

pub const PERSON: EntityId = EntityId(1);
pub const NAME: PropertyId = PropertyId(1);
pub const AGE: PropertyId = PropertyId(2);
pub const SCORE: PropertyId = PropertyId(3);

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: ObjectId,
    pub name: String,
    pub age: Option<i32>,
    pub score: Option<u64>,
}

impl Entity for Person {
    const ENTITY_ID: EntityId = PERSON;

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record = Record::decode(bytes)?;
        Ok(Person {
            id: record.id,
            name: record.get(NAME)?,
            age: record.get(AGE)?,
            score: record.get(SCORE)?,
        })
    }
}

pub fn person_model() -> EntityModel {
    EntityModel::new(PERSON, "Person")
        .with_property(1, "name", PropertyType::Text)
        .with_property(2, "age", PropertyType::Int32)
        .with_property(3, "score", PropertyType::UInt64)
}

pub fn put_person(engine: &MemoryEngine, name: &str, age: Option<i32>, score: Option<u64>) -> ObjectId {
    let mut props = PropertyMap::new();
    props.insert(NAME, Value::from(name));
    props.insert(AGE, Value::from(age));
    props.insert(SCORE, Value::from(score));
    engine.put(PERSON, props).unwrap()
}

/// Ids of the five seeded people, in insertion order.
pub struct People {
    pub ann: ObjectId,
    pub ann_upper: ObjectId,
    pub bob: ObjectId,
    pub cid: ObjectId,
    pub dee: ObjectId,
}

pub fn seed(engine: &MemoryEngine) -> People {
    engine.register(person_model());
    People {
        ann: put_person(engine, "Ann", Some(25), Some(10)),
        ann_upper: put_person(engine, "ANN", Some(40), None),
        bob: put_person(engine, "Bob", Some(22), Some(1 << 63)),
        cid: put_person(engine, "Cid", Some(30), Some(7)),
        dee: put_person(engine, "Dee", None, None),
    }
}

pub fn memory_store() -> (Store<MemoryEngine>, EntityModel, People) {
    let store = Store::open_memory().unwrap();
    let people = seed(store.engine());
    (store, person_model(), people)
}

// ============================================================================
// Fault-injecting engine
// ============================================================================

/// Which engine calls fail. All flags start cleared.
#[derive(Default)]
pub struct Faults {
    pub find: AtomicBool,
    pub compile: AtomicBool,
    pub close_query: AtomicBool,
    pub close_builder: AtomicBool,
    pub close_cursor: AtomicBool,
    pub new_builder_calls: AtomicUsize,
    pub close_query_calls: AtomicUsize,
}

impl Faults {
    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Memory engine wrapper that fails selected calls on demand.
///
/// Failing releases still release the wrapped handle, so the inner
/// engine's counters stay accurate.
#[derive(Clone, Default)]
pub struct FaultyEngine {
    pub inner: MemoryEngine,
    pub faults: Arc<Faults>,
}

impl StorageEngine for FaultyEngine {
    type Builder = MemoryBuilder;
    type Query = MemoryQuery;
    type Tx = MemoryTx;
    type Cursor = MemoryCursor;

    fn new_builder(&self, entity: EntityId) -> Result<MemoryBuilder> {
        self.faults.new_builder_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.new_builder(entity)
    }

    fn compile(&self, builder: &mut MemoryBuilder) -> Result<MemoryQuery> {
        if self.faults.compile.load(Ordering::SeqCst) {
            return Err(Error::BuildError("injected compile failure".into()));
        }
        self.inner.compile(builder)
    }

    fn close_builder(&self, builder: MemoryBuilder) -> Result<()> {
        self.inner.close_builder(builder)?;
        if self.faults.close_builder.load(Ordering::SeqCst) {
            return Err(Error::ReleaseError("injected close_builder failure".into()));
        }
        Ok(())
    }

    fn find(&self, query: &MemoryQuery, cursor: &MemoryCursor) -> Result<Vec<Vec<u8>>> {
        if self.faults.find.load(Ordering::SeqCst) {
            return Err(Error::ExecutionError("injected find failure".into()));
        }
        self.inner.find(query, cursor)
    }

    fn find_ids(&self, query: &MemoryQuery, cursor: &MemoryCursor) -> Result<Vec<ObjectId>> {
        self.inner.find_ids(query, cursor)
    }

    fn count(&self, query: &MemoryQuery, cursor: &MemoryCursor) -> Result<u64> {
        self.inner.count(query, cursor)
    }

    fn describe(&self, query: &MemoryQuery) -> Result<String> {
        self.inner.describe(query)
    }

    fn close_query(&self, query: MemoryQuery) -> Result<()> {
        self.faults.close_query_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.close_query(query)?;
        if self.faults.close_query.load(Ordering::SeqCst) {
            return Err(Error::ReleaseError("injected close_query failure".into()));
        }
        Ok(())
    }

    fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        self.inner.begin_tx(mode)
    }

    fn end_tx(&self, tx: MemoryTx) -> Result<()> {
        self.inner.end_tx(tx)
    }

    fn cursor(&self, tx: &MemoryTx, entity: EntityId) -> Result<MemoryCursor> {
        self.inner.cursor(tx, entity)
    }

    fn close_cursor(&self, cursor: MemoryCursor) -> Result<()> {
        self.inner.close_cursor(cursor)?;
        if self.faults.close_cursor.load(Ordering::SeqCst) {
            return Err(Error::ReleaseError("injected close_cursor failure".into()));
        }
        Ok(())
    }
}

pub fn faulty_store() -> (Store<FaultyEngine>, Arc<Faults>, People) {
    let engine = FaultyEngine::default();
    let people = seed(&engine.inner);
    let faults = engine.faults.clone();
    (Store::with_engine(engine), faults, people)
}

/// Every builder, compiled query and cursor of the wrapped engine has been released.
pub fn assert_released(engine: &MemoryEngine) {
    assert_eq!(engine.open_builders(), 0, "open builders");
    assert_eq!(engine.open_queries(), 0, "open queries");
    assert_eq!(engine.open_cursors(), 0, "open cursors");
}
