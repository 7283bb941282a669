//! In-memory storage engine.
//!
//! This is the reference implementation of `StorageEngine`.
//! It keeps encoded records in hash maps protected by `RwLock`.
//!
//! ## Limitations
//!
//! - **No real transactions**: `end_tx()` is a no-op and writes made
//!   through [`MemoryEngine::put`] are applied immediately.
//! - **No indexes**: every query is a full scan of its entity.
//!
//! ## Handle accounting
//!
//! The engine counts live builders, compiled queries and cursors
//! (`open_builders()`, `open_queries()`, `open_cursors()`). Tests use the
//! counters to check that every acquired handle is released.

mod builder;
mod predicate;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::StorageEngine;
use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

pub use builder::{MemoryBuilder, MemoryQuery};

// ============================================================================
// Configuration
// ============================================================================

/// Memory engine settings.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Upper bound on the records a single `find` may return. A query
    /// matching more fails with an execution error.
    pub result_limit: Option<usize>,
}

// ============================================================================
// MemoryEngine
// ============================================================================

/// In-memory object storage. Clones share the same data.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    config: MemoryConfig,
    schemas: RwLock<HashMap<EntityId, EntityModel>>,
    /// entity → object id → encoded record
    records: RwLock<HashMap<EntityId, BTreeMap<ObjectId, Vec<u8>>>>,
    next_object_id: AtomicU64,
    next_builder_id: AtomicU64,
    next_query_id: AtomicU64,
    next_tx_id: AtomicU64,
    open_builders: AtomicUsize,
    open_queries: AtomicUsize,
    open_cursors: AtomicUsize,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                config,
                schemas: RwLock::new(HashMap::new()),
                records: RwLock::new(HashMap::new()),
                next_object_id: AtomicU64::new(1),
                next_builder_id: AtomicU64::new(1),
                next_query_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
                open_builders: AtomicUsize::new(0),
                open_queries: AtomicUsize::new(0),
                open_cursors: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.inner.config
    }

    /// Register (or replace) an entity schema.
    pub fn register(&self, model: EntityModel) {
        debug!(entity = %model.id, name = %model.name, "entity registered");
        self.inner.records.write().entry(model.id).or_default();
        self.inner.schemas.write().insert(model.id, model);
    }

    pub fn model(&self, entity: EntityId) -> Result<EntityModel> {
        self.inner
            .schemas
            .read()
            .get(&entity)
            .cloned()
            .ok_or(Error::UnknownEntity(entity))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store a new object and return its id.
    ///
    /// Every value must belong to a declared property and fit its type.
    pub fn put(&self, entity: EntityId, properties: PropertyMap) -> Result<ObjectId> {
        let model = self.model(entity)?;
        for (id, value) in &properties {
            let property = model.property(*id).ok_or(Error::UnknownProperty { entity, property: *id })?;
            if !value_fits(property.kind, value) {
                return Err(Error::TypeMismatch {
                    property: *id,
                    expected: property.kind.name().into(),
                    got: value.type_name().into(),
                });
            }
        }

        let id = ObjectId(self.inner.next_object_id.fetch_add(1, Ordering::Relaxed));
        let bytes = Record::new(id, properties).encode()?;
        self.inner.records.write().entry(entity).or_default().insert(id, bytes);
        Ok(id)
    }

    /// Remove an object. Returns true if it existed.
    pub fn remove(&self, entity: EntityId, id: ObjectId) -> Result<bool> {
        let mut records = self.inner.records.write();
        let objects = records.get_mut(&entity).ok_or(Error::UnknownEntity(entity))?;
        Ok(objects.remove(&id).is_some())
    }

    /// Raw record of one object.
    pub fn get(&self, entity: EntityId, id: ObjectId) -> Result<Option<Vec<u8>>> {
        let records = self.inner.records.read();
        let objects = records.get(&entity).ok_or(Error::UnknownEntity(entity))?;
        Ok(objects.get(&id).cloned())
    }

    // ========================================================================
    // Handle accounting
    // ========================================================================

    pub fn open_builders(&self) -> usize {
        self.inner.open_builders.load(Ordering::SeqCst)
    }

    pub fn open_queries(&self) -> usize {
        self.inner.open_queries.load(Ordering::SeqCst)
    }

    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(Ordering::SeqCst)
    }

    /// Decoded records of `query.entity` matching the query, in id order.
    fn scan(&self, query: &MemoryQuery, cursor: &MemoryCursor) -> Result<Vec<(ObjectId, Vec<u8>)>> {
        if query.entity != cursor.entity {
            return Err(Error::ExecutionError(format!(
                "query for entity {} run on a cursor for entity {}",
                query.entity, cursor.entity
            )));
        }
        let records = self.inner.records.read();
        let objects = records.get(&query.entity).ok_or(Error::UnknownEntity(query.entity))?;

        let mut matched = Vec::new();
        for (id, bytes) in objects {
            let record = Record::decode(bytes)?;
            if query.predicate.matches(&record) {
                matched.push((*id, bytes.clone()));
            }
        }
        debug!(query = query.id, tx = %cursor.tx, scanned = objects.len(), matched = matched.len(), "memory scan");
        Ok(matched)
    }
}

fn value_fits(kind: PropertyType, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(_) => kind == PropertyType::Bool,
        Value::Int(i) => {
            kind.is_signed()
                && kind.int_width().is_some_and(|w| w == 64 || (*i >= -(1i64 << (w - 1)) && *i < (1i64 << (w - 1))))
        }
        Value::UInt(u) => {
            kind.is_unsigned() && kind.int_width().is_some_and(|w| w == 64 || *u < (1u64 << w))
        }
        // non-finite floats have no record encoding
        Value::Float(f) => {
            f.is_finite()
                && (kind == PropertyType::Float64
                    || (kind == PropertyType::Float32 && f.abs() <= f64::from(f32::MAX)))
        }
        Value::String(_) => kind == PropertyType::Text,
        Value::Bytes(_) => kind == PropertyType::ByteVector,
    }
}

// ============================================================================
// MemoryTx / MemoryCursor
// ============================================================================

/// In-memory transaction (a marker; no MVCC).
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

/// Read cursor over one entity.
pub struct MemoryCursor {
    tx: TxId,
    entity: EntityId,
}

impl MemoryCursor {
    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

// ============================================================================
// StorageEngine impl
// ============================================================================

impl StorageEngine for MemoryEngine {
    type Builder = MemoryBuilder;
    type Query = MemoryQuery;
    type Tx = MemoryTx;
    type Cursor = MemoryCursor;

    fn new_builder(&self, entity: EntityId) -> Result<MemoryBuilder> {
        let model = self.model(entity)?;
        let id = self.inner.next_builder_id.fetch_add(1, Ordering::Relaxed);
        self.inner.open_builders.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryBuilder::new(id, model))
    }

    fn compile(&self, builder: &mut MemoryBuilder) -> Result<MemoryQuery> {
        let id = self.inner.next_query_id.fetch_add(1, Ordering::Relaxed);
        let query = MemoryQuery {
            id,
            entity: builder.entity(),
            entity_name: builder.model().name.clone(),
            predicate: builder.root(),
        };
        self.inner.open_queries.fetch_add(1, Ordering::SeqCst);
        debug!(query = id, builder = builder.id(), predicate = %query.predicate, "memory query compiled");
        Ok(query)
    }

    fn close_builder(&self, _builder: MemoryBuilder) -> Result<()> {
        self.inner.open_builders.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn find(&self, query: &MemoryQuery, cursor: &MemoryCursor) -> Result<Vec<Vec<u8>>> {
        let matched = self.scan(query, cursor)?;
        if let Some(limit) = self.inner.config.result_limit {
            if matched.len() > limit {
                return Err(Error::ExecutionError(format!(
                    "query matched {} records, limit is {limit}",
                    matched.len()
                )));
            }
        }
        Ok(matched.into_iter().map(|(_, bytes)| bytes).collect())
    }

    fn find_ids(&self, query: &MemoryQuery, cursor: &MemoryCursor) -> Result<Vec<ObjectId>> {
        Ok(self.scan(query, cursor)?.into_iter().map(|(id, _)| id).collect())
    }

    fn count(&self, query: &MemoryQuery, cursor: &MemoryCursor) -> Result<u64> {
        Ok(self.scan(query, cursor)?.len() as u64)
    }

    fn describe(&self, query: &MemoryQuery) -> Result<String> {
        Ok(format!("Query for entity {} ({}): {}", query.entity_name, query.entity, query.predicate))
    }

    fn close_query(&self, _query: MemoryQuery) -> Result<()> {
        self.inner.open_queries.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode })
    }

    /// No-op: memory engine applies writes immediately.
    fn end_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    fn cursor(&self, tx: &MemoryTx, entity: EntityId) -> Result<MemoryCursor> {
        if !self.inner.schemas.read().contains_key(&entity) {
            return Err(Error::UnknownEntity(entity));
        }
        self.inner.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryCursor { tx: tx.id, entity })
    }

    fn close_cursor(&self, _cursor: MemoryCursor) -> Result<()> {
        self.inner.open_cursors.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EngineBuilder;

    const ITEM: EntityId = EntityId(7);

    fn engine() -> MemoryEngine {
        let db = MemoryEngine::new();
        db.register(
            EntityModel::new(ITEM, "Item")
                .with_property(1, "label", PropertyType::Text)
                .with_property(2, "qty", PropertyType::UInt8),
        );
        db
    }

    fn props(label: &str, qty: u8) -> PropertyMap {
        let mut p = PropertyMap::new();
        p.insert(PropertyId(1), Value::from(label));
        p.insert(PropertyId(2), Value::from(qty));
        p
    }

    #[test]
    fn test_put_and_get() {
        let db = engine();
        let id = db.put(ITEM, props("bolt", 4)).unwrap();
        let record = Record::decode(&db.get(ITEM, id).unwrap().unwrap()).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.get::<String>(PropertyId(1)).unwrap(), "bolt");

        assert!(db.remove(ITEM, id).unwrap());
        assert!(!db.remove(ITEM, id).unwrap());
        assert_eq!(db.get(ITEM, id).unwrap(), None);
    }

    #[test]
    fn test_put_rejects_out_of_range() {
        let db = engine();
        let mut p = PropertyMap::new();
        p.insert(PropertyId(2), Value::UInt(256));
        assert!(matches!(db.put(ITEM, p), Err(Error::TypeMismatch { .. })));
        assert!(matches!(db.put(EntityId(99), PropertyMap::new()), Err(Error::UnknownEntity(_))));
    }

    #[test]
    fn test_put_rejects_non_finite_floats() {
        let db = MemoryEngine::new();
        let reading = EntityId(8);
        db.register(EntityModel::new(reading, "Reading").with_property(1, "v", PropertyType::Float32));
        let put = |v: f64| {
            let mut p = PropertyMap::new();
            p.insert(PropertyId(1), Value::Float(v));
            db.put(reading, p)
        };

        let finite = put(1.0).unwrap();
        for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, f64::MAX] {
            assert!(matches!(put(bad), Err(Error::TypeMismatch { .. })), "{bad} accepted");
        }

        let mut b = db.new_builder(reading).unwrap();
        b.double_less(PropertyId(1), 2.0).unwrap();
        let q = db.compile(&mut b).unwrap();
        db.close_builder(b).unwrap();
        let tx = db.begin_tx(TxMode::ReadOnly).unwrap();
        let cursor = db.cursor(&tx, reading).unwrap();
        assert_eq!(db.find_ids(&q, &cursor).unwrap(), vec![finite]);
        db.close_cursor(cursor).unwrap();
        db.close_query(q).unwrap();
    }

    #[test]
    fn test_compile_and_find() {
        let db = engine();
        db.put(ITEM, props("bolt", 4)).unwrap();
        let nut = db.put(ITEM, props("nut", 200)).unwrap();

        let mut b = db.new_builder(ITEM).unwrap();
        b.int32_in(PropertyId(2), &[200u8 as i32]).unwrap();
        let q = db.compile(&mut b).unwrap();
        db.close_builder(b).unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).unwrap();
        let cursor = db.cursor(&tx, ITEM).unwrap();
        assert_eq!(db.find_ids(&q, &cursor).unwrap(), vec![nut]);
        assert_eq!(db.count(&q, &cursor).unwrap(), 1);
        db.close_cursor(cursor).unwrap();
        db.end_tx(tx).unwrap();

        assert!(db.describe(&q).unwrap().contains("qty in [200]"));
        db.close_query(q).unwrap();
        assert_eq!(db.open_builders(), 0);
        assert_eq!(db.open_queries(), 0);
        assert_eq!(db.open_cursors(), 0);
    }

    #[test]
    fn test_result_limit() {
        let db = MemoryEngine::with_config(MemoryConfig { result_limit: Some(1) });
        db.register(EntityModel::new(ITEM, "Item").with_property(1, "label", PropertyType::Text));
        for label in ["a", "b"] {
            let mut p = PropertyMap::new();
            p.insert(PropertyId(1), Value::from(label));
            db.put(ITEM, p).unwrap();
        }

        let mut b = db.new_builder(ITEM).unwrap();
        let q = db.compile(&mut b).unwrap();
        db.close_builder(b).unwrap();
        let tx = db.begin_tx(TxMode::ReadOnly).unwrap();
        let cursor = db.cursor(&tx, ITEM).unwrap();
        assert!(matches!(db.find(&q, &cursor), Err(Error::ExecutionError(_))));
        assert_eq!(db.count(&q, &cursor).unwrap(), 2);
        db.close_cursor(cursor).unwrap();
        db.close_query(q).unwrap();
    }
}
