//! # objstore-query — Typed Query Conditions for an Embedded Object Store
//!
//! Filter predicates over strongly-typed entity properties, compiled into
//! an engine query only when a query actually runs.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageEngine` is the contract between queries and storage
//! 2. **Conditions are data**: building a `Condition` never touches the engine
//! 3. **Just-in-time build**: every `find`/`count`/`describe` builds, runs and
//!    frees its own engine query
//! 4. **Injected engine**: a `Store` owns its engine; no process-wide state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use objstore_query::{Entity, EntityId, EntityModel, PropertyId, PropertyType, Record, Store};
//! use objstore_query::query::property::{PropertyInt32, PropertyString};
//!
//! struct Person { name: String, age: i32 }
//!
//! impl Entity for Person {
//!     const ENTITY_ID: EntityId = EntityId(1);
//!     fn from_bytes(bytes: &[u8]) -> objstore_query::Result<Self> {
//!         let r = Record::decode(bytes)?;
//!         Ok(Person { name: r.get(PropertyId(1))?, age: r.get(PropertyId(2))? })
//!     }
//! }
//!
//! # fn example() -> objstore_query::Result<()> {
//! let model = EntityModel::new(Person::ENTITY_ID, "Person")
//!     .with_property(1, "name", PropertyType::Text)
//!     .with_property(2, "age", PropertyType::Int32);
//! let store = Store::open_memory()?;
//! store.engine().register(model.clone());
//!
//! let name = PropertyString::new(&model.properties[0]);
//! let age = PropertyInt32::new(&model.properties[1]);
//!
//! let mut query = store.query::<Person>(name.equal("Ann", false).and(age.between(20, 30)));
//! for person in query.find()? {
//!     println!("{} ({})", person.name, person.age);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Engines
//!
//! | Engine | Description |
//! |--------|-------------|
//! | Memory | In-process engine for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod query;
pub mod storage;
pub mod tx;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Entity, EntityModel, Property, PropertyType, Value, Record, PropertyMap, FromValue,
    EntityId, PropertyId, ObjectId, ConditionId,
};

// ============================================================================
// Re-exports: Queries
// ============================================================================

pub use query::{Query, QueryBuilder, Condition, Comparison, CompareOp, PropertyView};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{StorageEngine, EngineBuilder, EngineConfig, MemoryEngine, MemoryConfig};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxMode, TxId};

// ============================================================================
// Top-level Store handle
// ============================================================================

/// The primary entry point. A `Store` owns a storage engine and creates
/// queries against it.
pub struct Store<E: StorageEngine> {
    engine: E,
}

impl<E: StorageEngine> Store<E> {
    /// Create a Store with the given engine.
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    /// Access the underlying engine (for schema registration and writes).
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Create a query over entity `T`. Nothing is built until it runs.
    pub fn query<T: Entity>(&self, condition: Condition) -> Query<'_, E, T> {
        Query::new(self, condition)
    }

    /// Run `f` with a cursor over `entity`.
    ///
    /// The cursor is closed and the transaction ended on every path; when
    /// `f` fails and a release fails too, `f`'s error is returned.
    pub fn run_with_cursor<R>(
        &self,
        entity: EntityId,
        mode: TxMode,
        f: impl FnOnce(&E::Cursor) -> Result<R>,
    ) -> Result<R> {
        let tx = self.engine.begin_tx(mode)?;
        let outcome = match self.engine.cursor(&tx, entity) {
            Ok(cursor) => {
                let outcome = f(&cursor);
                let closed = self.engine.close_cursor(cursor);
                query::settle(outcome, closed, "cursor")
            }
            Err(err) => Err(err),
        };
        let ended = self.engine.end_tx(tx);
        query::settle(outcome, ended, "transaction")
    }
}

impl Store<MemoryEngine> {
    /// Open a store from configuration.
    pub fn open(config: EngineConfig) -> Result<Self> {
        match config {
            EngineConfig::Memory(config) => Ok(Self::with_engine(MemoryEngine::with_config(config))),
        }
    }

    /// In-memory store for testing and embedding.
    pub fn open_memory() -> Result<Self> {
        Self::open(EngineConfig::default())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Broad class of an [`Error`], matching where in a query's life it arose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Condition rejected while materializing, or compile rejected.
    Build,
    /// Engine failure while running a compiled query.
    Execution,
    /// Failure to close a builder, compiled query, cursor or transaction.
    Release,
    /// Raw record could not be decoded.
    Decode,
    /// Schema, transaction or other engine-level failure.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("Unknown property {property} for entity {entity}")]
    UnknownProperty { entity: EntityId, property: PropertyId },

    #[error("Type error on property {property}: expected {expected}, got {got}")]
    TypeMismatch { property: PropertyId, expected: String, got: String },

    #[error("Unsupported condition: {0}")]
    Unsupported(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Release error: {0}")]
    ReleaseError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownProperty { .. }
            | Error::TypeMismatch { .. }
            | Error::Unsupported(_)
            | Error::BuildError(_) => ErrorKind::Build,
            Error::ExecutionError(_) => ErrorKind::Execution,
            Error::ReleaseError(_) => ErrorKind::Release,
            Error::DecodeError(_) | Error::Json(_) => ErrorKind::Decode,
            Error::UnknownEntity(_) | Error::TxError(_) | Error::StorageError(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
