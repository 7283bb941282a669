//! # Storage Engine Traits
//!
//! The contract between the query layer and the storage engine. The
//! query layer never touches records directly: it registers conditions
//! on an [`EngineBuilder`], compiles them into an engine query, and runs
//! that query against a cursor.
//!
//! ## Primitive families
//!
//! | Family | Where |
//! |--------|-------|
//! | Condition registration | `EngineBuilder::string_*`, `int_*`, `int64_in`, `int32_in`, ... |
//! | Composite combination | `EngineBuilder::all` / `EngineBuilder::any` |
//! | Builder lifecycle | `StorageEngine::new_builder` / `compile` / `close_builder` |
//! | Query execution | `StorageEngine::find` / `count` / `find_ids` / `close_query` |
//! | Cursors | `StorageEngine::begin_tx` / `cursor` / `close_cursor` / `end_tx` |
//!
//! ## Implementations
//!
//! | Engine | Module | Description |
//! |--------|--------|-------------|
//! | `MemoryEngine` | `memory` | In-process reference engine for testing/embedding |

pub mod memory;

use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::Result;

pub use memory::{MemoryConfig, MemoryEngine};

// ============================================================================
// Engine Configuration
// ============================================================================

/// Configuration for opening a storage engine.
#[derive(Debug, Clone)]
pub enum EngineConfig {
    /// In-memory (no persistence)
    Memory(MemoryConfig),
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::Memory(MemoryConfig::default())
    }
}

// ============================================================================
// EngineBuilder Trait
// ============================================================================

/// Engine-side query builder session.
///
/// Each method registers one comparison and returns a builder-scoped
/// condition id, or fails when the operands do not fit the property
/// (unknown property, type mismatch, width mismatch). Integer operands
/// arrive widened (or reinterpreted, for unsigned types) to `i64`/`i32`;
/// the engine maps them back onto the property's declared type.
pub trait EngineBuilder: Send {
    // ========================================================================
    // Text
    // ========================================================================

    fn string_equal(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId>;

    fn string_not_equal(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId>;

    fn string_contains(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId>;

    fn string_starts_with(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId>;

    fn string_ends_with(&mut self, property: PropertyId, value: &str, case_sensitive: bool) -> Result<ConditionId>;

    /// `>` or, with `or_equal`, `>=`.
    fn string_greater(&mut self, property: PropertyId, value: &str, case_sensitive: bool, or_equal: bool) -> Result<ConditionId>;

    /// `<` or, with `or_equal`, `<=`.
    fn string_less(&mut self, property: PropertyId, value: &str, case_sensitive: bool, or_equal: bool) -> Result<ConditionId>;

    fn string_in(&mut self, property: PropertyId, values: &[String], case_sensitive: bool) -> Result<ConditionId>;

    // ========================================================================
    // Integers
    // ========================================================================

    fn int_equal(&mut self, property: PropertyId, value: i64) -> Result<ConditionId>;

    fn int_not_equal(&mut self, property: PropertyId, value: i64) -> Result<ConditionId>;

    fn int_greater(&mut self, property: PropertyId, value: i64) -> Result<ConditionId>;

    fn int_less(&mut self, property: PropertyId, value: i64) -> Result<ConditionId>;

    /// Inclusive range. `a > b` is passed through untouched.
    fn int_between(&mut self, property: PropertyId, a: i64, b: i64) -> Result<ConditionId>;

    fn int64_in(&mut self, property: PropertyId, values: &[i64]) -> Result<ConditionId>;

    fn int64_not_in(&mut self, property: PropertyId, values: &[i64]) -> Result<ConditionId>;

    fn int32_in(&mut self, property: PropertyId, values: &[i32]) -> Result<ConditionId>;

    fn int32_not_in(&mut self, property: PropertyId, values: &[i32]) -> Result<ConditionId>;

    // ========================================================================
    // Floats, byte vectors, null checks
    // ========================================================================

    fn double_greater(&mut self, property: PropertyId, value: f64) -> Result<ConditionId>;

    fn double_less(&mut self, property: PropertyId, value: f64) -> Result<ConditionId>;

    fn double_between(&mut self, property: PropertyId, a: f64, b: f64) -> Result<ConditionId>;

    fn bytes_equal(&mut self, property: PropertyId, value: &[u8]) -> Result<ConditionId>;

    fn bytes_greater(&mut self, property: PropertyId, value: &[u8], or_equal: bool) -> Result<ConditionId>;

    fn bytes_less(&mut self, property: PropertyId, value: &[u8], or_equal: bool) -> Result<ConditionId>;

    fn is_null(&mut self, property: PropertyId) -> Result<ConditionId>;

    fn not_null(&mut self, property: PropertyId) -> Result<ConditionId>;

    // ========================================================================
    // Composite combination
    // ========================================================================

    /// Conjunction of previously registered conditions.
    fn all(&mut self, conditions: &[ConditionId]) -> Result<ConditionId>;

    /// Disjunction of previously registered conditions.
    fn any(&mut self, conditions: &[ConditionId]) -> Result<ConditionId>;
}

// ============================================================================
// StorageEngine Trait
// ============================================================================

/// The storage contract consumed by `Query` and `Store`.
///
/// Every acquire method has a matching release method; the query layer
/// guarantees each acquired handle is released exactly once.
pub trait StorageEngine: Send + Sync + 'static {
    /// Builder session type.
    type Builder: EngineBuilder;
    /// Compiled, executable query.
    type Query: Send;
    /// Transaction type.
    type Tx: Transaction;
    /// Read cursor bound to one entity within a transaction.
    type Cursor;

    // ========================================================================
    // Builder lifecycle
    // ========================================================================

    /// Open a builder session for an entity type.
    fn new_builder(&self, entity: EntityId) -> Result<Self::Builder>;

    /// Compile everything registered on the builder into a query.
    /// Registered conditions not consumed by `all`/`any` are conjoined.
    fn compile(&self, builder: &mut Self::Builder) -> Result<Self::Query>;

    /// Release a builder session.
    fn close_builder(&self, builder: Self::Builder) -> Result<()>;

    // ========================================================================
    // Query execution
    // ========================================================================

    /// Raw records of every object matching the query, in id order.
    fn find(&self, query: &Self::Query, cursor: &Self::Cursor) -> Result<Vec<Vec<u8>>>;

    /// Ids of every object matching the query, in id order.
    fn find_ids(&self, query: &Self::Query, cursor: &Self::Cursor) -> Result<Vec<ObjectId>>;

    /// Number of objects matching the query.
    fn count(&self, query: &Self::Query, cursor: &Self::Cursor) -> Result<u64>;

    /// Engine-defined description of a compiled query.
    fn describe(&self, query: &Self::Query) -> Result<String>;

    /// Release a compiled query.
    fn close_query(&self, query: Self::Query) -> Result<()>;

    // ========================================================================
    // Transactions and cursors
    // ========================================================================

    fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit (read-write) or release (read-only) a transaction.
    fn end_tx(&self, tx: Self::Tx) -> Result<()>;

    fn cursor(&self, tx: &Self::Tx, entity: EntityId) -> Result<Self::Cursor>;

    fn close_cursor(&self, cursor: Self::Cursor) -> Result<()>;
}
