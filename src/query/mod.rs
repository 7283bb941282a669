//! # Queries
//!
//! Typed property views produce [`Condition`] trees; a [`Query`] turns its
//! tree into an engine query only while one public call is running.
//!
//! ```text
//! PropertyView → Condition (pure data)
//!   Query::find() → build:   QueryBuilder::open → Condition::materialize → compile → close builder
//!                 → execute: Store::run_with_cursor → StorageEngine::find → Entity::from_bytes
//!                 → free:    StorageEngine::close_query
//! ```
//!
//! A `Query` is Unbuilt before and after every call. Builder sessions and
//! compiled handles are scoped acquisitions: each one is released on every
//! exit path, and `Drop` covers unwinding.

pub mod builder;
pub mod condition;
pub mod property;

use std::marker::PhantomData;

use tracing::{debug, error, warn};

use crate::model::{Entity, EntityId, ObjectId};
use crate::storage::StorageEngine;
use crate::tx::TxMode;
use crate::{Error, Result, Store};

pub use builder::QueryBuilder;
pub use condition::{CompareOp, Comparison, Condition};
pub use property::PropertyView;

// ============================================================================
// Release bookkeeping
// ============================================================================

/// Combine the outcome of an operation with the release that followed it.
///
/// The operation's own error wins; a release failure that would otherwise
/// be hidden behind it is logged.
pub(crate) fn settle<R>(outcome: Result<R>, released: Result<()>, what: &str) -> Result<R> {
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release)) => Err(release),
        (Err(primary), Ok(())) => Err(primary),
        (Err(primary), Err(release)) => {
            error!(%primary, %release, "{what}: release failed after an earlier error");
            Err(primary)
        }
    }
}

fn release_compiled<E: StorageEngine>(engine: &E, slot: &mut Option<E::Query>) -> Result<()> {
    match slot.take() {
        Some(compiled) => engine.close_query(compiled),
        None => Ok(()),
    }
}

/// Frees the compiled handle when the execute bracket ends, however it ends.
struct Compiled<'a, E: StorageEngine> {
    engine: &'a E,
    slot: &'a mut Option<E::Query>,
}

impl<E: StorageEngine> Compiled<'_, E> {
    fn release(self) -> Result<()> {
        release_compiled(self.engine, self.slot)
    }
}

impl<E: StorageEngine> Drop for Compiled<'_, E> {
    fn drop(&mut self) {
        if let Err(err) = release_compiled(self.engine, self.slot) {
            error!(error = %err, "failed to close compiled query");
        }
    }
}

// ============================================================================
// Query
// ============================================================================

/// A filter over the objects of entity `T`.
///
/// Created by [`Store::query`]. Executing requires `&mut self`: the compiled
/// handle lives in the query for the duration of one call, so a single
/// `Query` cannot run on two threads at once. Clone the condition into a
/// second query instead.
pub struct Query<'s, E: StorageEngine, T> {
    store: &'s Store<E>,
    entity: EntityId,
    condition: Condition,
    compiled: Option<E::Query>,
    object: PhantomData<fn() -> T>,
}

impl<'s, E: StorageEngine, T: Entity> Query<'s, E, T> {
    pub(crate) fn new(store: &'s Store<E>, condition: Condition) -> Self {
        Self {
            store,
            entity: T::ENTITY_ID,
            condition,
            compiled: None,
            object: PhantomData,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Replace the condition used by subsequent calls.
    pub fn set_condition(&mut self, condition: Condition) {
        self.condition = condition;
    }

    /// Whether a compiled handle is currently held. Always false between calls.
    pub fn is_built(&self) -> bool {
        self.compiled.is_some()
    }

    /// Fetch and decode every matching object.
    pub fn find(&mut self) -> Result<Vec<T>> {
        let entity = self.entity;
        let objects = self.execute("find", |store, compiled| {
            store.run_with_cursor(entity, TxMode::ReadOnly, |cursor| {
                let records = store.engine().find(compiled, cursor)?;
                records.iter().map(|bytes| T::from_bytes(bytes)).collect::<Result<Vec<T>>>()
            })
        })?;
        debug!(%entity, found = objects.len(), "query find finished");
        Ok(objects)
    }

    /// Ids of every matching object, ascending.
    pub fn find_ids(&mut self) -> Result<Vec<ObjectId>> {
        let entity = self.entity;
        self.execute("find_ids", |store, compiled| {
            store.run_with_cursor(entity, TxMode::ReadOnly, |cursor| {
                store.engine().find_ids(compiled, cursor)
            })
        })
    }

    /// Number of matching objects.
    pub fn count(&mut self) -> Result<u64> {
        let entity = self.entity;
        self.execute("count", |store, compiled| {
            store.run_with_cursor(entity, TxMode::ReadOnly, |cursor| {
                store.engine().count(compiled, cursor)
            })
        })
    }

    /// Build the query and return the engine's description of it without
    /// running it.
    pub fn describe(&mut self) -> Result<String> {
        self.execute("describe", |store, compiled| store.engine().describe(compiled))
    }

    /// Run `op` with a freshly built handle, freeing it afterwards.
    fn execute<R>(
        &mut self,
        what: &'static str,
        op: impl FnOnce(&'s Store<E>, &E::Query) -> Result<R>,
    ) -> Result<R> {
        self.build()?;

        let store = self.store;
        let guard = Compiled { engine: store.engine(), slot: &mut self.compiled };
        let outcome = match guard.slot.as_ref() {
            Some(compiled) => op(store, compiled),
            None => Err(Error::BuildError("query compiled without a handle".into())),
        };
        let released = guard.release();
        settle(outcome, released, what)
    }

    /// Build the compiled handle just in time.
    ///
    /// The builder session is closed whether or not materialization and
    /// compilation succeed. On failure no handle is stored.
    fn build(&mut self) -> Result<()> {
        // A handle can only be left over if an earlier free failed; drop it first.
        self.free()?;

        let engine = self.store.engine();
        debug!(entity = %self.entity, condition = %self.condition, "building query");

        let mut qb = QueryBuilder::open(engine, self.entity)?;
        let compiled = self.condition.materialize(&mut qb).and_then(|_| qb.compile());
        let closed = qb.close();

        match (compiled, closed) {
            (Ok(compiled), Ok(())) => {
                self.compiled = Some(compiled);
                Ok(())
            }
            (Ok(compiled), Err(release)) => {
                if let Err(err) = engine.close_query(compiled) {
                    warn!(error = %err, "failed to close query compiled by a failing builder");
                }
                Err(release)
            }
            (Err(primary), closed) => settle(Err(primary), closed, "build"),
        }
    }

    /// Release the compiled handle. A no-op when none is held.
    fn free(&mut self) -> Result<()> {
        release_compiled(self.store.engine(), &mut self.compiled)
    }
}

impl<E: StorageEngine, T> Drop for Query<'_, E, T> {
    fn drop(&mut self) {
        if let Err(err) = release_compiled(self.store.engine(), &mut self.compiled) {
            error!(error = %err, "failed to close compiled query on drop");
        }
    }
}
