//! Query builder session.
//!
//! Wraps one engine builder for the duration of a single build. The
//! session is closed exactly once: explicitly through [`QueryBuilder::close`]
//! on the normal path, or by `Drop` when an early return or unwind
//! skips it.

use tracing::{debug, error, trace};

use super::condition::Comparison;
use crate::model::{ConditionId, EntityId};
use crate::storage::{EngineBuilder, StorageEngine};
use crate::{Error, Result};

pub struct QueryBuilder<'s, E: StorageEngine> {
    engine: &'s E,
    entity: EntityId,
    raw: Option<E::Builder>,
    registered: usize,
}

impl<'s, E: StorageEngine> QueryBuilder<'s, E> {
    /// Open a builder session for `entity`.
    pub fn open(engine: &'s E, entity: EntityId) -> Result<Self> {
        let raw = engine.new_builder(entity)?;
        debug!(%entity, "query builder opened");
        Ok(Self { engine, entity, raw: Some(raw), registered: 0 })
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Number of conditions registered so far, combinations included.
    pub fn registered(&self) -> usize {
        self.registered
    }

    fn raw(&mut self) -> Result<&mut E::Builder> {
        self.raw
            .as_mut()
            .ok_or_else(|| Error::BuildError("query builder already closed".into()))
    }

    /// Register one comparison.
    pub fn register(&mut self, comparison: &Comparison) -> Result<ConditionId> {
        let id = comparison.apply(self.raw()?)?;
        self.registered += 1;
        trace!(condition = %id, %comparison, "condition registered");
        Ok(id)
    }

    /// Combine registered conditions into a conjunction.
    pub fn all(&mut self, conditions: &[ConditionId]) -> Result<ConditionId> {
        let id = self.raw()?.all(conditions)?;
        self.registered += 1;
        trace!(condition = %id, children = conditions.len(), "conjunction registered");
        Ok(id)
    }

    /// Combine registered conditions into a disjunction.
    pub fn any(&mut self, conditions: &[ConditionId]) -> Result<ConditionId> {
        let id = self.raw()?.any(conditions)?;
        self.registered += 1;
        trace!(condition = %id, children = conditions.len(), "disjunction registered");
        Ok(id)
    }

    /// Compile the registered conditions into an executable query.
    pub fn compile(&mut self) -> Result<E::Query> {
        let engine = self.engine;
        let query = engine.compile(self.raw()?)?;
        debug!(entity = %self.entity, conditions = self.registered, "query compiled");
        Ok(query)
    }

    /// Close the session, reporting a failed release.
    pub fn close(mut self) -> Result<()> {
        match self.raw.take() {
            Some(raw) => {
                debug!(entity = %self.entity, "query builder closed");
                self.engine.close_builder(raw)
            }
            None => Ok(()),
        }
    }
}

impl<E: StorageEngine> Drop for QueryBuilder<'_, E> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Err(err) = self.engine.close_builder(raw) {
                error!(entity = %self.entity, error = %err, "failed to close query builder");
            }
        }
    }
}
