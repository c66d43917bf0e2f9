//! Failure-injection store
//!
//! Decorates [`MemoryStore`] with a scripted failure budget: the next N calls
//! fail with the handle-invalid condition before reaching the inner store.
//! With `heal_on_reconnect` the budget is cleared by `reconnect`, modelling a
//! connection that comes back after being rebuilt; without it the handle
//! stays broken through both recovery steps. Used to exercise the recovery
//! ladder end to end.

use crate::store::error::{StoreError, StoreResult};
use crate::store::interface::{Document, DocumentStore, Filter, UpdateSpec};
use crate::store::memory::MemoryStore;
use std::sync::atomic::{AtomicU64, Ordering};

/// Failure budget meaning "every call fails, forever"
pub const FAIL_ALWAYS: u64 = u64::MAX;

/// Store decorator that fails a scripted number of calls
pub struct FaultyStore {
    inner: MemoryStore,
    failures_left: AtomicU64,
    heal_on_reconnect: bool,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore, heal_on_reconnect: bool) -> Self {
        FaultyStore {
            inner,
            failures_left: AtomicU64::new(0),
            heal_on_reconnect,
        }
    }

    /// Fail the next `calls` store calls; `FAIL_ALWAYS` never decrements
    pub fn fail_next(&self, calls: u64) {
        self.failures_left.store(calls, Ordering::SeqCst);
    }

    /// Remaining scripted failures
    pub fn failures_left(&self) -> u64 {
        self.failures_left.load(Ordering::SeqCst)
    }

    /// The wrapped store, for seeding and assertions
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn maybe_fail(&self) -> StoreResult<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != FAIL_ALWAYS {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(StoreError::HandleInvalid("injected failure".to_string()));
        }
        Ok(())
    }
}

impl DocumentStore for FaultyStore {
    fn reconnect(&self) -> StoreResult<()> {
        if self.heal_on_reconnect {
            self.failures_left.store(0, Ordering::SeqCst);
        }
        self.inner.reconnect()
    }

    fn drop_database(&self, db: &str) -> StoreResult<()> {
        self.maybe_fail()?;
        self.inner.drop_database(db)
    }

    fn create_index(&self, db: &str, collection: &str, field: &str) -> StoreResult<()> {
        self.maybe_fail()?;
        self.inner.create_index(db, collection, field)
    }

    fn min_max(
        &self,
        db: &str,
        collection: &str,
        field: &str,
    ) -> StoreResult<Option<(i64, i64)>> {
        self.maybe_fail()?;
        self.inner.min_max(db, collection, field)
    }

    fn insert_one(&self, db: &str, collection: &str, doc: Document) -> StoreResult<()> {
        self.maybe_fail()?;
        self.inner.insert_one(db, collection, doc)
    }

    fn update_one(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<u64> {
        self.maybe_fail()?;
        self.inner.update_one(db, collection, filter, update)
    }

    fn update_many(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<u64> {
        self.maybe_fail()?;
        self.inner.update_many(db, collection, filter, update)
    }

    fn count(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.maybe_fail()?;
        self.inner.count(db, collection, filter)
    }

    fn find(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.maybe_fail()?;
        self.inner.find(db, collection, filter)
    }

    fn delete_one(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.maybe_fail()?;
        self.inner.delete_one(db, collection, filter)
    }

    fn delete_many(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.maybe_fail()?;
        self.inner.delete_many(db, collection, filter)
    }
}
