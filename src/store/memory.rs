//! In-process document store
//!
//! A thread-safe, in-memory implementation of [`DocumentStore`] used by the
//! binary as the default target and by the test suite. Collections live in a
//! `RwLock`-protected map keyed by database and collection name. Connection
//! health is simulated: `invalidate` makes every call fail with the
//! handle-invalid condition until `reconnect` restores it, which is exactly
//! the contract the recovery path is written against.

use crate::store::error::{StoreError, StoreResult};
use crate::store::interface::{Document, DocumentStore, Filter, UpdateSpec};
use crate::types::ID;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Collection {
    docs: BTreeMap<i64, Document>,
    indexes: HashSet<String>,
}

impl Collection {
    fn matching_ids(&self, filter: &Filter) -> Vec<i64> {
        if filter.field == ID {
            // primary key lookup, no scan
            return if self.docs.contains_key(&filter.value) {
                vec![filter.value]
            } else {
                Vec::new()
            };
        }
        self.docs
            .values()
            .filter(|doc| doc.get(&filter.field) == Some(filter.value))
            .map(|doc| doc.id)
            .collect()
    }
}

/// In-memory document store with simulated connection health
pub struct MemoryStore {
    databases: RwLock<HashMap<String, HashMap<String, Collection>>>,
    healthy: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            databases: RwLock::new(HashMap::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Simulate a dead connection: every subsequent call fails with
    /// `HandleInvalid` until `reconnect` is called.
    pub fn invalidate(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }

    /// Number of documents in a collection (0 if absent). Bypasses the
    /// health check; meant for run analysis and tests.
    pub fn collection_size(&self, db: &str, collection: &str) -> u64 {
        self.databases
            .read()
            .get(db)
            .and_then(|d| d.get(collection))
            .map(|c| c.docs.len() as u64)
            .unwrap_or(0)
    }

    fn check_handle(&self) -> StoreResult<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::HandleInvalid("connection closed".to_string()))
        }
    }

    fn apply_update(doc: &mut Document, update: &UpdateSpec) -> StoreResult<()> {
        for (field, value) in &update.sets {
            if !doc.set(field, *value) {
                return Err(StoreError::UnknownField(field.clone()));
            }
        }
        for (field, delta) in &update.incs {
            let current = doc
                .get(field)
                .ok_or_else(|| StoreError::UnknownField(field.clone()))?;
            doc.set(field, current.wrapping_add(*delta));
        }
        Ok(())
    }

    fn update_matching(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        update: &UpdateSpec,
        many: bool,
    ) -> StoreResult<u64> {
        self.check_handle()?;
        let mut databases = self.databases.write();
        let Some(coll) = databases.get_mut(db).and_then(|d| d.get_mut(collection)) else {
            return Ok(0);
        };
        let mut ids = coll.matching_ids(filter);
        if !many {
            ids.truncate(1);
        }
        let mut modified = 0;
        for id in ids {
            if let Some(doc) = coll.docs.get_mut(&id) {
                Self::apply_update(doc, update)?;
                modified += 1;
            }
        }
        Ok(modified)
    }

    fn delete_matching(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        many: bool,
    ) -> StoreResult<u64> {
        self.check_handle()?;
        let mut databases = self.databases.write();
        let Some(coll) = databases.get_mut(db).and_then(|d| d.get_mut(collection)) else {
            return Ok(0);
        };
        let mut ids = coll.matching_ids(filter);
        if !many {
            ids.truncate(1);
        }
        let mut deleted = 0;
        for id in ids {
            if coll.docs.remove(&id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl DocumentStore for MemoryStore {
    fn reconnect(&self) -> StoreResult<()> {
        self.healthy.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn drop_database(&self, db: &str) -> StoreResult<()> {
        self.check_handle()?;
        self.databases.write().remove(db);
        Ok(())
    }

    fn create_index(&self, db: &str, collection: &str, field: &str) -> StoreResult<()> {
        self.check_handle()?;
        let mut databases = self.databases.write();
        // creating an index implicitly creates the collection
        let coll = databases
            .entry(db.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        coll.indexes.insert(field.to_string());
        Ok(())
    }

    fn min_max(
        &self,
        db: &str,
        collection: &str,
        field: &str,
    ) -> StoreResult<Option<(i64, i64)>> {
        self.check_handle()?;
        let databases = self.databases.read();
        let Some(coll) = databases.get(db).and_then(|d| d.get(collection)) else {
            return Ok(None);
        };
        if field == ID {
            let min = coll.docs.keys().next().copied();
            let max = coll.docs.keys().next_back().copied();
            return Ok(min.zip(max));
        }
        let mut bounds: Option<(i64, i64)> = None;
        for doc in coll.docs.values() {
            if let Some(value) = doc.get(field) {
                bounds = Some(match bounds {
                    Some((min, max)) => (min.min(value), max.max(value)),
                    None => (value, value),
                });
            }
        }
        Ok(bounds)
    }

    fn insert_one(&self, db: &str, collection: &str, doc: Document) -> StoreResult<()> {
        self.check_handle()?;
        let mut databases = self.databases.write();
        let coll = databases
            .entry(db.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        if coll.docs.contains_key(&doc.id) {
            return Err(StoreError::DuplicateKey(doc.id));
        }
        coll.docs.insert(doc.id, doc);
        Ok(())
    }

    fn update_one(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<u64> {
        self.update_matching(db, collection, filter, update, false)
    }

    fn update_many(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<u64> {
        self.update_matching(db, collection, filter, update, true)
    }

    fn count(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.check_handle()?;
        let databases = self.databases.read();
        let Some(coll) = databases.get(db).and_then(|d| d.get(collection)) else {
            return Ok(0);
        };
        Ok(coll.matching_ids(filter).len() as u64)
    }

    fn find(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.check_handle()?;
        let databases = self.databases.read();
        let Some(coll) = databases.get(db).and_then(|d| d.get(collection)) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .matching_ids(filter)
            .into_iter()
            .filter_map(|id| coll.docs.get(&id).cloned())
            .collect())
    }

    fn delete_one(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.delete_matching(db, collection, filter, false)
    }

    fn delete_many(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.delete_matching(db, collection, filter, true)
    }
}
