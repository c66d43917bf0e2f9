//! Store interface definitions

use crate::store::error::StoreResult;
use crate::types::{ID, RANDOM_LONG, THREAD_ID, THREAD_RUN_COUNT, VERSION};
use serde::Serialize;

/// A single document as stored in a collection.
///
/// The field set mirrors what the INSERT mode writes: a unique key, the
/// inserting worker's id and local run count, a random i64, a version counter
/// and an optional random text payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(rename = "threadId")]
    pub thread_id: i64,
    #[serde(rename = "threadRunCount")]
    pub thread_run_count: i64,
    #[serde(rename = "rnd")]
    pub rnd: i64,
    #[serde(rename = "v")]
    pub version: i64,
    #[serde(rename = "randomText", skip_serializing_if = "Option::is_none")]
    pub random_text: Option<String>,
}

impl Document {
    /// Read a numeric field by its wire name
    pub fn get(&self, field: &str) -> Option<i64> {
        match field {
            ID => Some(self.id),
            THREAD_ID => Some(self.thread_id),
            THREAD_RUN_COUNT => Some(self.thread_run_count),
            RANDOM_LONG => Some(self.rnd),
            VERSION => Some(self.version),
            _ => None,
        }
    }

    /// Write a numeric field by its wire name; false if the field is unknown
    pub fn set(&mut self, field: &str, value: i64) -> bool {
        match field {
            ID => self.id = value,
            THREAD_ID => self.thread_id = value,
            THREAD_RUN_COUNT => self.thread_run_count = value,
            RANDOM_LONG => self.rnd = value,
            VERSION => self.version = value,
            _ => return false,
        }
        true
    }
}

/// Equality filter on a single numeric field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub value: i64,
}

impl Filter {
    pub fn eq(field: &str, value: i64) -> Self {
        Filter {
            field: field.to_string(),
            value,
        }
    }
}

/// Field-wise update: `$set`-style assignments followed by `$inc`-style
/// increments, applied in that order.
#[derive(Debug, Clone, Default)]
pub struct UpdateSpec {
    pub sets: Vec<(String, i64)>,
    pub incs: Vec<(String, i64)>,
}

impl UpdateSpec {
    pub fn new() -> Self {
        UpdateSpec::default()
    }

    pub fn set(mut self, field: &str, value: i64) -> Self {
        self.sets.push((field.to_string(), value));
        self
    }

    pub fn inc(mut self, field: &str, delta: i64) -> Self {
        self.incs.push((field.to_string(), delta));
        self
    }
}

/// Store client trait
///
/// This trait is the boundary to the data store under test. All methods take
/// `&self` and must be safe to call concurrently from many worker threads
/// sharing one client. Implementations signal an unusable connection with
/// `StoreError::HandleInvalid`, distinct from every other failure; the only
/// mutating access to connection state is `reconnect`, which callers serialize.
pub trait DocumentStore: Send + Sync {
    /// Tear down and re-establish the underlying connection
    fn reconnect(&self) -> StoreResult<()>;

    /// Drop a database and everything in it
    fn drop_database(&self, db: &str) -> StoreResult<()>;

    /// Build an index on `field` (foreground; returns once built)
    fn create_index(&self, db: &str, collection: &str, field: &str) -> StoreResult<()>;

    /// Smallest and largest value of `field` over the collection, or `None`
    /// if the collection is empty or absent
    fn min_max(&self, db: &str, collection: &str, field: &str)
        -> StoreResult<Option<(i64, i64)>>;

    /// Insert a single document
    fn insert_one(&self, db: &str, collection: &str, doc: Document) -> StoreResult<()>;

    /// Update the first document matching `filter`; returns modified count
    fn update_one(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<u64>;

    /// Update all documents matching `filter`; returns modified count
    fn update_many(
        &self,
        db: &str,
        collection: &str,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> StoreResult<u64>;

    /// Count documents matching `filter`
    fn count(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Fetch all documents matching `filter`
    fn find(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Delete the first document matching `filter`; returns deleted count
    fn delete_one(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Delete all documents matching `filter`; returns deleted count
    fn delete_many(&self, db: &str, collection: &str, filter: &Filter) -> StoreResult<u64>;
}
