//! Operation dispatch
//!
//! An [`Operation`] is the unit of work a mode-run executes in a loop: pick a
//! target value, issue one store call, report how many documents it affected.
//! The kind is fixed per mode-run and dispatched by a single match, so no
//! per-call resolution happens on the hot path.
//!
//! Error containment lives here too: any ordinary store failure is logged and
//! counted as affecting nothing, while the distinguished handle-invalid
//! condition triggers a bounded two-step recovery (rebuild collection
//! metadata and retry once, then reconnect, rebuild and retry once more).
//! Exhausting both steps is fatal to the run. Recovery is serialized across
//! the workers sharing this operation.

use crate::store::{Document, DocumentStore, Filter, StoreResult, UpdateSpec};
use crate::types::{
    DocbenchError, DocbenchResult, OperationMode, RANDOM_LONG, VERSION,
};
use parking_lot::{Mutex, RwLock};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Min/max of the queried field, observed at mode-run start and refreshed
/// only by the recovery path
#[derive(Debug, Clone, Copy, Default)]
struct CollectionInfo {
    min: i64,
    max: i64,
}

/// One mode-run's unit of work, shared by all of its workers
pub struct Operation {
    mode: OperationMode,
    store: Arc<dyn DocumentStore>,
    db: String,
    collection: String,
    queried_field: &'static str,
    /// Size of the random text payload on inserted documents; 0 = absent
    random_text_len: usize,
    info: RwLock<CollectionInfo>,
    /// Serializes the recovery sequence across workers
    recovery: Mutex<()>,
    affected: AtomicU64,
}

impl Operation {
    /// Build the operation for one mode-run: index the queried field and
    /// probe its min/max before any worker starts.
    pub fn new(
        mode: OperationMode,
        store: Arc<dyn DocumentStore>,
        db: &str,
        collection: &str,
        random_text_len: usize,
    ) -> DocbenchResult<Self> {
        let operation = Operation {
            mode,
            store,
            db: db.to_string(),
            collection: collection.to_string(),
            queried_field: mode.queried_field(),
            random_text_len,
            info: RwLock::new(CollectionInfo::default()),
            recovery: Mutex::new(()),
            affected: AtomicU64::new(0),
        };
        operation.init_collection_info()?;
        Ok(operation)
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Total documents affected by this mode-run so far. Monotonic.
    pub fn affected_documents(&self) -> u64 {
        self.affected.load(Ordering::Relaxed)
    }

    /// Index the queried field (foreground) and cache its value range.
    /// Also run by the recovery path to refresh stale metadata.
    fn init_collection_info(&self) -> StoreResult<()> {
        self.store
            .create_index(&self.db, &self.collection, self.queried_field)?;
        let bounds = self
            .store
            .min_max(&self.db, &self.collection, self.queried_field)?;
        let (min, max) = bounds.unwrap_or((0, 0));
        *self.info.write() = CollectionInfo { min, max };
        Ok(())
    }

    /// Execute one operation.
    ///
    /// `local_count` is this worker's own invocation count, `global_count`
    /// the mode-run-wide ordinal; both start at 1. Ordinary store failures
    /// are contained here and count as zero affected documents; only an
    /// exhausted recovery sequence surfaces as an error.
    pub fn execute(
        &self,
        worker_id: usize,
        local_count: u64,
        global_count: u64,
        rng: &mut StdRng,
    ) -> DocbenchResult<()> {
        let info = *self.info.read();
        let selector = rng.gen_range(info.min..=info.max);
        let random_long = rng.r#gen::<i64>();
        debug!(
            "threadId: {} threadRunCount: {} globalRunCount: {} selector: {} rnd: {}",
            worker_id, local_count, global_count, selector, random_long
        );

        match self.execute_query(worker_id, local_count, global_count, selector, random_long, rng)
        {
            Ok(n) => {
                self.affected.fetch_add(n, Ordering::Relaxed);
                Ok(())
            }
            Err(err) if err.is_handle_invalid() => {
                let n = self.recover(
                    worker_id,
                    local_count,
                    global_count,
                    selector,
                    random_long,
                    rng,
                )?;
                self.affected.fetch_add(n, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                error!(
                    "error while executing query on field '{}' with value '{}': {}",
                    self.queried_field, selector, err
                );
                Ok(())
            }
        }
    }

    /// Bounded recovery after a handle-invalid failure. At most one worker
    /// runs this at a time; the rest queue on the mutex and usually find the
    /// handle healthy again on their own first retry.
    fn recover(
        &self,
        worker_id: usize,
        local_count: u64,
        global_count: u64,
        selector: i64,
        random_long: i64,
        rng: &mut StdRng,
    ) -> DocbenchResult<u64> {
        let _guard = self.recovery.lock();

        // step 1: refresh collection metadata on the existing connection
        error!(
            "store handle invalid on '{}', rebuilding collection metadata and retrying",
            self.collection
        );
        match self.init_collection_info().and_then(|_| {
            self.execute_query(worker_id, local_count, global_count, selector, random_long, rng)
        }) {
            Ok(n) => return Ok(n),
            Err(err) if err.is_handle_invalid() => {
                error!(
                    "store handle still invalid after metadata rebuild, reconnecting: {}",
                    err
                );
            }
            Err(err) => {
                error!(
                    "error while executing query on field '{}' with value '{}': {}",
                    self.queried_field, selector, err
                );
                return Ok(0);
            }
        }

        // step 2: full reconnect, refresh, one final retry
        match self
            .store
            .reconnect()
            .and_then(|_| self.init_collection_info())
            .and_then(|_| {
                self.execute_query(
                    worker_id,
                    local_count,
                    global_count,
                    selector,
                    random_long,
                    rng,
                )
            }) {
            Ok(n) => Ok(n),
            Err(err) => Err(DocbenchError::UnrecoverableStore(format!(
                "store handle unusable after reconnect, giving up (field '{}', value {}): {}",
                self.queried_field, selector, err
            ))),
        }
    }

    /// The single store call of this operation kind; returns the number of
    /// affected documents.
    fn execute_query(
        &self,
        worker_id: usize,
        local_count: u64,
        global_count: u64,
        selector: i64,
        random_long: i64,
        rng: &mut StdRng,
    ) -> StoreResult<u64> {
        let filter = Filter::eq(self.queried_field, selector);
        match self.mode {
            OperationMode::Insert => {
                let max_at_start = self.info.read().max;
                let random_text = if self.random_text_len > 0 {
                    Some(
                        (0..self.random_text_len)
                            .map(|_| char::from(rng.sample(Alphanumeric)))
                            .collect(),
                    )
                } else {
                    None
                };
                let doc = Document {
                    id: max_at_start + global_count as i64,
                    thread_id: worker_id as i64,
                    thread_run_count: local_count as i64,
                    rnd: random_long,
                    version: 1,
                    random_text,
                };
                self.store.insert_one(&self.db, &self.collection, doc)?;
                Ok(1)
            }
            OperationMode::UpdateOne | OperationMode::UpdateMany => {
                let update = UpdateSpec::new()
                    .set(RANDOM_LONG, random_long)
                    .inc(VERSION, 1);
                if self.mode == OperationMode::UpdateMany {
                    self.store
                        .update_many(&self.db, &self.collection, &filter, &update)
                } else {
                    self.store
                        .update_one(&self.db, &self.collection, &filter, &update)
                }
            }
            OperationMode::CountOne | OperationMode::CountMany => {
                self.store.count(&self.db, &self.collection, &filter)
            }
            OperationMode::FindOne | OperationMode::FindMany => {
                let docs = self.store.find(&self.db, &self.collection, &filter)?;
                for doc in &docs {
                    if let Ok(json) = serde_json::to_string(doc) {
                        debug!("Document {}", json);
                    }
                }
                Ok(docs.len() as u64)
            }
            OperationMode::DeleteOne => {
                self.store.delete_one(&self.db, &self.collection, &filter)
            }
            OperationMode::DeleteMany => {
                self.store.delete_many(&self.db, &self.collection, &filter)
            }
            OperationMode::Wait => {
                // throttling aid: sleep instead of touching the store
                std::thread::sleep(Duration::from_millis(selector.max(0) as u64));
                Ok(0)
            }
        }
    }
}
