// ============================================================================
// Tests
// ============================================================================

use super::*;
use crate::store::{FaultyStore, MemoryStore, FAIL_ALWAYS};
use crate::types::{ID, THREAD_RUN_COUNT};
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::thread;

const DB: &str = "test";
const COLL: &str = "perf";

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

fn doc(id: i64, thread_run_count: i64) -> Document {
    Document {
        id,
        thread_id: 1,
        thread_run_count,
        rnd: 0,
        version: 1,
        random_text: None,
    }
}

#[test]
fn test_insert_writes_expected_document() {
    let store = Arc::new(MemoryStore::new());
    let op = Operation::new(OperationMode::Insert, store.clone(), DB, COLL, 0).unwrap();

    op.execute(3, 1, 1, &mut rng()).unwrap();

    let found = store.find(DB, COLL, &Filter::eq(ID, 1)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].thread_id, 3);
    assert_eq!(found[0].thread_run_count, 1);
    assert_eq!(found[0].version, 1);
    assert!(found[0].random_text.is_none());
    assert_eq!(op.affected_documents(), 1);
}

#[test]
fn test_insert_random_text_payload() {
    let store = Arc::new(MemoryStore::new());
    let op = Operation::new(OperationMode::Insert, store.clone(), DB, COLL, 64).unwrap();

    op.execute(1, 1, 1, &mut rng()).unwrap();

    let found = store.find(DB, COLL, &Filter::eq(ID, 1)).unwrap();
    assert_eq!(found[0].random_text.as_ref().unwrap().len(), 64);
}

#[test]
fn test_insert_keys_start_above_existing_max() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=10 {
        store.insert_one(DB, COLL, doc(id, 1)).unwrap();
    }
    let op = Operation::new(OperationMode::Insert, store.clone(), DB, COLL, 0).unwrap();

    op.execute(1, 1, 1, &mut rng()).unwrap();
    op.execute(1, 2, 2, &mut rng()).unwrap();

    assert_eq!(store.count(DB, COLL, &Filter::eq(ID, 11)).unwrap(), 1);
    assert_eq!(store.count(DB, COLL, &Filter::eq(ID, 12)).unwrap(), 1);
}

#[test]
fn test_insert_keys_unique_across_concurrent_workers() {
    let store = Arc::new(MemoryStore::new());
    let op =
        Arc::new(Operation::new(OperationMode::Insert, store.clone(), DB, COLL, 0).unwrap());
    let counter = Arc::new(AtomicU64::new(0));
    let per_worker = 200u64;

    let handles: Vec<_> = (1..=4usize)
        .map(|worker_id| {
            let op = Arc::clone(&op);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker_id as u64);
                for local in 1..=per_worker {
                    let global = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    op.execute(worker_id, local, global, &mut rng).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // every derived key landed, none collided
    assert_eq!(store.collection_size(DB, COLL), 4 * per_worker);
    let mut seen = HashSet::new();
    for global in 1..=4 * per_worker {
        assert!(seen.insert(global as i64));
        assert_eq!(
            store.count(DB, COLL, &Filter::eq(ID, global as i64)).unwrap(),
            1
        );
    }
    assert_eq!(op.affected_documents(), 4 * per_worker);
}

#[test]
fn test_update_one_touches_single_document() {
    let store = Arc::new(MemoryStore::new());
    store.insert_one(DB, COLL, doc(5, 1)).unwrap();
    let op = Operation::new(OperationMode::UpdateOne, store.clone(), DB, COLL, 0).unwrap();

    // collection holds a single key, so the random selector always hits it
    op.execute(1, 1, 1, &mut rng()).unwrap();

    let found = store.find(DB, COLL, &Filter::eq(ID, 5)).unwrap();
    assert_eq!(found[0].version, 2);
    assert_eq!(op.affected_documents(), 1);
}

#[test]
fn test_update_many_counts_all_matches() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=3 {
        store.insert_one(DB, COLL, doc(id, 7)).unwrap();
    }
    let op = Operation::new(OperationMode::UpdateMany, store.clone(), DB, COLL, 0).unwrap();

    op.execute(1, 1, 1, &mut rng()).unwrap();

    assert_eq!(op.affected_documents(), 3);
    let found = store
        .find(DB, COLL, &Filter::eq(THREAD_RUN_COUNT, 7))
        .unwrap();
    assert!(found.iter().all(|d| d.version == 2));
}

#[test]
fn test_count_and_find_report_matches() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=4 {
        store.insert_one(DB, COLL, doc(id, 9)).unwrap();
    }

    let count_op =
        Operation::new(OperationMode::CountMany, store.clone(), DB, COLL, 0).unwrap();
    count_op.execute(1, 1, 1, &mut rng()).unwrap();
    assert_eq!(count_op.affected_documents(), 4);

    let find_op = Operation::new(OperationMode::FindMany, store.clone(), DB, COLL, 0).unwrap();
    find_op.execute(1, 1, 1, &mut rng()).unwrap();
    assert_eq!(find_op.affected_documents(), 4);
}

#[test]
fn test_delete_one_removes_single_document() {
    let store = Arc::new(MemoryStore::new());
    store.insert_one(DB, COLL, doc(5, 1)).unwrap();
    let op = Operation::new(OperationMode::DeleteOne, store.clone(), DB, COLL, 0).unwrap();

    op.execute(1, 1, 1, &mut rng()).unwrap();

    assert_eq!(store.collection_size(DB, COLL), 0);
    assert_eq!(op.affected_documents(), 1);
}

#[test]
fn test_wait_touches_nothing() {
    let store = Arc::new(MemoryStore::new());
    let op = Operation::new(OperationMode::Wait, store.clone(), DB, COLL, 0).unwrap();

    op.execute(1, 1, 1, &mut rng()).unwrap();

    assert_eq!(op.affected_documents(), 0);
    assert_eq!(store.collection_size(DB, COLL), 0);
}

#[test]
fn test_transient_error_is_swallowed() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=10 {
        store.insert_one(DB, COLL, doc(id, 1)).unwrap();
    }
    let op = Operation::new(OperationMode::Insert, store.clone(), DB, COLL, 0).unwrap();

    // the key the first insert will derive already exists
    store.insert_one(DB, COLL, doc(11, 1)).unwrap();

    // duplicate key is an ordinary failure: logged, zero affected, no error
    op.execute(1, 1, 1, &mut rng()).unwrap();
    assert_eq!(op.affected_documents(), 0);
}

#[test]
fn test_recovery_step_one_restores_operation() {
    // handle-invalid on the first call of a worker: metadata re-derivation on
    // the existing connection is enough, the operation ultimately succeeds
    let store = Arc::new(FaultyStore::new(MemoryStore::new(), true));
    store.inner().insert_one(DB, COLL, doc(5, 1)).unwrap();
    let op = Operation::new(OperationMode::CountOne, store.clone(), DB, COLL, 0).unwrap();

    store.fail_next(1);
    op.execute(1, 1, 1, &mut rng()).unwrap();

    assert_eq!(op.affected_documents(), 1);
    assert_eq!(store.failures_left(), 0);
}

#[test]
fn test_recovery_reconnect_restores_operation() {
    // metadata re-derivation still fails, the full reconnect heals the handle
    let store = Arc::new(FaultyStore::new(MemoryStore::new(), true));
    store.inner().insert_one(DB, COLL, doc(5, 1)).unwrap();
    let op = Operation::new(OperationMode::CountOne, store.clone(), DB, COLL, 0).unwrap();

    store.fail_next(FAIL_ALWAYS);
    op.execute(1, 1, 1, &mut rng()).unwrap();

    assert_eq!(op.affected_documents(), 1);
}

#[test]
fn test_exhausted_recovery_is_fatal() {
    // the handle stays broken through both recovery steps
    let store = Arc::new(FaultyStore::new(MemoryStore::new(), false));
    store.inner().insert_one(DB, COLL, doc(5, 1)).unwrap();
    let op = Operation::new(OperationMode::CountOne, store.clone(), DB, COLL, 0).unwrap();

    store.fail_next(FAIL_ALWAYS);
    let err = op.execute(1, 1, 1, &mut rng()).unwrap_err();
    assert!(matches!(err, DocbenchError::UnrecoverableStore(_)));
    assert_eq!(op.affected_documents(), 0);
}
