// ============================================================================
// Tests
// ============================================================================

use super::*;
use crate::store::{Document, FaultyStore, Filter, MemoryStore, FAIL_ALWAYS};
use crate::types::{OperationMode, RunOutcome, ID};
use std::time::{Duration, Instant};

const DB: &str = "test";
const COLL: &str = "perf";

fn config(
    modes: Vec<OperationMode>,
    op_budgets: Vec<u64>,
    thread_counts: Vec<usize>,
    max_duration: Duration,
) -> RunConfig {
    RunConfig {
        modes,
        op_budgets,
        thread_counts,
        max_duration,
        database: DB.to_string(),
        collection: COLL.to_string(),
        drop_db: false,
        random_text_len: 0,
        csv_dir: None,
        seed: 0,
    }
}

fn seed_docs(store: &MemoryStore, count: i64) {
    for id in 1..=count {
        store
            .insert_one(
                DB,
                COLL,
                Document {
                    id,
                    thread_id: 1,
                    thread_run_count: 1,
                    rnd: 0,
                    version: 1,
                    random_text: None,
                },
            )
            .unwrap();
    }
}

#[test]
fn test_single_insert_round_grows_collection_exactly() {
    // one mode INSERT, budget 100, 4 threads: the collection grows by exactly
    // 100 documents and the affected total matches
    let store = Arc::new(MemoryStore::new());
    let coordinator = RoundCoordinator::new(store.clone(), Arc::new(Reporter::disabled()));
    let reports = coordinator
        .run(&config(
            vec![OperationMode::Insert],
            vec![100],
            vec![4],
            Duration::from_secs(60),
        ))
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, RunOutcome::Completed);
    assert_eq!(reports[0].operations, 100);
    assert_eq!(reports[0].affected_documents, 100);
    assert_eq!(store.collection_size(DB, COLL), 100);
}

#[test]
fn test_two_modes_share_a_round_under_a_duration_cap() {
    // UPDATE_ONE and COUNT_ONE with budget 0 and a 2 second cap: both stop
    // within the drain tolerance and report valid metrics
    let store = Arc::new(MemoryStore::new());
    seed_docs(&store, 10);
    let coordinator = RoundCoordinator::new(store, Arc::new(Reporter::disabled()));

    let begin = Instant::now();
    let reports = coordinator
        .run(&config(
            vec![OperationMode::UpdateOne, OperationMode::CountOne],
            vec![0, 0],
            vec![2, 2],
            Duration::from_secs(2),
        ))
        .unwrap();
    let elapsed = begin.elapsed();

    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(10), "drain took {:?}", elapsed);
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.outcome, RunOutcome::TimedOut);
        assert!(report.cumulative.count >= 1);
        assert!(report.cumulative.mean_rate >= 0.0);
    }
}

#[test]
fn test_rounds_run_sequentially() {
    // two INSERT rounds of 50: the second round re-probes max(_id) after the
    // first has fully drained, so all 100 keys are distinct and land
    let store = Arc::new(MemoryStore::new());
    let coordinator = RoundCoordinator::new(store.clone(), Arc::new(Reporter::disabled()));
    let reports = coordinator
        .run(&config(
            vec![OperationMode::Insert],
            vec![50],
            vec![2, 2],
            Duration::from_secs(60),
        ))
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(store.collection_size(DB, COLL), 100);
    let total: u64 = reports.iter().map(|r| r.affected_documents).sum();
    assert_eq!(total, 100);
    // keys are contiguous across rounds
    for id in 1..=100 {
        assert_eq!(store.count(DB, COLL, &Filter::eq(ID, id)).unwrap(), 1);
    }
}

#[test]
fn test_partial_final_round() {
    // three thread counts over two modes: the trailing group forms a smaller
    // final round with just the first mode
    let store = Arc::new(MemoryStore::new());
    seed_docs(&store, 5);
    let coordinator = RoundCoordinator::new(store, Arc::new(Reporter::disabled()));
    let reports = coordinator
        .run(&config(
            vec![OperationMode::CountOne, OperationMode::CountMany],
            vec![10, 10],
            vec![1, 1, 1],
            Duration::from_secs(60),
        ))
        .unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].spec.mode, OperationMode::CountOne);
    assert_eq!(reports[1].spec.mode, OperationMode::CountMany);
    assert_eq!(reports[2].spec.mode, OperationMode::CountOne);
}

#[test]
fn test_setup_failure_aborts_the_run() {
    let store = Arc::new(FaultyStore::new(MemoryStore::new(), false));
    store.fail_next(FAIL_ALWAYS);
    let coordinator = RoundCoordinator::new(store, Arc::new(Reporter::disabled()));

    let err = coordinator
        .run(&config(
            vec![OperationMode::CountOne],
            vec![0],
            vec![1, 1],
            Duration::from_secs(60),
        ))
        .unwrap_err();
    assert!(matches!(err, DocbenchError::Store(_)));
    assert!(coordinator.abort_flag().load(Ordering::SeqCst));
}

#[test]
fn test_unrecoverable_worker_cuts_the_whole_run_short() {
    // the handle dies mid-run and never heals: the first worker through the
    // recovery ladder fails the run, long before the configured duration
    let store = Arc::new(FaultyStore::new(MemoryStore::new(), false));
    seed_docs(store.inner(), 5);
    let coordinator = RoundCoordinator::new(store.clone(), Arc::new(Reporter::disabled()));

    let saboteur = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            store.fail_next(FAIL_ALWAYS);
        })
    };

    let begin = Instant::now();
    let err = coordinator
        .run(&config(
            vec![OperationMode::CountOne],
            vec![0],
            vec![2],
            Duration::from_secs(60),
        ))
        .unwrap_err();
    saboteur.join().unwrap();

    assert!(matches!(err, DocbenchError::UnrecoverableStore(_)));
    assert!(begin.elapsed() < Duration::from_secs(10));
}
