//! Mode-run executor
//!
//! A [`WorkerPool`] runs one mode-run: `threads` workers repeatedly executing
//! one [`Operation`] until the termination condition fires. All workers are
//! released together through a start barrier so rate and percentile numbers
//! are not skewed by staggered startup. The mode-run's global operation
//! ordinal is claimed with a bounded atomic update, so for a budget of K
//! exactly K ordinals are handed out, gap-free, across all workers.
//!
//! A worker stops when the operation budget is exhausted, when the pool's own
//! wall-clock budget elapses, when the round latch opens because the
//! coordinator decided the round is over, or when a fatal error aborted the
//! whole run. After the pool observes its termination condition it signals
//! the round latch once, then drains: every worker must actually exit before
//! the pool reports and releases anything, since in-flight operations may
//! still be using the shared store handle.

use crate::infrastructure::gate::CountdownGate;
use crate::metrics::{CumulativeSnapshot, MetricsWindow};
use crate::ops::Operation;
use crate::report::Reporter;
use crate::types::{DocbenchError, DocbenchResult, RunModeSpec, RunOutcome};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Spreads per-worker seeds across the 64-bit space
const SEED_STRIDE: u64 = 0x9e3779b97f4a7c15;

fn dbg_log(msg: &str) {
    use std::io::Write;
    if let Ok(mut f) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("/tmp/exec_dbg.log")
    {
        let _ = writeln!(f, "{}", msg);
        let _ = f.flush();
    }
}

/// What one completed mode-run looked like
#[derive(Debug)]
pub struct ModeRunReport {
    pub spec: RunModeSpec,
    pub outcome: RunOutcome,
    pub duration: Duration,
    /// Final value of the global operation counter
    pub operations: u64,
    /// Invocation count of each worker, by worker index
    pub per_worker_operations: Vec<u64>,
    pub affected_documents: u64,
    pub cumulative: CumulativeSnapshot,
}

/// Counts an end gate down when dropped, so a worker that exits on any path
/// (including a fatal error) is always accounted for in the drain.
struct CountdownOnDrop(Arc<CountdownGate>);

impl Drop for CountdownOnDrop {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

/// Executes one mode-run
pub struct WorkerPool {
    spec: RunModeSpec,
    operation: Arc<Operation>,
    metrics: Arc<MetricsWindow>,
    round_gate: Arc<CountdownGate>,
    abort: Arc<AtomicBool>,
    seed: u64,
}

impl WorkerPool {
    pub fn new(
        spec: RunModeSpec,
        operation: Arc<Operation>,
        round_gate: Arc<CountdownGate>,
        abort: Arc<AtomicBool>,
        seed: u64,
    ) -> Self {
        WorkerPool {
            spec,
            operation,
            metrics: Arc::new(MetricsWindow::new()),
            round_gate,
            abort,
            seed,
        }
    }

    /// Run the pool to completion: spawn workers, release them together,
    /// enforce the wall-clock cap, signal the round latch, drain, report.
    pub fn run(&self, reporter: &Reporter) -> DocbenchResult<ModeRunReport> {
        info!(
            ">>> {} mode-run: {} threads, operation budget {}, max duration {}s",
            self.spec.mode,
            self.spec.threads,
            self.spec.op_budget,
            self.spec.max_duration.as_secs()
        );

        let rolling = reporter.start_rolling(self.spec.mode, Arc::clone(&self.metrics));

        let counter = Arc::new(AtomicU64::new(0));
        let start_barrier = Arc::new(Barrier::new(self.spec.threads + 1));
        let end_gate = Arc::new(CountdownGate::new(self.spec.threads as u64));
        let stop = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(self.spec.threads);
        for worker_id in 1..=self.spec.threads {
            dbg_log(&format!("spawning worker {}", worker_id));
            let operation = Arc::clone(&self.operation);
            let metrics = Arc::clone(&self.metrics);
            let counter = Arc::clone(&counter);
            let start_barrier = Arc::clone(&start_barrier);
            let end_gate = Arc::clone(&end_gate);
            let stop = Arc::clone(&stop);
            let abort = Arc::clone(&self.abort);
            let round_gate = Arc::clone(&self.round_gate);
            let budget = self.spec.op_budget;
            let seed = self.seed.wrapping_add(worker_id as u64 * SEED_STRIDE);

            let handle = thread::Builder::new()
                .name(format!("{}-w{}", self.spec.mode, worker_id))
                .spawn(move || {
                    let _done = CountdownOnDrop(end_gate);
                    let mut rng = StdRng::seed_from_u64(seed);
                    dbg_log(&format!("worker {} pre-barrier", worker_id));
                    start_barrier.wait();
                    dbg_log(&format!("worker {} post-barrier", worker_id));

                    let mut local = 0u64;
                    loop {
                        if stop.load(Ordering::SeqCst)
                            || abort.load(Ordering::SeqCst)
                            || round_gate.is_open()
                        {
                            break;
                        }
                        // claim the next ordinal, or stop if the budget is spent
                        let claimed = counter.fetch_update(
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                            |count| {
                                if budget > 0 && count >= budget {
                                    None
                                } else {
                                    Some(count + 1)
                                }
                            },
                        );
                        let Ok(previous) = claimed else {
                            break;
                        };
                        local += 1;

                        let begin = Instant::now();
                        let outcome =
                            operation.execute(worker_id, local, previous + 1, &mut rng);
                        metrics.record(begin.elapsed());

                        if let Err(err) = outcome {
                            abort.store(true, Ordering::SeqCst);
                            return Err(err);
                        }
                    }
                    dbg_log(&format!("worker {} exiting local={}", worker_id, local));
                    Ok(local)
                })?;
            handles.push(handle);
            dbg_log(&format!("pushed worker handle, len={}", handles.len()));
        }

        dbg_log(&format!("all workers spawned, pool pre-barrier threads={}", self.spec.threads));
        start_barrier.wait();
        dbg_log("pool post-barrier, waiting end_gate");
        let started = Instant::now();

        let in_time = end_gate.wait_for(self.spec.max_duration);
        dbg_log(&format!("pool end_gate done in_time={}", in_time));
        // hard cap: no new iterations after this point
        stop.store(true, Ordering::SeqCst);
        let duration = started.elapsed();
        let outcome = if in_time {
            RunOutcome::Completed
        } else {
            RunOutcome::TimedOut
        };
        info!(
            "{} done ({}) in {} ms",
            self.spec.mode,
            outcome,
            duration.as_millis()
        );

        self.round_gate.count_down();
        // workers may still be mid-operation on the shared handle; wait for
        // every one of them to actually exit before reporting and releasing
        end_gate.wait();
        rolling.stop();

        let mut per_worker_operations = Vec::with_capacity(self.spec.threads);
        let mut fatal: Option<DocbenchError> = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(local)) => per_worker_operations.push(local),
                Ok(Err(err)) => {
                    error!("{} worker failed fatally: {}", self.spec.mode, err);
                    fatal.get_or_insert(err);
                }
                Err(_) => {
                    fatal.get_or_insert(DocbenchError::Interrupted(format!(
                        "{} worker thread panicked",
                        self.spec.mode
                    )));
                }
            }
        }

        let cumulative = self.metrics.cumulative_snapshot();
        let affected_documents = self.operation.affected_documents();
        reporter.report_cumulative(self.spec.mode, &cumulative, affected_documents)?;

        if let Some(err) = fatal {
            return Err(err);
        }

        Ok(ModeRunReport {
            spec: self.spec,
            outcome,
            duration,
            operations: counter.load(Ordering::SeqCst),
            per_worker_operations,
            affected_documents,
            cumulative,
        })
    }
}
