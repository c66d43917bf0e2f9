//! Round sequencing
//!
//! The [`RoundCoordinator`] turns the configured mode sequence into rounds:
//! consecutive groups of one spec per configured operation kind. Within a
//! round every mode-run executes concurrently in its own [`WorkerPool`];
//! rounds themselves run strictly one after another, so resource use stays
//! bounded to one round's worth of threads and the store is quiescent between
//! rounds. A trailing partial group still forms a (smaller) final round.
//!
//! The round latch is a single [`CountdownGate`] re-armed per round. Each
//! pool counts it down exactly once when it observes its own termination
//! condition, which is also what lets one finished or timed-out mode-run cut
//! its siblings short. The coordinator then joins every pool thread, so the
//! next round is only admitted after the previous one has fully drained.

use crate::config::RunConfig;
use crate::executor::{ModeRunReport, WorkerPool};
use crate::infrastructure::gate::CountdownGate;
use crate::ops::Operation;
use crate::report::Reporter;
use crate::store::DocumentStore;
use crate::types::{DocbenchError, DocbenchResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

/// Sequences rounds of concurrently executing mode-runs
pub struct RoundCoordinator {
    store: Arc<dyn DocumentStore>,
    reporter: Arc<Reporter>,
    abort: Arc<AtomicBool>,
}

impl RoundCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, reporter: Arc<Reporter>) -> Self {
        RoundCoordinator {
            store,
            reporter,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Process-wide abort flag observed by every worker of every round
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Run every configured round to completion. Returns one report per
    /// mode-run in admission order, or the first fatal error.
    pub fn run(&self, config: &RunConfig) -> DocbenchResult<Vec<ModeRunReport>> {
        let specs = config.mode_sequence();
        let round_size = config.modes.len();
        info!(
            "OPERATION SETUP: {} modes, {} mode-runs, {} round(s)",
            round_size,
            specs.len(),
            specs.len().div_ceil(round_size)
        );

        let round_gate = Arc::new(CountdownGate::new(0));
        let mut reports = Vec::with_capacity(specs.len());

        for (round, group) in specs.chunks(round_size).enumerate() {
            if self.abort.load(Ordering::SeqCst) {
                return Err(DocbenchError::Interrupted(format!(
                    "run aborted before round {}",
                    round + 1
                )));
            }

            // re-arm the latch for this round; sound because the previous
            // round's pools have all been joined
            round_gate.reset(group.len() as u64);
            info!("ROUND {}: starting {} mode-run(s)", round + 1, group.len());

            let mut handles = Vec::with_capacity(group.len());
            let mut setup_error: Option<DocbenchError> = None;
            for spec in group {
                let operation = match Operation::new(
                    spec.mode,
                    Arc::clone(&self.store),
                    &config.database,
                    &config.collection,
                    config.random_text_len,
                ) {
                    Ok(operation) => Arc::new(operation),
                    Err(err) => {
                        error!("ROUND {}: setup of {} failed: {}", round + 1, spec.mode, err);
                        self.abort.store(true, Ordering::SeqCst);
                        setup_error = Some(err);
                        break;
                    }
                };

                info!("ROUND {}: adding mode-run {}", round + 1, spec.mode);
                let pool = WorkerPool::new(
                    *spec,
                    operation,
                    Arc::clone(&round_gate),
                    Arc::clone(&self.abort),
                    config.seed,
                );
                let reporter = Arc::clone(&self.reporter);
                let spawned = thread::Builder::new()
                    .name(format!("pool-{}", spec.mode))
                    .spawn(move || pool.run(&reporter));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        error!(
                            "ROUND {}: could not spawn pool for {}: {}",
                            round + 1,
                            spec.mode,
                            err
                        );
                        self.abort.store(true, Ordering::SeqCst);
                        setup_error = Some(err.into());
                        break;
                    }
                }
            }

            if setup_error.is_none() {
                // admission control: block until every pool of this round has
                // signaled completion
                round_gate.wait();
            }

            // full drain: the pools also wait out their in-flight workers, so
            // joining them is what makes the next round safe to admit
            let mut fatal = setup_error;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(report)) => reports.push(report),
                    Ok(Err(err)) => {
                        error!("mode-run failed: {}", err);
                        fatal.get_or_insert(err);
                    }
                    Err(_) => {
                        fatal.get_or_insert(DocbenchError::Interrupted(
                            "mode-run thread panicked".to_string(),
                        ));
                    }
                }
            }
            if let Some(err) = fatal {
                return Err(err);
            }
            info!("ROUND {}: all mode-runs drained", round + 1);
        }

        Ok(reports)
    }
}
