//! Console and CSV reporting
//!
//! Two append-only series per operation kind: a per-second series fed from
//! rolling snapshots on a 1 Hz cadence while the mode-run is live, and a
//! per-run series receiving one cumulative row when the mode-run ends. CSV
//! files are named after the series and the mode, console output mirrors the
//! same numbers.

use crate::metrics::{CumulativeSnapshot, MetricsWindow, RollingSnapshot};
use crate::types::{DocbenchResult, OperationMode};
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

/// File/series prefix of the rolling per-second statistics
pub const PER_SECOND_PREFIX: &str = "stats-per-second-";

/// File/series prefix of the cumulative per-run statistics
pub const PER_RUN_PREFIX: &str = "stats-per-run-";

const PER_SECOND_HEADER: &str =
    "t,count,rate,min,mean,max,stddev,p50,p75,p95,p98,p99,p999";

const PER_RUN_HEADER: &str = "t,count,mean_rate,m1_rate,m5_rate,m15_rate,min,mean,max,stddev,\
                              p50,p75,p95,p98,p99,p999,affected_documents";

/// Report sink shared by all mode-runs
pub struct Reporter {
    csv_dir: Option<PathBuf>,
    console: bool,
}

impl Reporter {
    pub fn new(csv_dir: Option<PathBuf>, console: bool) -> Self {
        Reporter { csv_dir, console }
    }

    /// Reporter that discards everything; used by tests
    pub fn disabled() -> Self {
        Reporter::new(None, false)
    }

    /// Start the 1 Hz rolling sampler for one mode-run. The returned handle
    /// must be stopped when the mode-run's pool has drained.
    pub fn start_rolling(&self, mode: OperationMode, metrics: Arc<MetricsWindow>) -> RollingReporter {
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let csv_path = self
            .csv_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}{}.csv", PER_SECOND_PREFIX, mode)));
        let console = self.console;
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name(format!("report-{}", mode))
            .spawn(move || {
                let (stopped, wake) = &*thread_signal;
                loop {
                    {
                        let mut stopped = stopped.lock();
                        if !*stopped {
                            let _ = wake.wait_for(&mut stopped, Duration::from_secs(1));
                        }
                        if *stopped {
                            break;
                        }
                    }
                    let snapshot = metrics.rolling_snapshot();
                    if console {
                        print_rolling(mode, &snapshot);
                    }
                    if let Some(path) = &csv_path {
                        if let Err(err) = append_rolling_row(path, &snapshot) {
                            error!("failed to append to '{}': {}", path.display(), err);
                        }
                    }
                }
            })
            .ok();
        RollingReporter { signal, handle }
    }

    /// Emit the end-of-run cumulative snapshot for one mode-run
    pub fn report_cumulative(
        &self,
        mode: OperationMode,
        snapshot: &CumulativeSnapshot,
        affected_documents: u64,
    ) -> DocbenchResult<()> {
        info!("affected documents: {}", affected_documents);
        info!("count: {}", snapshot.count);
        info!("FifteenMinuteRate: {:.4} ops/s", snapshot.m15_rate);
        info!("FiveMinuteRate: {:.4} ops/s", snapshot.m5_rate);
        info!("OneMinuteRate: {:.4} ops/s", snapshot.m1_rate);
        info!("MeanRate: {:.4} ops/s", snapshot.mean_rate);
        info!("Snapshot Median: {:.4} ms", snapshot.median_ms);
        info!("Snapshot 75thPercentile: {:.4} ms", snapshot.p75_ms);
        info!("Snapshot 95thPercentile: {:.4} ms", snapshot.p95_ms);
        info!("Snapshot 98thPercentile: {:.4} ms", snapshot.p98_ms);
        info!("Snapshot 99thPercentile: {:.4} ms", snapshot.p99_ms);
        info!("Snapshot 999thPercentile: {:.4} ms", snapshot.p999_ms);
        info!("Snapshot Min: {:.4} ms", snapshot.min_ms);
        info!("Snapshot Max: {:.4} ms", snapshot.max_ms);
        info!("Snapshot Mean: {:.4} ms", snapshot.mean_ms);
        info!("Snapshot StdDev: {:.4} ms", snapshot.stddev_ms);

        if self.console {
            println!(
                "== {}{}: count={} mean_rate={:.2}/s mean={:.3}ms p95={:.3}ms p99={:.3}ms max={:.3}ms",
                PER_RUN_PREFIX,
                mode,
                snapshot.count,
                snapshot.mean_rate,
                snapshot.mean_ms,
                snapshot.p95_ms,
                snapshot.p99_ms,
                snapshot.max_ms
            );
        }

        if let Some(dir) = &self.csv_dir {
            let path = dir.join(format!("{}{}.csv", PER_RUN_PREFIX, mode));
            append_cumulative_row(&path, snapshot, affected_documents)?;
            info!(
                "Summary of statistics saved in csv-file '{}'",
                path.display()
            );
        }
        Ok(())
    }
}

/// Handle of a running 1 Hz sampler
pub struct RollingReporter {
    signal: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl RollingReporter {
    /// Stop sampling and wait for the reporter thread to exit
    pub fn stop(mut self) {
        let (stopped, wake) = &*self.signal;
        *stopped.lock() = true;
        wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn print_rolling(mode: OperationMode, snapshot: &RollingSnapshot) {
    println!(
        "-- {}{}: count={} rate={:.2}/s min={:.3}ms mean={:.3}ms max={:.3}ms p95={:.3}ms p99={:.3}ms",
        PER_SECOND_PREFIX,
        mode,
        snapshot.count,
        snapshot.rate,
        snapshot.min_ms,
        snapshot.mean_ms,
        snapshot.max_ms,
        snapshot.p95_ms,
        snapshot.p99_ms
    );
}

fn open_csv(path: &Path, header: &str) -> std::io::Result<std::fs::File> {
    let is_new = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if is_new {
        writeln!(file, "{}", header)?;
    }
    Ok(file)
}

fn append_rolling_row(path: &Path, snapshot: &RollingSnapshot) -> std::io::Result<()> {
    let mut file = open_csv(path, PER_SECOND_HEADER)?;
    writeln!(
        file,
        "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
        Utc::now().timestamp(),
        snapshot.count,
        snapshot.rate,
        snapshot.min_ms,
        snapshot.mean_ms,
        snapshot.max_ms,
        snapshot.stddev_ms,
        snapshot.median_ms,
        snapshot.p75_ms,
        snapshot.p95_ms,
        snapshot.p98_ms,
        snapshot.p99_ms,
        snapshot.p999_ms
    )
}

fn append_cumulative_row(
    path: &Path,
    snapshot: &CumulativeSnapshot,
    affected_documents: u64,
) -> std::io::Result<()> {
    let mut file = open_csv(path, PER_RUN_HEADER)?;
    writeln!(
        file,
        "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
        Utc::now().timestamp(),
        snapshot.count,
        snapshot.mean_rate,
        snapshot.m1_rate,
        snapshot.m5_rate,
        snapshot.m15_rate,
        snapshot.min_ms,
        snapshot.mean_ms,
        snapshot.max_ms,
        snapshot.stddev_ms,
        snapshot.median_ms,
        snapshot.p75_ms,
        snapshot.p95_ms,
        snapshot.p98_ms,
        snapshot.p99_ms,
        snapshot.p999_ms,
        affected_documents
    )
}
