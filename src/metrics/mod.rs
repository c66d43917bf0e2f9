//! Latency recording and statistical snapshots
//!
//! Every completed operation of a mode-run is recorded here once, as a
//! duration. Two live views are maintained:
//!
//! - Rolling view: only the samples of the trailing 1-second window, evicted
//!   by age, consumed once per second for an instantaneous rate/latency line.
//! - Cumulative view: everything since the mode-run began - count, EWMA rates
//!   at 1/5/15-minute horizons, exact min/max/mean/stddev accumulators and an
//!   HdrHistogram reservoir for percentile estimation.
//!
//! Recording takes two short critical sections and a few atomic adds; readers
//! take the same locks briefly, so snapshots never stall writers for long.
//! Percentiles are estimates (histogram quantization), which is acceptable
//! for reporting purposes.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub mod meter;
pub use meter::Meter;

/// Length of the rolling window
pub const ROLLING_WINDOW: Duration = Duration::from_secs(1);

/// Highest latency the percentile reservoir can resolve (1 hour)
const HISTOGRAM_MAX_NANOS: u64 = 3_600_000_000_000;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

// ============================================================================
// Snapshots
// ============================================================================

/// Statistics over the trailing 1-second window
#[derive(Debug, Clone, Serialize)]
pub struct RollingSnapshot {
    /// Samples currently in the window
    pub count: u64,
    /// Samples per second over the window
    pub rate: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub median_ms: f64,
    pub p75_ms: f64,
    pub p95_ms: f64,
    pub p98_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
}

/// Statistics over everything recorded since the mode-run began
#[derive(Debug, Clone, Serialize)]
pub struct CumulativeSnapshot {
    pub count: u64,
    /// Average operations per second over the whole run
    pub mean_rate: f64,
    /// Operations per second over the last minute
    pub m1_rate: f64,
    /// Operations per second over the last five minutes
    pub m5_rate: f64,
    /// Operations per second over the last fifteen minutes
    pub m15_rate: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub median_ms: f64,
    pub p75_ms: f64,
    pub p95_ms: f64,
    pub p98_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
}

// ============================================================================
// Rolling window
// ============================================================================

struct RollingWindow {
    samples: VecDeque<(Instant, u64)>,
}

impl RollingWindow {
    fn evict(&mut self, now: Instant) {
        while let Some(&(at, _)) = self.samples.front() {
            if now.duration_since(at) > ROLLING_WINDOW {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: Instant, nanos: u64) {
        self.evict(now);
        self.samples.push_back((now, nanos));
    }

    fn snapshot(&mut self, now: Instant) -> RollingSnapshot {
        self.evict(now);
        let mut sorted: Vec<u64> = self.samples.iter().map(|&(_, n)| n).collect();
        sorted.sort_unstable();
        let count = sorted.len() as u64;
        let stats = SampleStats::from_sorted(&sorted);
        RollingSnapshot {
            count,
            rate: count as f64 / ROLLING_WINDOW.as_secs_f64(),
            min_ms: stats.min,
            max_ms: stats.max,
            mean_ms: stats.mean,
            stddev_ms: stats.stddev,
            median_ms: sorted_quantile_ms(&sorted, 0.5),
            p75_ms: sorted_quantile_ms(&sorted, 0.75),
            p95_ms: sorted_quantile_ms(&sorted, 0.95),
            p98_ms: sorted_quantile_ms(&sorted, 0.98),
            p99_ms: sorted_quantile_ms(&sorted, 0.99),
            p999_ms: sorted_quantile_ms(&sorted, 0.999),
        }
    }
}

/// Aggregates over a sorted sample set, in milliseconds
struct SampleStats {
    min: f64,
    max: f64,
    mean: f64,
    stddev: f64,
}

impl SampleStats {
    fn from_sorted(sorted: &[u64]) -> Self {
        if sorted.is_empty() {
            return SampleStats {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                stddev: 0.0,
            };
        }
        let n = sorted.len() as f64;
        let sum: f64 = sorted.iter().map(|&v| v as f64).sum();
        let mean = sum / n;
        let stddev = if sorted.len() > 1 {
            let m2: f64 = sorted.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
            (m2 / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        SampleStats {
            min: sorted[0] as f64 / NANOS_PER_MILLI,
            max: sorted[sorted.len() - 1] as f64 / NANOS_PER_MILLI,
            mean: mean / NANOS_PER_MILLI,
            stddev: stddev / NANOS_PER_MILLI,
        }
    }
}

/// Nearest-rank quantile of a sorted sample set, in milliseconds
fn sorted_quantile_ms(sorted: &[u64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((q * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1] as f64 / NANOS_PER_MILLI
}

// ============================================================================
// Cumulative view
// ============================================================================

struct Cumulative {
    hist: Histogram<u64>,
    min: u64,
    max: u64,
    /// Welford online mean/variance over exact nanosecond values
    mean: f64,
    m2: f64,
    count: u64,
}

impl Cumulative {
    fn new() -> Self {
        Cumulative {
            hist: Histogram::new_with_bounds(1, HISTOGRAM_MAX_NANOS, 3)
                .expect("valid histogram bounds"),
            min: u64::MAX,
            max: 0,
            mean: 0.0,
            m2: 0.0,
            count: 0,
        }
    }

    fn record(&mut self, nanos: u64) {
        self.hist.saturating_record(nanos.max(1));
        self.min = self.min.min(nanos);
        self.max = self.max.max(nanos);
        self.count += 1;
        let delta = nanos as f64 - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (nanos as f64 - self.mean);
    }

    fn stddev(&self) -> f64 {
        if self.count > 1 {
            (self.m2 / (self.count - 1) as f64).sqrt()
        } else {
            0.0
        }
    }

    fn quantile_ms(&self, q: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        // histogram buckets can overshoot the true extremes slightly; the
        // exact accumulators bound every estimate
        let value = self.hist.value_at_quantile(q).clamp(self.min, self.max);
        value as f64 / NANOS_PER_MILLI
    }
}

// ============================================================================
// MetricsWindow
// ============================================================================

/// Per-mode-run latency recorder feeding both statistical views.
///
/// Owned exclusively by one mode-run: created when the run starts, written by
/// every worker on every completed operation, read by the reporter on a 1 Hz
/// cadence and once at run end, then discarded.
pub struct MetricsWindow {
    rolling: Mutex<RollingWindow>,
    meter: Meter,
    cumulative: Mutex<Cumulative>,
}

impl MetricsWindow {
    pub fn new() -> Self {
        MetricsWindow {
            rolling: Mutex::new(RollingWindow {
                samples: VecDeque::new(),
            }),
            meter: Meter::new(),
            cumulative: Mutex::new(Cumulative::new()),
        }
    }

    /// Record one completed operation
    pub fn record(&self, elapsed: Duration) {
        let nanos = elapsed.as_nanos() as u64;
        let now = Instant::now();
        self.rolling.lock().record(now, nanos);
        self.meter.mark();
        self.cumulative.lock().record(nanos);
    }

    /// Total operations recorded since creation
    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// Statistics over the trailing 1-second window
    pub fn rolling_snapshot(&self) -> RollingSnapshot {
        self.rolling.lock().snapshot(Instant::now())
    }

    /// Statistics over the whole run so far
    pub fn cumulative_snapshot(&self) -> CumulativeSnapshot {
        let cumulative = self.cumulative.lock();
        let (min, max) = if cumulative.count == 0 {
            (0, 0)
        } else {
            (cumulative.min, cumulative.max)
        };
        CumulativeSnapshot {
            count: cumulative.count,
            mean_rate: self.meter.mean_rate(),
            m1_rate: self.meter.one_minute_rate(),
            m5_rate: self.meter.five_minute_rate(),
            m15_rate: self.meter.fifteen_minute_rate(),
            min_ms: min as f64 / NANOS_PER_MILLI,
            max_ms: max as f64 / NANOS_PER_MILLI,
            mean_ms: cumulative.mean / NANOS_PER_MILLI,
            stddev_ms: cumulative.stddev() / NANOS_PER_MILLI,
            median_ms: cumulative.quantile_ms(0.5),
            p75_ms: cumulative.quantile_ms(0.75),
            p95_ms: cumulative.quantile_ms(0.95),
            p98_ms: cumulative.quantile_ms(0.98),
            p99_ms: cumulative.quantile_ms(0.99),
            p999_ms: cumulative.quantile_ms(0.999),
        }
    }
}

impl Default for MetricsWindow {
    fn default() -> Self {
        MetricsWindow::new()
    }
}
