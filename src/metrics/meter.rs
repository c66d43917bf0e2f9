//! Throughput meter
//!
//! Exponentially-weighted moving-average rate estimators at 1/5/15-minute
//! horizons plus an overall mean rate. Marking is a handful of relaxed atomic
//! adds; the EWMA decay is advanced lazily in 5-second ticks claimed with a
//! single compare-exchange, so concurrent markers never serialize on a lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Tick interval of the EWMA decay
const TICK_NANOS: u64 = 5_000_000_000;

/// Seconds per tick, used to turn a per-tick count into a per-second rate
const TICK_SECONDS: f64 = 5.0;

struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    /// f64 bits of the current per-second rate
    rate_bits: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    /// EWMA decaying over a window of `minutes`
    fn over_minutes(minutes: f64) -> Self {
        Ewma {
            alpha: 1.0 - (-TICK_SECONDS / 60.0 / minutes).exp(),
            uncounted: AtomicU64::new(0),
            rate_bits: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
        }
    }

    fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed) as f64;
        let instant_rate = count / TICK_SECONDS;
        let rate = f64::from_bits(self.rate_bits.load(Ordering::Relaxed));
        let next = if self.initialized.load(Ordering::Relaxed) {
            rate + self.alpha * (instant_rate - rate)
        } else {
            self.initialized.store(true, Ordering::Relaxed);
            instant_rate
        };
        self.rate_bits.store(next.to_bits(), Ordering::Relaxed);
    }

    fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }
}

/// Marks events and estimates their rates
pub struct Meter {
    count: AtomicU64,
    start: Instant,
    /// nanoseconds since `start` at the last completed tick
    last_tick: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl Meter {
    pub fn new() -> Self {
        Meter {
            count: AtomicU64::new(0),
            start: Instant::now(),
            last_tick: AtomicU64::new(0),
            m1: Ewma::over_minutes(1.0),
            m5: Ewma::over_minutes(5.0),
            m15: Ewma::over_minutes(15.0),
        }
    }

    /// Record one event
    pub fn mark(&self) {
        self.tick_if_necessary();
        self.count.fetch_add(1, Ordering::Relaxed);
        self.m1.update(1);
        self.m5.update(1);
        self.m15.update(1);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Average events per second since creation
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = self.start.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        count as f64 / elapsed
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate()
    }

    /// Advance the EWMAs for every whole tick interval that has elapsed.
    /// Exactly one caller wins the compare-exchange and performs the ticks.
    fn tick_if_necessary(&self) {
        let old_tick = self.last_tick.load(Ordering::Relaxed);
        let now = self.start.elapsed().as_nanos() as u64;
        let age = now.saturating_sub(old_tick);
        if age < TICK_NANOS {
            return;
        }
        let new_tick = now - (age % TICK_NANOS);
        if self
            .last_tick
            .compare_exchange(old_tick, new_tick, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            for _ in 0..(age / TICK_NANOS) {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Meter::new()
    }
}
