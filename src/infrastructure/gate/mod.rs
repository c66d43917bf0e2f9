// CountdownGate - reusable counting gate
// Workers count the gate down; waiters block until it reaches zero. Unlike a
// one-shot latch the gate can be reset and reused for the next round.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A counting gate over parking_lot Mutex + Condvar.
///
/// Semantics match a countdown latch: `count_down` decrements towards zero
/// and wakes all waiters at zero; `wait` blocks until the count is zero;
/// `wait_for` additionally gives up after a timeout. `reset` re-arms the gate
/// for reuse, which is only sound once every waiter of the previous cycle has
/// been released.
pub struct CountdownGate {
    count: Mutex<u64>,
    zeroed: Condvar,
}

impl CountdownGate {
    pub fn new(count: u64) -> Self {
        CountdownGate {
            count: Mutex::new(count),
            zeroed: Condvar::new(),
        }
    }

    /// Current count
    pub fn count(&self) -> u64 {
        *self.count.lock()
    }

    /// True once the count has reached zero
    pub fn is_open(&self) -> bool {
        self.count() == 0
    }

    /// Decrement the count by one, saturating at zero. Wakes all waiters
    /// when the count reaches zero.
    pub fn count_down(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.zeroed.notify_all();
        }
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.zeroed.wait(&mut count);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    /// Returns true if the gate opened in time.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.zeroed.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    /// Re-arm the gate with a fresh count for the next cycle
    pub fn reset(&self, count: u64) {
        *self.count.lock() = count;
    }
}
