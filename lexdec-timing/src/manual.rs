use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::timer::{CalibrationStats, Timer};

/// A simulated clock. `sleep` advances time instead of blocking, so timed
/// trials run instantly and deterministically.
///
/// Clones share the clock but not the overshoot samples.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    wake_delay: Duration,
    overshoots: Vec<Duration>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `sleep` wakes `delay` later than requested, like a scheduler
    /// with a fixed wakeup latency.
    pub fn with_wake_delay(mut self, delay: Duration) -> Self {
        self.wake_delay = delay;
        self
    }

    /// Moves the clock forward, saturating at `u64::MAX` nanoseconds.
    pub fn advance(&self, d: Duration) {
        let step = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(step))
            });
    }

    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.advance(d.saturating_add(self.wake_delay));
    }
    fn record_overshoot(&mut self, d: Duration) {
        self.overshoots.push(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_samples(&self.overshoots)
    }
}
