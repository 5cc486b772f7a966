use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Trait for high-precision timers
///
/// Timestamps are nanoseconds since the timer's origin. Clones share the
/// origin, so a clone handed to an input source reports comparable times.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
    /// Records how late a timed wait was released.
    fn record_overshoot(&mut self, d: Duration);
    fn calibration_stats(&self) -> CalibrationStats;
}

/// Sleeps until `deadline_ns`, re-sleeping on early wakeups.
pub fn sleep_until<T: Timer<Timestamp = u64>>(timer: &T, deadline_ns: u64) {
    loop {
        let now = timer.now();
        if now >= deadline_ns {
            return;
        }
        timer.sleep(Duration::from_nanos(deadline_ns - now));
    }
}

/// Lateness statistics over the recorded overshoot samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStats {
    pub samples: usize,
    pub average_overshoot_ns: f64,
    pub jitter_ns: f64,
    pub min_overshoot_ns: f64,
    pub max_overshoot_ns: f64,
}

impl CalibrationStats {
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Duration>) -> Self {
        let times: Vec<f64> = samples
            .into_iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return Self::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            samples: times.len(),
            average_overshoot_ns: avg,
            jitter_ns: var.sqrt(),
            min_overshoot_ns: min,
            max_overshoot_ns: max,
        }
    }

    /// Three standard deviations of lateness.
    pub fn safe_margin(&self) -> Duration {
        Duration::from_nanos((self.jitter_ns * 3.0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
    overshoots: VecDeque<Duration>,
    max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_overshoot(&mut self, d: Duration) {
        if self.overshoots.len() >= self.max_samples {
            self.overshoots.pop_front();
        }
        self.overshoots.push_back(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_samples(&self.overshoots)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            overshoots: VecDeque::with_capacity(1000),
            max_samples: 1000,
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // An interrupted sleep returns early; `sleep_until` re-checks the deadline.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}
