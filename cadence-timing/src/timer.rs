use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Clock and sleep primitive shared by every sequencer
pub trait Timer: Clone + Send + Sync + 'static {
    /// Nanoseconds since the timer origin
    fn now(&self) -> u64;

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    /// Resumes no earlier than `d` after the call. Overruns are not corrected.
    fn sleep(&self, d: Duration) -> impl Future<Output = ()> + Send;

    /// Millisecond sleep; negative or zero durations resolve immediately
    fn sleep_ms(&self, ms: i64) -> impl Future<Output = ()> + Send {
        self.sleep(Duration::from_millis(ms.max(0) as u64))
    }
}

/// Timer over the runtime's monotonic clock.
///
/// Follows the runtime clock, so a paused test runtime advances it
/// deterministically.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimer {
    origin: Instant,
}

impl MonotonicTimer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for MonotonicTimer {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn sleep(&self, d: Duration) -> impl Future<Output = ()> + Send {
        async move {
            if !d.is_zero() {
                tokio::time::sleep(d).await;
            }
        }
    }
}

/// Cadence statistics over recorded tick intervals
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationStats {
    pub samples: usize,
    pub average_tick_ns: f64,
    pub jitter_ns: f64,
    pub min_tick_ns: f64,
    pub max_tick_ns: f64,
    pub effective_hz: f64,
}

impl CalibrationStats {
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let times: Vec<f64> = samples.iter().map(|d| d.as_nanos() as f64).collect();
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            samples: times.len(),
            average_tick_ns: avg,
            jitter_ns: var.sqrt(),
            min_tick_ns: min,
            max_tick_ns: max,
            effective_hz: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}
