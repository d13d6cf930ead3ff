//! FIFO deferred-callback queue drained on a fixed tick.
//!
//! Visible changes issued through [`Scheduler::asap`] complete in strict
//! submission order regardless of how the host coalesces its own timers:
//! a stimulus can never be cleared before it was shown.

use crate::timer::CalibrationStats;
use cadence_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

type Task = Box<dyn FnOnce() + Send + 'static>;

const MAX_TICK_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopped,
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    state: Mutex<State>,
    ticks: Mutex<VecDeque<Duration>>,
}

pub struct Scheduler {
    tick: Duration,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// One frame at 60 Hz
    pub const DEFAULT_TICK: Duration = Duration::from_micros(16_667);

    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_micros(100)),
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                state: Mutex::new(State::Idle),
                ticks: Mutex::new(VecDeque::with_capacity(MAX_TICK_SAMPLES)),
            }),
            worker: None,
        }
    }

    /// Begins draining. Must be called from within the async runtime.
    pub fn start(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if *state == State::Running {
                return;
            }
            *state = State::Running;
        }
        tracing::debug!(tick_us = self.tick.as_micros() as u64, "scheduler started");
        let shared = Arc::clone(&self.shared);
        self.worker = Some(tokio::spawn(drain(shared, self.tick)));
    }

    /// Halts draining. Pending tasks are dropped and their completions fail.
    pub fn stop(&mut self) {
        *self.shared.state.lock() = State::Stopped;
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        let dropped = {
            let mut queue = self.shared.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        if dropped > 0 {
            tracing::warn!(dropped, "scheduler stopped with pending tasks");
        }
        let stats = self.stats();
        tracing::debug!(
            samples = stats.samples,
            avg_ms = stats.average_tick_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            hz = stats.effective_hz,
            "scheduler stopped"
        );
    }

    /// Enqueues `f`; the returned completion resolves once `f` has run
    pub fn asap<F, T>(&self, f: F) -> Completion<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if *self.shared.state.lock() == State::Stopped {
            tracing::warn!("asap called after stop, callback dropped");
            return Completion { rx: None };
        }
        let (tx, rx) = oneshot::channel();
        self.shared.queue.lock().push_back(Box::new(move || {
            let _ = tx.send(f());
        }));
        Completion { rx: Some(rx) }
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_running(&self) -> bool {
        *self.shared.state.lock() == State::Running
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Statistics over the recorded tick intervals
    pub fn stats(&self) -> CalibrationStats {
        let ticks = self.shared.ticks.lock();
        let samples: Vec<Duration> = ticks.iter().copied().collect();
        CalibrationStats::from_samples(&samples)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TICK)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn drain(shared: Arc<Shared>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Instant> = None;
    loop {
        let now = interval.tick().await;
        if let Some(prev) = last {
            let mut ticks = shared.ticks.lock();
            if ticks.len() >= MAX_TICK_SAMPLES {
                ticks.pop_front();
            }
            ticks.push_back(now - prev);
        }
        last = Some(now);

        // Tasks enqueued by a running task wait for the next tick.
        let batch: Vec<Task> = shared.queue.lock().drain(..).collect();
        for task in batch {
            task();
        }
    }
}

/// Resolves with the callback's return value after it executed
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<T> {
    rx: Option<oneshot::Receiver<T>>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.rx.as_mut() {
            None => Poll::Ready(Err(Error::SchedulerMisuse(
                "asap called after stop".to_owned(),
            ))),
            Some(rx) => Pin::new(rx).poll(cx).map(|res| {
                res.map_err(|_| Error::SchedulerMisuse("task dropped before it ran".to_owned()))
            }),
        }
    }
}
