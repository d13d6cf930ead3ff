use crate::config::DispatchConfig;
use crate::grid::{Command, Grid};
use cadence_core::{Error, KeyCode, Result};
use cadence_timing::Timer;
use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Blinks that toggle the interface without waiting for the delay
const TOGGLE_BLINKS: u32 = 3;

const KEY_B: KeyCode = KeyCode(b'B' as u32);
const KEY_C: KeyCode = KeyCode(b'C' as u32);
const KEY_W: KeyCode = KeyCode(b'W' as u32);
const KEY_X: KeyCode = KeyCode(b'X' as u32);

/// Classifier a prediction comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Motor,
    Blink,
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motor" => Ok(Self::Motor),
            "blink" => Ok(Self::Blink),
            other => Err(format!("unknown prediction source: {other:?}")),
        }
    }
}

/// Classifier output delivered to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Predict(Source, u32),
    Feedback(Source, [f32; 2]),
}

#[derive(Default)]
struct Blinks {
    count: u32,
    pending: Option<JoinHandle<()>>,
}

struct Inner<T: Timer> {
    grid: Grid<T>,
    timer: T,
    delay: Duration,
    feedback: AtomicBool,
    blinks: Mutex<Blinks>,
}

/// Turns classifier predictions and keys into grid commands
pub struct Dispatcher<T: Timer> {
    inner: Arc<Inner<T>>,
}

impl<T: Timer> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Timer> Dispatcher<T> {
    pub fn new(config: DispatchConfig, grid: Grid<T>, timer: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                grid,
                timer,
                delay: Duration::from_millis(config.blink_delay),
                feedback: AtomicBool::new(config.feedback),
                blinks: Mutex::new(Blinks::default()),
            }),
        }
    }

    pub fn grid(&self) -> &Grid<T> {
        &self.inner.grid
    }

    /// Handles a prediction stamped at `timestamp` (timer ns)
    pub fn on_prediction(&self, source: Source, target: u32, timestamp: u64) {
        tracing::debug!(?source, target, timestamp, "prediction");
        match source {
            Source::Motor => {
                let command = if target == 0 {
                    Command::Left
                } else {
                    Command::Right
                };
                self.inner.grid.command(command);
            }
            Source::Blink if target == 1 => self.blink(timestamp),
            Source::Blink => {}
        }
    }

    pub fn on_feedback(&self, source: Source, scores: [f32; 2]) {
        if source == Source::Motor && self.inner.feedback.load(Ordering::Relaxed) {
            self.inner.grid.feedback(scores);
        }
    }

    /// Switches confidence feedback, resetting the neighbour cells
    pub fn set_feedback(&self, enabled: bool) {
        self.inner.feedback.store(enabled, Ordering::Relaxed);
        self.inner
            .grid
            .feedback(if enabled { [0.5, 0.5] } else { [1.0, 1.0] });
    }

    fn blink(&self, timestamp: u64) {
        let mut blinks = self.inner.blinks.lock();
        if let Some(pending) = blinks.pending.take() {
            pending.abort();
        }
        blinks.count += 1;
        if blinks.count == TOGGLE_BLINKS {
            blinks.count = 0;
            drop(blinks);
            self.inner.grid.command(Command::Toggle);
            return;
        }

        let age = Duration::from_nanos(self.inner.timer.now().saturating_sub(timestamp));
        let wait = self.inner.delay.saturating_sub(age);
        let inner = Arc::clone(&self.inner);
        blinks.pending = Some(tokio::spawn(async move {
            inner.timer.sleep(wait).await;
            let count = {
                let mut blinks = inner.blinks.lock();
                blinks.pending = None;
                std::mem::take(&mut blinks.count)
            };
            match count {
                1 => {
                    inner.grid.command(Command::Flip);
                }
                2 => {
                    inner.grid.command(Command::Select);
                }
                _ => {}
            }
        }));
    }

    /// Keyboard shortcuts; `b` simulates a blink
    pub fn on_key(&self, code: KeyCode) -> bool {
        if code == KEY_B {
            self.on_prediction(Source::Blink, 1, self.inner.timer.now());
            return true;
        }
        match command_for_key(code) {
            Some(command) => self.inner.grid.command(command),
            None => false,
        }
    }

    /// Predictions are stamped on arrival
    pub fn on_message(&self, message: Message) {
        match message {
            Message::Predict(source, target) => {
                self.on_prediction(source, target, self.inner.timer.now());
            }
            Message::Feedback(source, scores) => self.on_feedback(source, scores),
        }
    }

    /// Serves keys and classifier messages until the input closes
    pub async fn run(&self, mut messages: mpsc::UnboundedReceiver<Message>) -> Result<()> {
        let keys = self.run_keys();
        tokio::pin!(keys);
        loop {
            tokio::select! {
                result = &mut keys => return result,
                Some(message) = messages.recv() => self.on_message(message),
            }
        }
    }

    /// Feeds keys from the grid's input until it closes
    pub async fn run_keys(&self) -> Result<()> {
        let input = self.inner.grid.context().input.clone();
        loop {
            match input.wait_for_key(None).await {
                Ok(code) => {
                    self.on_key(code);
                }
                Err(Error::InputClosed) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }
}

impl<T: Timer> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.blinks.get_mut().pending.take() {
            pending.abort();
        }
    }
}

pub fn command_for_key(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::RIGHT => Some(Command::Right),
        KeyCode::LEFT => Some(Command::Left),
        KEY_W => Some(Command::Flip),
        KEY_X => Some(Command::Select),
        KEY_C => Some(Command::Toggle),
        _ => None,
    }
}
