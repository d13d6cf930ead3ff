pub mod balanced;
pub mod config;
pub mod dispatch;
pub mod grid;
pub mod interface;
pub mod nback;
pub mod response;
pub mod session;
pub mod state;
pub mod training;

pub use balanced::BalancedSequence;
pub use config::{DispatchConfig, GridConfig, Lookback, NBackConfig, TrainingConfig};
pub use dispatch::{Dispatcher, Message, Source};
pub use grid::{Command, Cursor, Grid};
pub use interface::NeuralInterface;
pub use nback::NBack;
pub use response::{Response, ResponseWindow};
pub use session::SessionGuard;
pub use state::SessionState;
pub use training::Training;

use cadence_core::{EventEmitter, Surface};
use cadence_timing::{InputSource, Scheduler, Timer};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub type SharedSurface = Arc<Mutex<dyn Surface>>;

/// External collaborators a sequencer drives
#[derive(Clone)]
pub struct Context<T: Timer> {
    pub emitter: Arc<dyn EventEmitter>,
    pub surface: SharedSurface,
    pub input: InputSource,
    pub timer: T,
    /// Scheduler drain cadence
    pub tick: Duration,
}

impl<T: Timer> Context<T> {
    pub fn new(
        emitter: Arc<dyn EventEmitter>,
        surface: SharedSurface,
        input: InputSource,
        timer: T,
    ) -> Self {
        Self {
            emitter,
            surface,
            input,
            timer,
            tick: Scheduler::DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn emit(&self, name: &str, payload: Option<Value>) {
        self.emitter.emit(name, payload);
    }

    pub(crate) fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.tick)
    }

    pub(crate) async fn sleep_ms(&self, ms: u64) {
        self.timer.sleep(Duration::from_millis(ms)).await;
    }
}

/// Aborts the wrapped task when dropped
pub(crate) struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
