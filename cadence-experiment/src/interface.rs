//! Motor app session: classifier training, then the command grid, bracketed
//! by a single `session_begins` / `session_ends` pair.

use crate::config::{DispatchConfig, GridConfig, TrainingConfig};
use crate::dispatch::{Dispatcher, Message};
use crate::grid::Grid;
use crate::session::SessionGuard;
use crate::training::Training;
use crate::Context;
use cadence_core::Result;
use cadence_timing::Timer;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct NeuralInterface<T: Timer, R: Rng> {
    training: Training<T, R>,
    grid: GridConfig,
    dispatch: DispatchConfig,
    ctx: Context<T>,
}

impl<T, R> NeuralInterface<T, R>
where
    T: Timer,
    R: Rng + Send,
{
    /// Validates every section; nothing is emitted on error
    pub fn new(
        training: TrainingConfig,
        grid: GridConfig,
        dispatch: DispatchConfig,
        ctx: Context<T>,
        rng: R,
    ) -> Result<Self> {
        grid.validate()?;
        Ok(Self {
            training: Training::new(training, ctx.clone(), rng)?,
            grid,
            dispatch,
            ctx,
        })
    }

    /// Trains, then serves the grid until the input closes. `settings` is
    /// the `session_begins` payload. Messages that arrive before the grid
    /// exists are discarded.
    pub async fn run<C: Serialize>(
        &mut self,
        settings: &C,
        mut messages: mpsc::UnboundedReceiver<Message>,
    ) -> Result<()> {
        let emitter = Arc::clone(&self.ctx.emitter);
        SessionGuard::scope(emitter, settings, async move {
            self.training.run().await?;

            let stale = std::iter::from_fn(|| messages.try_recv().ok()).count();
            if stale > 0 {
                tracing::debug!(stale, "messages received during training dropped");
            }
            let grid = Grid::new(self.grid.clone(), self.ctx.clone())?;
            tracing::info!("grid ready");
            Dispatcher::new(self.dispatch.clone(), grid, self.ctx.timer.clone())
                .run(messages)
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Source;
    use cadence_core::{Element, Highlight, KeyCode, Recorder, Recording};
    use cadence_timing::{InputSource, MonotonicTimer};
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    fn training() -> TrainingConfig {
        TrainingConfig::from_overrides(&json!({
            "baseline": {"duration": 100},
            "motor": {"blocks": 1, "trials": 2,
                      "duration": {"prep": 10, "rest": 20, "on": 30, "off": 40, "pause": 0}},
            "blink": {"trials": 1,
                      "duration": {"prep": 10, "stim": 150, "display": 50, "rest_min": 0, "rest_max": 20}},
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn one_session_covers_training_and_grid() {
        let recorder = Arc::new(Recorder::new());
        let surface = Arc::new(Mutex::new(Recording::new()));
        let input = InputSource::new();
        let ctx = Context::new(
            recorder.clone(),
            surface.clone(),
            input.clone(),
            MonotonicTimer::new(),
        )
        .with_tick(Duration::from_millis(5));
        let mut interface = NeuralInterface::new(
            training(),
            GridConfig::default(),
            DispatchConfig::default(),
            ctx,
            StdRng::seed_from_u64(4),
        )
        .unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let run = tokio::spawn(async move { interface.run(&json!({"app": "motor"}), rx).await });
        let presser = {
            let input = input.clone();
            tokio::spawn(async move {
                loop {
                    sleep(Duration::from_millis(50)).await;
                    input.press(KeyCode::SPACE);
                }
            })
        };

        // Before the grid exists: dropped.
        tx.send(Message::Predict(Source::Motor, 1)).unwrap();
        sleep(Duration::from_secs(3)).await;
        tx.send(Message::Predict(Source::Motor, 0)).unwrap();
        sleep(Duration::from_millis(10)).await;
        presser.abort();
        input.close();
        run.await.unwrap().unwrap();

        let names = recorder.names();
        let at = |name: &str| names.iter().position(|n| n == name).unwrap();
        assert_eq!(at("session_begins"), 0);
        assert!(at("training_begins") < at("training_ends"));
        assert!(at("training_ends") < at("grid_begins"));
        assert_eq!(names.last().map(String::as_str), Some("session_ends"));
        assert_eq!(recorder.count("session_begins"), 1);
        assert_eq!(recorder.count("session_ends"), 1);
        assert_eq!(
            recorder.payloads("session_begins"),
            vec![json!({"app": "motor"})]
        );
        assert_eq!(
            surface.lock().highlights()[0],
            (Element::Cell { x: 0, y: 1 }, Highlight::Center)
        );
    }

    #[test]
    fn invalid_grid_fails_before_any_event() {
        let recorder = Arc::new(Recorder::new());
        let ctx = Context::new(
            recorder.clone(),
            Arc::new(Mutex::new(Recording::new())),
            InputSource::new(),
            MonotonicTimer::new(),
        );
        let grid = GridConfig {
            symbols: String::new(),
            ..GridConfig::default()
        };
        let result = NeuralInterface::new(
            training(),
            grid,
            DispatchConfig::default(),
            ctx,
            StdRng::seed_from_u64(4),
        );
        assert!(result.is_err());
        assert!(recorder.events().is_empty());
    }
}
