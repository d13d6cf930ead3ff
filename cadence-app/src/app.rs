use crate::output::{JsonLines, LogSurface};
use anyhow::{bail, Context as _, Result};
use cadence_core::KeyCode;
use cadence_experiment::{
    Context, DispatchConfig, Dispatcher, Grid, GridConfig, Message, NBack, NBackConfig,
    NeuralInterface, SessionGuard, Training, TrainingConfig,
};
use cadence_timing::{InputSource, MonotonicTimer};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about = "Deterministic experiment sequencer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub protocol: Protocol,

    /// JSON settings file with `nback`, `training`, `grid` and `dispatch` sections
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seed for every random draw; OS entropy when absent
    #[arg(long)]
    pub seed: Option<u64>,

    /// Scheduler tick in milliseconds
    #[arg(long, default_value_t = 16.667)]
    pub tick_ms: f64,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Working-memory n-back task
    Nback,
    /// Baseline, motor imagery and blink training
    Training,
    /// Symbol grid driven by keys and classifier predictions
    Grid,
    /// Training followed by the grid, in one session
    Motor,
}

/// A parsed stdin line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Line {
    Key(KeyCode),
    Message(Message),
}

impl Line {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("predict") => {
                let source = words.next().context("prediction without source")?;
                let target = words.next().context("prediction without target")?;
                Ok(Self::Message(Message::Predict(
                    source.parse().map_err(anyhow::Error::msg)?,
                    target.parse().with_context(|| format!("bad target {target:?}"))?,
                )))
            }
            Some("feedback") => {
                let source = words.next().context("feedback without source")?;
                let mut score = || -> Result<f32> {
                    let word = words.next().context("feedback needs two scores")?;
                    word.parse().with_context(|| format!("bad score {word:?}"))
                };
                let scores = [score()?, score()?];
                Ok(Self::Message(Message::Feedback(
                    source.parse().map_err(anyhow::Error::msg)?,
                    scores,
                )))
            }
            _ => Ok(Self::Key(line.parse().map_err(anyhow::Error::msg)?)),
        }
    }
}

pub struct App {
    cli: Cli,
    settings: Value,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        if !(cli.tick_ms.is_finite() && cli.tick_ms > 0.0) {
            bail!("tick must be positive milliseconds, got {}", cli.tick_ms);
        }
        let settings = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading settings {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing settings {}", path.display()))?
            }
            None => json!({}),
        };
        Ok(Self { cli, settings })
    }

    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building runtime")?;
        runtime.block_on(self.session())
    }

    fn section(&self, name: &str) -> Value {
        self.settings.get(name).cloned().unwrap_or_else(|| json!({}))
    }

    fn rng(&self) -> StdRng {
        match self.cli.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    async fn session(self) -> Result<()> {
        let timer = MonotonicTimer::new();
        let input = InputSource::new();
        let ctx = Context::new(
            Arc::new(JsonLines::new(std::io::stdout(), timer)),
            Arc::new(Mutex::new(LogSurface)),
            input.clone(),
            timer,
        )
        .with_tick(Duration::from_secs_f64(self.cli.tick_ms / 1e3));

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_stdin(input, tx));
        tracing::info!(protocol = ?self.cli.protocol, seed = ?self.cli.seed, "starting");

        let protocol = self.protocol(ctx, rx);
        let result = tokio::select! {
            result = protocol => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted");
                Ok(())
            }
        };
        reader.abort();
        result
    }

    async fn protocol(
        &self,
        ctx: Context<MonotonicTimer>,
        rx: mpsc::UnboundedReceiver<Message>,
    ) -> Result<()> {
        match self.cli.protocol {
            Protocol::Nback => {
                let config = NBackConfig::from_overrides(&self.section("nback"))?;
                let mut nback = NBack::new(config, ctx, self.rng())?;
                let score = nback.run().await?;
                tracing::info!(session = score.session, block = score.block, "final score");
            }
            Protocol::Training => {
                let config = TrainingConfig::from_overrides(&self.section("training"))?;
                let emitter = Arc::clone(&ctx.emitter);
                let mut training = Training::new(config, ctx, self.rng())?;
                SessionGuard::scope(emitter, &self.settings, training.run()).await?;
            }
            Protocol::Grid => self.grid(ctx, rx).await?,
            Protocol::Motor => {
                let mut interface = NeuralInterface::new(
                    TrainingConfig::from_overrides(&self.section("training"))?,
                    GridConfig::from_overrides(&self.section("grid"))?,
                    DispatchConfig::from_overrides(&self.section("dispatch"))?,
                    ctx,
                    self.rng(),
                )?;
                interface.run(&self.settings, rx).await?;
            }
        }
        Ok(())
    }

    async fn grid(
        &self,
        ctx: Context<MonotonicTimer>,
        rx: mpsc::UnboundedReceiver<Message>,
    ) -> Result<()> {
        let grid_config = GridConfig::from_overrides(&self.section("grid"))?;
        let dispatch_config = DispatchConfig::from_overrides(&self.section("dispatch"))?;
        grid_config.validate()?;
        let emitter = Arc::clone(&ctx.emitter);
        SessionGuard::scope(emitter, &self.settings, async move {
            let timer = ctx.timer;
            let dispatcher = Dispatcher::new(dispatch_config, Grid::new(grid_config, ctx)?, timer);
            dispatcher.run(rx).await
        })
        .await?;
        Ok(())
    }
}

/// Feeds stdin lines into `input`; other messages go to `tx`. Closes the
/// input at end of stream.
async fn read_stdin(input: InputSource, tx: mpsc::UnboundedSender<Message>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(text)) => match Line::parse(&text) {
                Ok(Line::Key(code)) => input.press(code),
                Ok(Line::Message(message)) => {
                    if tx.send(message).is_err() {
                        tracing::debug!(?message, "no consumer for message");
                    }
                }
                Err(err) => tracing::warn!(%err, %text, "ignoring input line"),
            },
            Ok(None) => break,
            Err(err) => {
                tracing::error!(%err, "reading stdin");
                break;
            }
        }
    }
    tracing::info!("input closed");
    input.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_experiment::Source;

    #[test]
    fn lines_parse_into_keys_and_messages() {
        assert_eq!(Line::parse("space").unwrap(), Line::Key(KeyCode::SPACE));
        assert_eq!(Line::parse("32").unwrap(), Line::Key(KeyCode::SPACE));
        assert_eq!(Line::parse("arrowleft").unwrap(), Line::Key(KeyCode::LEFT));
        assert_eq!(
            Line::parse("predict blink 1").unwrap(),
            Line::Message(Message::Predict(Source::Blink, 1))
        );
        assert_eq!(
            Line::parse("feedback motor 0.25 0.75").unwrap(),
            Line::Message(Message::Feedback(Source::Motor, [0.25, 0.75]))
        );
        assert!(Line::parse("predict gaze 1").is_err());
        assert!(Line::parse("feedback motor 0.5").is_err());
        assert!(Line::parse("predict motor").is_err());
    }

    #[test]
    fn cli_parses_protocol_and_flags() {
        let cli =
            Cli::try_parse_from(["cadence", "--seed", "7", "--tick-ms", "5", "nback"]).unwrap();
        assert_eq!(cli.protocol, Protocol::Nback);
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.tick_ms, 5.0);
        let motor = Cli::try_parse_from(["cadence", "motor"]).unwrap();
        assert_eq!(motor.protocol, Protocol::Motor);
        let zero_tick = Cli::try_parse_from(["cadence", "--tick-ms", "0", "grid"]).unwrap();
        assert!(App::new(zero_tick).is_err());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let app = App::new(Cli::try_parse_from(["cadence", "training"]).unwrap()).unwrap();
        assert_eq!(app.section("training"), json!({}));
        assert!(TrainingConfig::from_overrides(&app.section("training")).is_ok());
    }
}
