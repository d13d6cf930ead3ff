//! N-back working-memory task.
//!
//! Baseline, then blocks of trials. Each trial shows one symbol; the
//! participant presses the respond key when it matches the symbol `n` trials
//! back. Visible changes go through the scheduler, the response key is
//! captured by a separate listener task that shares the [`ResponseWindow`]
//! and reads the current state.

use crate::config::NBackConfig;
use crate::response::ResponseWindow;
use crate::session::SessionGuard;
use crate::state::SessionState;
use crate::{Context, TaskGuard};
use cadence_core::{Element, KeyCode, Mark, NBackState, Outcome, Phase, Result, Score, TrialRecord};
use cadence_timing::{Scheduler, Timer};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

pub struct NBack<T: Timer, R: Rng> {
    config: NBackConfig,
    alphabet: Vec<char>,
    ctx: Context<T>,
    rng: R,
    scheduler: Scheduler,
    window: Arc<ResponseWindow>,
    /// Read by the response listener to gate input
    state: Arc<Mutex<NBackState>>,
    session: SessionState,
}

impl<T, R> NBack<T, R>
where
    T: Timer,
    R: Rng + Send,
{
    /// Validates `config`; nothing is emitted on error
    pub fn new(mut config: NBackConfig, ctx: Context<T>, rng: R) -> Result<Self> {
        config.normalize();
        config.validate()?;
        Ok(Self {
            alphabet: config.alphabet(),
            scheduler: ctx.scheduler(),
            config,
            ctx,
            rng,
            window: Arc::new(ResponseWindow::new()),
            state: Arc::new(Mutex::new(NBackState::default())),
            session: SessionState::new(),
        })
    }

    pub fn config(&self) -> &NBackConfig {
        &self.config
    }

    pub fn state(&self) -> NBackState {
        *self.state.lock()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Runs a whole session and returns the final score
    pub async fn run(&mut self) -> Result<Score> {
        let session = SessionGuard::begin(Arc::clone(&self.ctx.emitter), &self.config)?;
        *self.state.lock() = NBackState::Idle;
        let listener = self.spawn_listener();
        self.session = SessionState::new();
        self.scheduler.start();

        let result = self.sequence().await;

        self.scheduler.stop();
        drop(listener);
        self.window.reset();
        enter(&self.state, NBackState::SessionEnd);
        self.ctx.surface.lock().show(Element::Instructions);
        session.end();

        let score = result.map(|_| self.session.score)?;
        tracing::info!(session = score.session, "n-back finished");
        Ok(score)
    }

    async fn sequence(&mut self) -> Result<()> {
        self.baseline().await?;
        for block in 1..=self.config.blocks {
            self.block(block).await?;
        }
        Ok(())
    }


    async fn baseline(&mut self) -> Result<()> {
        advance(&self.state);
        self.ctx.input.wait_for_key(Some(KeyCode::SPACE)).await?;
        {
            let mut surface = self.ctx.surface.lock();
            surface.hide(Element::Instructions);
            surface.show(Element::Baseline);
        }
        self.ctx.input.wait_for_key(None).await?;
        {
            let mut surface = self.ctx.surface.lock();
            surface.hide(Element::Baseline);
            surface.show(Element::Marker);
        }
        self.ctx.emit("baseline_begins", None);
        self.ctx.sleep_ms(self.config.baseline).await;
        self.ctx.emit("baseline_ends", None);
        self.ctx.surface.lock().hide(Element::Marker);
        Ok(())
    }

    async fn block(&mut self, block: usize) -> Result<()> {
        let n = self.config.n.for_block(block);
        advance(&self.state);
        self.session.begin_block(block);
        {
            let mut surface = self.ctx.surface.lock();
            surface.set_text(Element::ReadyLabel, &format!("n = {n}"));
            surface.show(Element::Ready);
        }
        self.ctx.input.wait_for_key(Some(KeyCode::SPACE)).await?;
        {
            let mut surface = self.ctx.surface.lock();
            surface.hide(Element::Ready);
            surface.show(Element::Symbol);
        }
        self.ctx.emit("block_begins", Some(json!({ "n": n })));
        tracing::info!(block, n, "block begins");

        let mut buffer = VecDeque::with_capacity(n + 1);
        for trial in 1..=self.config.trials {
            self.trial(block, trial, n, &mut buffer).await?;
        }

        enter(&self.state, NBackState::BlockEnd);
        self.ctx.emit("block_ends", None);
        self.ctx.surface.lock().hide(Element::Symbol);
        Ok(())
    }

    async fn trial(
        &mut self,
        block: usize,
        trial: usize,
        n: usize,
        buffer: &mut VecDeque<char>,
    ) -> Result<TrialRecord> {
        advance(&self.state);
        self.session.begin_trial(trial);
        self.ctx.sleep_ms(self.config.intertrial).await;

        let symbol = self.next_symbol(buffer, n);
        buffer.push_back(symbol);
        if buffer.len() > n + 1 {
            buffer.pop_front();
        }
        let full = buffer.len() == n + 1;
        let matched = full && buffer[0] == buffer[n];
        self.window.reset();
        self.ctx
            .emit("trial_begins", Some(json!({ "symbol": symbol.to_string() })));

        advance(&self.state);
        let onset = self
            .scheduler
            .asap({
                let ctx = self.ctx.clone();
                let window = Arc::clone(&self.window);
                move || {
                    ctx.surface.lock().set_text(Element::Symbol, &symbol.to_string());
                    let onset = ctx.timer.now();
                    if full {
                        window.arm(onset, matched);
                    }
                    ctx.emit("display_on", None);
                    onset
                }
            })
            .await?;
        self.ctx.sleep_ms(self.config.display).await;
        self.scheduler
            .asap({
                let ctx = self.ctx.clone();
                move || {
                    ctx.surface.lock().set_text(Element::Symbol, "");
                    ctx.emit("display_off", None);
                }
            })
            .await?;

        advance(&self.state);
        let remaining = Duration::from_millis(self.config.response)
            .saturating_sub(self.ctx.timer.elapsed(onset));
        self.ctx.timer.sleep(remaining).await;

        let scored = trial > n;
        let snapshot: Vec<String> = buffer.iter().map(char::to_string).collect();
        let (record, session) = self
            .scheduler
            .asap({
                let ctx = self.ctx.clone();
                let window = Arc::clone(&self.window);
                let state = Arc::clone(&self.state);
                let mut session = self.session;
                move || {
                    advance(&state);
                    let response = window.disarm();
                    ctx.surface.lock().clear_marks(Element::Symbol);
                    let result = response.map_or(Outcome::Timeout, |r| r.outcome);
                    if scored {
                        session.apply(result, matched);
                    }
                    let record = TrialRecord {
                        block,
                        trial,
                        symbol: symbol.to_string(),
                        buffer: snapshot,
                        matched,
                        presented_at_ns: onset,
                        responded_at_ns: response.map(|r| r.at_ns),
                        result,
                        response: response.map(|r| r.latency_ms()),
                        scored,
                        score: session.score,
                    };
                    match serde_json::to_value(&record) {
                        Ok(payload) => ctx.emit("trial_ends", Some(payload)),
                        Err(err) => tracing::error!(%err, "trial record not serializable"),
                    }
                    (record, session)
                }
            })
            .await?;
        self.session = session;
        tracing::debug!(
            block,
            trial,
            result = ?record.result,
            matched,
            session = record.score.session,
            "trial ends"
        );
        Ok(record)
    }

    /// Repeats the symbol `n` back with probability `p` once enough history
    /// exists, otherwise draws uniformly from the alphabet.
    fn next_symbol(&mut self, buffer: &VecDeque<char>, n: usize) -> char {
        if buffer.len() >= n && self.rng.random_bool(self.config.p) {
            return buffer[buffer.len() - n];
        }
        self.alphabet[self.rng.random_range(0..self.alphabet.len())]
    }

    fn spawn_listener(&self) -> TaskGuard {
        let mut rx = self.ctx.input.subscribe();
        let key = self.config.respond_key;
        let window = Arc::clone(&self.window);
        let state = Arc::clone(&self.state);
        let ctx = self.ctx.clone();
        TaskGuard(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) if ev.code == key && state.lock().allows_input() => {
                        let Some(response) = window.try_consume(ctx.timer.now()) else {
                            continue;
                        };
                        let mark = match response.outcome {
                            Outcome::Success => Mark::Correct,
                            _ => Mark::Incorrect,
                        };
                        ctx.surface.lock().mark(Element::Symbol, mark);
                        tracing::debug!(
                            latency_ms = response.latency_ms(),
                            outcome = ?response.outcome,
                            "response accepted"
                        );
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "response listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }
}

/// Moves to the successor in the nominal trial cycle
fn advance(state: &Mutex<NBackState>) {
    let mut state = state.lock();
    if let Some(next) = state.next() {
        tracing::debug!(from = state.name(), to = next.name(), "n-back transition");
        *state = next;
    }
}

/// Leaves the nominal cycle for a block or session end
fn enter(state: &Mutex<NBackState>, next: NBackState) {
    let mut state = state.lock();
    tracing::debug!(from = state.name(), to = next.name(), "n-back transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Recorder, Recording};
    use cadence_timing::{InputSource, MonotonicTimer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn context() -> (Context<MonotonicTimer>, Arc<Recorder>, Arc<Mutex<Recording>>) {
        let recorder = Arc::new(Recorder::new());
        let surface = Arc::new(Mutex::new(Recording::new()));
        let ctx = Context::new(
            recorder.clone(),
            surface.clone(),
            InputSource::new(),
            MonotonicTimer::new(),
        )
        .with_tick(Duration::from_millis(5));
        (ctx, recorder, surface)
    }

    #[test]
    fn invalid_configuration_fails_before_any_event() {
        let (ctx, recorder, _) = context();
        let config = NBackConfig {
            trials: 0,
            ..NBackConfig::default()
        };
        assert!(NBack::new(config, ctx, StdRng::seed_from_u64(1)).is_err());
        assert!(recorder.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn listener_only_answers_in_input_states() {
        let (ctx, _, surface) = context();
        let input = ctx.input.clone();
        let nback = NBack::new(NBackConfig::default(), ctx, StdRng::seed_from_u64(2)).unwrap();
        let _listener = nback.spawn_listener();
        nback.window.arm(0, true);

        enter(&nback.state, NBackState::Scoring);
        input.press(KeyCode::SPACE);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(nback.window.is_armed());

        enter(&nback.state, NBackState::ResponseWindow);
        input.press(KeyCode::SPACE);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!nback.window.is_armed());
        assert_eq!(
            nback.window.disarm().map(|r| r.outcome),
            Some(Outcome::Success)
        );
        assert!(surface
            .lock()
            .calls
            .contains(&cadence_core::SurfaceCall::Mark(Element::Symbol, Mark::Correct)));
    }

    #[test]
    fn states_follow_the_nominal_cycle() {
        let state = Mutex::new(NBackState::Idle);
        let mut seen = Vec::new();
        for _ in 0..7 {
            advance(&state);
            seen.push(*state.lock());
        }
        assert_eq!(
            seen,
            vec![
                NBackState::Baseline,
                NBackState::BlockReady,
                NBackState::Intertrial,
                NBackState::Display,
                NBackState::ResponseWindow,
                NBackState::Scoring,
                NBackState::Intertrial,
            ]
        );
        enter(&state, NBackState::BlockEnd);
        advance(&state);
        assert_eq!(*state.lock(), NBackState::BlockReady);
    }

    #[test]
    fn forced_repeats_copy_the_symbol_n_back() {
        let (ctx, _, _) = context();
        let config = NBackConfig {
            p: 1.0,
            symbols: "12".to_owned(),
            ..NBackConfig::default()
        };
        let mut nback = NBack::new(config, ctx, StdRng::seed_from_u64(3)).unwrap();
        let mut buffer = VecDeque::new();
        let mut shown = Vec::new();
        for _ in 0..10 {
            let symbol = nback.next_symbol(&buffer, 2);
            shown.push(symbol);
            buffer.push_back(symbol);
            if buffer.len() > 3 {
                buffer.pop_front();
            }
        }
        for i in 2..shown.len() {
            assert_eq!(shown[i], shown[i - 2]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_trials_are_not_scored() {
        let (ctx, recorder, _) = context();
        let input = ctx.input.clone();
        let config = NBackConfig {
            blocks: 1,
            trials: 3,
            n: crate::Lookback::Fixed(2),
            p: 1.0,
            intertrial: 100,
            symbols: "AB".to_owned(),
            ..NBackConfig::default()
        };
        let mut nback = NBack::new(config, ctx, StdRng::seed_from_u64(9)).unwrap();
        let run = tokio::spawn(async move { nback.run().await });
        for key in [KeyCode::SPACE, KeyCode::ENTER, KeyCode::SPACE] {
            tokio::time::sleep(Duration::from_millis(1)).await;
            input.press(key);
        }
        let score = run.await.unwrap().unwrap();

        let records: Vec<TrialRecord> = recorder
            .payloads("trial_ends")
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.result == Outcome::Timeout));
        assert_eq!(
            records.iter().map(|r| r.scored).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        // The third trial repeats the first, so the miss costs a point.
        assert!(records[2].matched);
        assert_eq!(score, Score { session: -1, block: -1 });
    }
}
