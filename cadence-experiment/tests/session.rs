use cadence_core::{
    Element, Error, EventEmitter, KeyCode, Outcome, Recorder, Recording, Score, TrialRecord,
};
use cadence_experiment::{Context, Lookback, NBack, NBackConfig};
use cadence_timing::{InputSource, MonotonicTimer};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Records events and answers every symbol 100 ms after it appears
struct Participant {
    recorder: Arc<Recorder>,
    input: InputSource,
}

impl EventEmitter for Participant {
    fn emit(&self, name: &str, payload: Option<Value>) {
        self.recorder.emit(name, payload);
        if name == "display_on" {
            let input = self.input.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(100)).await;
                input.press(KeyCode::SPACE);
            });
        }
    }
}

struct Rig {
    ctx: Context<MonotonicTimer>,
    recorder: Arc<Recorder>,
    surface: Arc<Mutex<Recording>>,
}

fn rig(answering: bool) -> Rig {
    let recorder = Arc::new(Recorder::new());
    let surface = Arc::new(Mutex::new(Recording::new()));
    let input = InputSource::new();
    let emitter: Arc<dyn EventEmitter> = if answering {
        Arc::new(Participant {
            recorder: recorder.clone(),
            input: input.clone(),
        })
    } else {
        recorder.clone()
    };
    let ctx = Context::new(emitter, surface.clone(), input, MonotonicTimer::new())
        .with_tick(Duration::from_millis(5));
    Rig {
        ctx,
        recorder,
        surface,
    }
}

fn config() -> NBackConfig {
    NBackConfig {
        blocks: 1,
        trials: 4,
        n: Lookback::Fixed(2),
        p: 1.0,
        baseline: 200,
        intertrial: 100,
        symbols: "12".to_owned(),
        ..NBackConfig::default()
    }
}

/// Gets past the instructions, the baseline prompt and the block prompt
async fn start(input: &InputSource) {
    for at in [10, 10, 300] {
        sleep(Duration::from_millis(at)).await;
        input.press(KeyCode::SPACE);
    }
}

#[tokio::test(start_paused = true)]
async fn full_session_scores_timely_answers() {
    let rig = rig(true);
    let input = rig.ctx.input.clone();
    let mut nback = NBack::new(config(), rig.ctx.clone(), StdRng::seed_from_u64(11)).unwrap();
    let run = tokio::spawn(async move { nback.run().await });
    start(&input).await;
    let score = run.await.unwrap().unwrap();

    let names = rig.recorder.names();
    assert_eq!(names.first().map(String::as_str), Some("session_begins"));
    assert_eq!(names.last().map(String::as_str), Some("session_ends"));
    assert_eq!(rig.recorder.count("session_begins"), 1);
    assert_eq!(rig.recorder.count("session_ends"), 1);
    assert_eq!(rig.recorder.count("baseline_begins"), 1);
    assert_eq!(
        rig.recorder.payloads("block_begins"),
        vec![serde_json::json!({"n": 2})]
    );

    let trial_events: Vec<_> = names
        .iter()
        .filter(|n| {
            matches!(
                n.as_str(),
                "trial_begins" | "display_on" | "display_off" | "trial_ends"
            )
        })
        .cloned()
        .collect();
    assert_eq!(
        trial_events,
        ["trial_begins", "display_on", "display_off", "trial_ends"].repeat(4)
    );

    let records: Vec<TrialRecord> = rig
        .recorder
        .payloads("trial_ends")
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect();
    assert_eq!(records.len(), 4);
    for i in 2..records.len() {
        assert_eq!(records[i].symbol, records[i - 2].symbol);
        assert!(records[i].matched);
        assert!(records[i].scored);
        assert_eq!(records[i].result, Outcome::Success);
        let latency = records[i].response.unwrap();
        assert!((latency - 100.0).abs() < 1.0, "latency {latency}");
    }
    // Warm-up trials have no armed window, so presses are ignored.
    for record in &records[..2] {
        assert_eq!(record.result, Outcome::Timeout);
        assert!(record.response.is_none());
        assert!(!record.scored);
    }
    assert_eq!(score, Score { session: 2, block: 2 });
    assert!(rig.surface.lock().is_visible(Element::Instructions));
}

#[tokio::test(start_paused = true)]
async fn aborted_session_still_ends_once() {
    let rig = rig(false);
    let mut nback = NBack::new(config(), rig.ctx.clone(), StdRng::seed_from_u64(1)).unwrap();
    let run = tokio::spawn(async move { nback.run().await });
    sleep(Duration::from_millis(50)).await;
    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());

    assert_eq!(rig.recorder.names(), vec!["session_begins", "session_ends"]);
}

#[tokio::test(start_paused = true)]
async fn closed_input_ends_the_session_with_an_error() {
    let rig = rig(false);
    let input = rig.ctx.input.clone();
    let mut nback = NBack::new(config(), rig.ctx.clone(), StdRng::seed_from_u64(1)).unwrap();
    let run = tokio::spawn(async move { nback.run().await });
    sleep(Duration::from_millis(10)).await;
    input.close();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::InputClosed));
    assert_eq!(rig.recorder.count("session_ends"), 1);
}
