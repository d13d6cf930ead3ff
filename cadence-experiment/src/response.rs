use cadence_core::Outcome;
use parking_lot::Mutex;

/// A response accepted while the window was armed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    pub at_ns: u64,
    pub latency_ns: u64,
    pub outcome: Outcome,
}

impl Response {
    pub fn latency_ms(&self) -> f64 {
        self.latency_ns as f64 / 1e6
    }
}

#[derive(Debug, Default)]
struct WindowState {
    armed: bool,
    onset_ns: u64,
    target: bool,
    response: Option<Response>,
}

/// State shared between a sequencer and its input listener.
///
/// The listener only calls [`try_consume`](Self::try_consume); the sequencer
/// arms, and reads the response only through [`disarm`](Self::disarm). The
/// first response of an armed window wins and disarms it.
#[derive(Debug, Default)]
pub struct ResponseWindow {
    state: Mutex<WindowState>,
}

impl ResponseWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to "no response": disarmed with nothing captured
    pub fn reset(&self) {
        *self.state.lock() = WindowState::default();
    }

    /// Opens the window at `onset_ns`; `target` is the ground-truth flag
    pub fn arm(&self, onset_ns: u64, target: bool) {
        let mut state = self.state.lock();
        state.armed = true;
        state.onset_ns = onset_ns;
        state.target = target;
        state.response = None;
    }

    /// Accepts a response if armed. Success when the ground truth is a match.
    pub fn try_consume(&self, now_ns: u64) -> Option<Response> {
        let mut state = self.state.lock();
        if !state.armed {
            return None;
        }
        state.armed = false;
        let response = Response {
            at_ns: now_ns,
            latency_ns: now_ns.saturating_sub(state.onset_ns),
            outcome: if state.target {
                Outcome::Success
            } else {
                Outcome::Failure
            },
        };
        state.response = Some(response);
        Some(response)
    }

    /// Closes the window and hands over whatever was captured
    pub fn disarm(&self) -> Option<Response> {
        let mut state = self.state.lock();
        state.armed = false;
        state.response.take()
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }
}
