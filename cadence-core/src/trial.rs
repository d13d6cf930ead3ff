use serde::{Deserialize, Serialize};

/// Classification of a finished trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    #[default]
    Timeout,
}

/// Session and block score counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub session: i32,
    pub block: i32,
}

/// Finalized record of one trial, emitted with `trial_ends`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub block: usize,
    pub trial: usize,
    pub symbol: String,
    /// Trailing symbol buffer, oldest first
    pub buffer: Vec<String>,
    #[serde(rename = "match")]
    pub matched: bool,
    pub presented_at_ns: u64,
    pub responded_at_ns: Option<u64>,
    pub result: Outcome,
    /// Milliseconds between display onset and the accepted response
    pub response: Option<f64>,
    pub scored: bool,
    pub score: Score,
}

impl TrialRecord {
    pub fn latency_ms(&self) -> Option<f64> {
        self.response
    }
}
