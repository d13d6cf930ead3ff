use cadence_core::{Outcome, Score};

/// Score delta of a scored trial: a failure, or a missed match, costs one
/// point; everything else earns one.
pub fn score_delta(outcome: Outcome, matched: bool) -> i32 {
    match outcome {
        Outcome::Failure => -1,
        Outcome::Timeout if matched => -1,
        _ => 1,
    }
}

/// Session bookkeeping of a single protocol run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub score: Score,
    /// 1-based, 0 before the first block
    pub block: usize,
    /// 1-based within the block, 0 before the first trial
    pub trial: usize,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_block(&mut self, block: usize) {
        self.block = block;
        self.trial = 0;
        self.score.block = 0;
    }

    pub fn begin_trial(&mut self, trial: usize) {
        self.trial = trial;
    }

    /// Applies a trial result to both counters
    pub fn apply(&mut self, outcome: Outcome, matched: bool) -> i32 {
        let delta = score_delta(outcome, matched);
        self.score.block += delta;
        self.score.session += delta;
        delta
    }
}
