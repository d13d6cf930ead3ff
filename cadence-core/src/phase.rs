/// Defines protocol phases and their behavior
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    /// Whether a response key is meaningful in this phase
    fn allows_input(&self) -> bool;
    fn next(&self) -> Option<Self>;
    fn name(&self) -> &'static str;
}

/// States of the n-back sequencer
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum NBackState {
    #[default]
    Idle,
    Baseline,
    BlockReady,
    Intertrial,
    Display,
    ResponseWindow,
    Scoring,
    BlockEnd,
    SessionEnd,
}

impl Phase for NBackState {
    fn allows_input(&self) -> bool {
        matches!(self, Self::Display | Self::ResponseWindow)
    }

    /// Successor inside the nominal cycle. Leaving `Scoring` for `BlockEnd`
    /// and `BlockEnd` for `SessionEnd` is decided by the sequencer.
    fn next(&self) -> Option<Self> {
        use NBackState::*;
        Some(match self {
            Idle => Baseline,
            Baseline => BlockReady,
            BlockReady => Intertrial,
            Intertrial => Display,
            Display => ResponseWindow,
            ResponseWindow => Scoring,
            Scoring => Intertrial,
            BlockEnd => BlockReady,
            SessionEnd => return None,
        })
    }

    fn name(&self) -> &'static str {
        use NBackState::*;
        match self {
            Idle => "idle",
            Baseline => "baseline",
            BlockReady => "block_ready",
            Intertrial => "intertrial",
            Display => "display",
            ResponseWindow => "response_window",
            Scoring => "scoring",
            BlockEnd => "block_end",
            SessionEnd => "session_end",
        }
    }
}

/// Phases of a training run, in execution order
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum TrainingPhase {
    #[default]
    Baseline,
    Motor,
    Blink,
}

impl Phase for TrainingPhase {
    fn allows_input(&self) -> bool {
        false
    }

    fn next(&self) -> Option<Self> {
        use TrainingPhase::*;
        match self {
            Baseline => Some(Motor),
            Motor => Some(Blink),
            Blink => None,
        }
    }

    /// Event prefix: `<name>_begins` / `<name>_ends`
    fn name(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Motor => "motor-training",
            Self::Blink => "blink-training",
        }
    }
}
