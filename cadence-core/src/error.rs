use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the sequencing core
#[derive(Debug, Error)]
pub enum Error {
    /// Balanced sequence consumed past its length
    #[error("balanced sequence exhausted")]
    ExhaustedSequence,

    /// Rejected before any event is emitted
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `asap` after `stop`, or a task dropped by `stop`
    #[error("scheduler misuse: {0}")]
    SchedulerMisuse(String),

    #[error("input source closed")]
    InputClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Configuration errors must surface before a session starts
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::InvalidConfiguration(_) | Error::Json(_))
    }
}
