pub mod input;
pub mod scheduler;
pub mod timer;

pub use input::InputSource;
pub use scheduler::{Completion, Scheduler};
pub use timer::{CalibrationStats, MonotonicTimer, Timer};
