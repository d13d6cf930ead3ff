pub mod error;
pub mod event;
pub mod key;
pub mod merge;
pub mod phase;
pub mod surface;
pub mod trial;

pub use error::{Error, Result};
pub use event::{Event, EventEmitter, Recorder, TracingEmitter};
pub use key::{KeyCode, KeyEvent};
pub use merge::merge;
pub use phase::{NBackState, Phase, TrainingPhase};
pub use surface::{Element, Highlight, Mark, MediaKind, Recording, Surface, SurfaceCall};
pub use trial::{Outcome, Score, TrialRecord};
