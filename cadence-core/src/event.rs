use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named lifecycle event with an optional payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Sink for lifecycle and trial events.
///
/// Emission is fire-and-forget: sequencers never wait for an acknowledgement,
/// so implementations must not block.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, name: &str, payload: Option<Value>);
}

impl<E: EventEmitter + ?Sized> EventEmitter for std::sync::Arc<E> {
    fn emit(&self, name: &str, payload: Option<Value>) {
        (**self).emit(name, payload)
    }
}

/// Keeps every emitted event in memory
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name == name).count()
    }

    /// Payloads of every event called `name`, in emission order
    pub fn payloads(&self, name: &str) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.payload.clone().unwrap_or(Value::Null))
            .collect()
    }
}

impl EventEmitter for Recorder {
    fn emit(&self, name: &str, payload: Option<Value>) {
        self.events.lock().push(Event {
            name: name.to_owned(),
            payload,
        });
    }
}

/// Forwards events to the `events` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

impl EventEmitter for TracingEmitter {
    fn emit(&self, name: &str, payload: Option<Value>) {
        match payload {
            Some(data) => tracing::info!(target: "events", event = name, %data),
            None => tracing::info!(target: "events", event = name),
        }
    }
}
