use cadence_core::{Element, EventEmitter, Highlight, Mark, MediaKind, Surface};
use cadence_timing::Timer;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::Write;

/// Writes one `{"t", "event", "data"}` object per line, stamped with the
/// timer's clock.
pub struct JsonLines<W, T> {
    out: Mutex<W>,
    timer: T,
}

impl<W: Write + Send, T: Timer> JsonLines<W, T> {
    pub fn new(out: W, timer: T) -> Self {
        Self {
            out: Mutex::new(out),
            timer,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send, T: Timer> EventEmitter for JsonLines<W, T> {
    fn emit(&self, name: &str, payload: Option<Value>) {
        let line = json!({
            "t": self.timer.now(),
            "event": name,
            "data": payload,
        });
        let mut out = self.out.lock();
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::error!(%err, event = name, "event sink write failed");
        }
    }
}

/// Presentation surface that narrates every call to the log
#[derive(Debug, Default)]
pub struct LogSurface;

impl Surface for LogSurface {
    fn show(&mut self, element: Element) {
        tracing::info!(target: "surface", ?element, "show");
    }

    fn hide(&mut self, element: Element) {
        tracing::info!(target: "surface", ?element, "hide");
    }

    fn set_text(&mut self, element: Element, text: &str) {
        tracing::info!(target: "surface", ?element, text, "text");
    }

    fn mark(&mut self, element: Element, mark: Mark) {
        tracing::info!(target: "surface", ?element, ?mark, "mark");
    }

    fn clear_marks(&mut self, element: Element) {
        tracing::debug!(target: "surface", ?element, "clear marks");
    }

    fn load_media(&mut self, index: usize, kind: MediaKind, path: &str) {
        tracing::info!(target: "surface", index, ?kind, path, "load media");
    }

    fn play(&mut self, index: usize) {
        tracing::info!(target: "surface", index, "play");
    }

    fn rewind(&mut self, index: usize) {
        tracing::debug!(target: "surface", index, "rewind");
    }

    fn highlight(&mut self, element: Element, style: Highlight) {
        tracing::debug!(target: "surface", ?element, ?style, "highlight");
    }

    fn clear_highlights(&mut self) {
        tracing::trace!(target: "surface", "clear highlights");
    }

    fn opacity(&mut self, element: Element, value: f32) {
        tracing::debug!(target: "surface", ?element, value, "opacity");
    }

    fn announce(&mut self, text: &str) {
        tracing::info!(target: "surface", text, "announce");
    }
}
