use cadence_core::{Error, KeyCode, KeyEvent, Result};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

const CAPACITY: usize = 64;

/// Fan-out of key events to every live listener.
///
/// Presses are only seen by listeners subscribed at the time of the press.
#[derive(Debug, Clone)]
pub struct InputSource {
    tx: broadcast::Sender<KeyEvent>,
    closed: Arc<watch::Sender<bool>>,
}

impl InputSource {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            closed: Arc::new(closed),
        }
    }

    pub fn press(&self, code: KeyCode) {
        tracing::trace!(%code, "key pressed");
        // No listener at this instant means nobody cares about the key.
        let _ = self.tx.send(KeyEvent { code });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KeyEvent> {
        self.tx.subscribe()
    }

    /// Marks the source as exhausted; pending and future waits fail
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Suspends until a key matching `code` is pressed, or any key if `None`
    pub async fn wait_for_key(&self, code: Option<KeyCode>) -> Result<KeyCode> {
        let mut rx = self.tx.subscribe();
        let mut closed = self.closed.subscribe();
        loop {
            if *closed.borrow_and_update() {
                return Err(Error::InputClosed);
            }
            tokio::select! {
                res = rx.recv() => match res {
                    Ok(ev) if code.is_none_or(|c| c == ev.code) => return Ok(ev.code),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "key listener lagged");
                    }
                    Err(RecvError::Closed) => return Err(Error::InputClosed),
                },
                changed = closed.changed() => {
                    if changed.is_err() {
                        return Err(Error::InputClosed);
                    }
                }
            }
        }
    }
}

impl Default for InputSource {
    fn default() -> Self {
        Self::new()
    }
}
