use cadence_core::{EventEmitter, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Brackets a session with `session_begins` / `session_ends`.
///
/// `session_ends` is emitted exactly once: on [`end`](Self::end), or when the
/// guard is dropped because the session was torn down.
pub struct SessionGuard {
    emitter: Arc<dyn EventEmitter>,
    ended: AtomicBool,
}

impl SessionGuard {
    pub fn begin<C: Serialize>(emitter: Arc<dyn EventEmitter>, config: &C) -> Result<Self> {
        let payload = serde_json::to_value(config)?;
        emitter.emit("session_begins", Some(payload));
        tracing::info!("session begins");
        Ok(Self {
            emitter,
            ended: AtomicBool::new(false),
        })
    }

    /// Runs `session` between `session_begins` and `session_ends`.
    ///
    /// Dropping the returned future mid-run still emits `session_ends`.
    pub async fn scope<C, F, T>(
        emitter: Arc<dyn EventEmitter>,
        config: &C,
        session: F,
    ) -> Result<T>
    where
        C: Serialize,
        F: Future<Output = Result<T>>,
    {
        let guard = Self::begin(emitter, config)?;
        let result = session.await;
        guard.end();
        result
    }

    pub fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.emitter.emit("session_ends", None);
            tracing::info!("session ends");
        }
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.end();
    }
}
