use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use thresher_session::{ProtocolMessage, SessionKind};

/// Stable key for "one session per (wallet, kind)" (spec §9's Open
/// Question, confirmed in DESIGN.md: only one active session per pair).
pub type SessionKey = (String, SessionKind);

/// A running session's handle, held by the arena. The Room never holds a
/// direct reference into the session task — only this handle, modeled as
/// an arena entry per spec §9's "cyclic references... arena + handle" note.
pub struct SessionHandle {
    pub inbound: mpsc::Sender<ProtocolMessage>,
    pub task: JoinHandle<()>,
}

impl SessionHandle {
    /// Drop the handle's task, cancelling the session. Per spec §4.3, a
    /// session has no internal timeout; callers abandon a stalled session
    /// by dropping (aborting) its handle.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Owns every live session by its `(wallet, kind)` key.
#[derive(Default)]
pub struct SessionArena {
    sessions: HashMap<SessionKey, SessionHandle>,
}

impl SessionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Insert a new session, rejecting a second concurrent one for the same
    /// key (spec §1 non-goal: no concurrent signing sessions per wallet).
    pub fn insert(&mut self, key: SessionKey, handle: SessionHandle) -> Result<(), SessionHandle> {
        if self.sessions.contains_key(&key) {
            return Err(handle);
        }
        self.sessions.insert(key, handle);
        Ok(())
    }

    pub fn remove(&mut self, key: &SessionKey) -> Option<SessionHandle> {
        self.sessions.remove(key)
    }

    pub fn inbound_sender(&self, key: &SessionKey) -> Option<mpsc::Sender<ProtocolMessage>> {
        self.sessions.get(key).map(|h| h.inbound.clone())
    }

    /// Abort and drop every session, e.g. on Room shutdown.
    pub fn abort_all(&mut self) {
        for (_, handle) in self.sessions.drain() {
            handle.abort();
        }
    }
}
