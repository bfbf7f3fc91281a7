//! Connected sessions and their outbound queues.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use frontier_core::SessionId;
use frontier_proto::Frame;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Outbound queue of one session.
pub type Outbox = mpsc::Sender<Frame>;

/// Every live session, addressable by id.
#[derive(Debug)]
pub struct SessionRegistry {
    next_id: AtomicU32,
    sessions: Mutex<HashMap<SessionId, Outbox>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self { next_id: AtomicU32::new(1), sessions: Mutex::new(HashMap::new()) }
    }
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a fresh id to a new connection.
    pub fn register(&self, outbox: Outbox) -> SessionId {
        let session = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sessions.lock().insert(session, outbox);
        session
    }

    /// Forget a session. Its queue closes once every clone is dropped.
    pub fn unregister(&self, session: SessionId) -> bool {
        self.sessions.lock().remove(&session).is_some()
    }

    /// Queue `frame` for `session` without waiting.
    ///
    /// A full or closed queue drops the frame and returns `false`.
    pub fn send(&self, session: SessionId, frame: Frame) -> bool {
        let Some(outbox) = self.sessions.lock().get(&session).cloned() else {
            return false;
        };
        match outbox.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!(%session, error = %e, "dropping notification");
                false
            },
        }
    }

    /// True when `session` is connected.
    pub fn contains(&self, session: SessionId) -> bool {
        self.sessions.lock().contains_key(&session)
    }

    /// Number of connected sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// True when nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
