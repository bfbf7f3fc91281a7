//! Coarse-grained locks keyed by user and server channel.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::{error::SyncError, session::SessionId};

/// Composite key of a global lock.
pub fn key(user_id: &str, server_channel_id: &str) -> String {
    format!("{user_id}:{server_channel_id}")
}

/// Locks shared by every session of the process.
#[derive(Debug, Default)]
pub struct GlobalLockTable {
    locks: Mutex<HashMap<String, SessionId>>,
}

impl GlobalLockTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `(user_id, server_channel_id)`.
    ///
    /// Re-locking a key the session already holds succeeds.
    pub fn lock(&self, user_id: &str, server_channel_id: &str, session: SessionId) -> Result<String, SyncError> {
        let key = key(user_id, server_channel_id);
        let mut locks = self.locks.lock();
        match locks.get(&key) {
            Some(&holder) if holder != session => Err(SyncError::GlobalLockHeld { key, holder }),
            Some(_) => Ok(key),
            None => {
                locks.insert(key.clone(), session);
                debug!(%session, %key, "global lock taken");
                Ok(key)
            },
        }
    }

    /// Release every lock `session` holds. Returns the released keys, sorted.
    pub fn unlock_all(&self, session: SessionId) -> Vec<String> {
        let mut locks = self.locks.lock();
        let mut released: Vec<String> =
            locks.iter().filter(|&(_, &holder)| holder == session).map(|(key, _)| key.clone()).collect();
        for key in &released {
            locks.remove(key);
        }
        released.sort();
        released
    }

    /// Holder of `key`.
    pub fn holder(&self, key: &str) -> Option<SessionId> {
        self.locks.lock().get(key).copied()
    }

    /// Number of held locks.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// True when nothing is locked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_session_is_refused() {
        let table = GlobalLockTable::new();
        assert_eq!(table.lock("u1", "ch", SessionId(1)).unwrap(), "u1:ch");
        assert_eq!(table.lock("u1", "ch", SessionId(1)).unwrap(), "u1:ch");
        assert_eq!(
            table.lock("u1", "ch", SessionId(2)),
            Err(SyncError::GlobalLockHeld { key: "u1:ch".to_owned(), holder: SessionId(1) })
        );
        table.lock("u1", "other", SessionId(2)).unwrap();
    }

    #[test]
    fn unlock_all_only_touches_own_locks() {
        let table = GlobalLockTable::new();
        table.lock("a", "1", SessionId(1)).unwrap();
        table.lock("b", "1", SessionId(1)).unwrap();
        table.lock("c", "1", SessionId(2)).unwrap();

        assert_eq!(table.unlock_all(SessionId(1)), vec!["a:1", "b:1"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.holder("c:1"), Some(SessionId(2)));
        assert!(table.unlock_all(SessionId(1)).is_empty());
    }
}
