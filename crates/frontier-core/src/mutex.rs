//! Named exclusive locks.
//!
//! A mutex is a semaphore with exactly one slot. Opening a mutex another
//! session holds fails immediately; there is no queue.

use crate::{
    error::SyncError,
    semaphore::{Grant, SemaphoreInfo, SemaphoreTable},
    session::SessionId,
};

/// Table backing the `*_MUTEX` opcode family.
#[derive(Debug)]
pub struct MutexTable {
    inner: SemaphoreTable,
}

impl Default for MutexTable {
    fn default() -> Self {
        Self { inner: SemaphoreTable::new("mutex") }
    }
}

impl MutexTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// `CREATE_MUTEX`: make `id` exist without taking it.
    pub fn create(&self, id: &str, session: SessionId) -> u32 {
        self.inner.create(id, 1, session)
    }

    /// `CREATE_OPEN_MUTEX`: make `id` exist and take it.
    pub fn create_open(&self, id: &str, session: SessionId) -> Result<Grant, SyncError> {
        self.inner.create_acquire(id, 1, session)
    }

    /// `OPEN_MUTEX`: take an existing mutex.
    pub fn open(&self, id: &str, session: SessionId) -> Result<Grant, SyncError> {
        self.inner.acquire(id, session)
    }

    /// `CLOSE_MUTEX`: give the mutex back.
    pub fn close(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.inner.release(id, session)
    }

    /// `DELETE_MUTEX`: remove the mutex unless someone else holds it.
    pub fn delete(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.inner.delete(id, session)
    }

    /// Drop every mutex reference of `session`.
    pub fn release_all(&self, session: SessionId) -> Vec<String> {
        self.inner.release_all(session)
    }

    /// Snapshot of `id`.
    pub fn get(&self, id: &str) -> Option<SemaphoreInfo> {
        self.inner.get(id)
    }

    /// Current holder of `id`.
    pub fn holder(&self, id: &str) -> Option<SessionId> {
        self.inner.get(id).and_then(|info| info.holders.first().copied())
    }

    /// Number of live mutexes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no mutexes are live.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
