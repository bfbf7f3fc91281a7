//! Named semaphore table.
//!
//! A semaphore admits up to `capacity` distinct sessions. The whole table
//! sits behind one lock, so create-if-absent followed by admission is a
//! single critical section and two sessions racing to create the same name
//! can never both be admitted past the cap.
//!
//! # Lifetime
//!
//! An entry is referenced by its holders and, when created without being
//! acquired, by its creator. It is removed the moment neither remains:
//! the last holder releases, the creator deletes it, or either disconnects.
//!
//! Each entry carries a server-issued `u32` handle so clients can later
//! refer to it without the name.

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use tracing::debug;

use crate::{error::SyncError, session::SessionId};

/// Outcome of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Handle of the semaphore
    pub handle: u32,
    /// `false` when the session already held it
    pub newly_admitted: bool,
}

/// Snapshot of one semaphore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemaphoreInfo {
    /// Identifier
    pub id: String,
    /// Server-issued handle
    pub handle: u32,
    /// Holder capacity
    pub capacity: u32,
    /// Current holders, ascending
    pub holders: Vec<SessionId>,
    /// Creator still referencing an unacquired entry
    pub owner: Option<SessionId>,
}

#[derive(Debug)]
struct Entry {
    handle: u32,
    capacity: u32,
    holders: BTreeSet<SessionId>,
    owner: Option<SessionId>,
}

impl Entry {
    fn is_unreferenced(&self) -> bool {
        self.holders.is_empty() && self.owner.is_none()
    }

    fn drop_session(&mut self, session: SessionId) -> bool {
        let held = self.holders.remove(&session);
        let owned = self.owner == Some(session);
        if owned {
            self.owner = None;
        }
        held || owned
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    handles: HashMap<u32, String>,
    next_handle: u32,
}

/// Next free non-zero handle. Skips values still in use after wrap-around.
fn allocate_handle(next_handle: &mut u32, handles: &HashMap<u32, String>) -> u32 {
    loop {
        *next_handle = next_handle.wrapping_add(1);
        if *next_handle != 0 && !handles.contains_key(next_handle) {
            return *next_handle;
        }
    }
}

impl Inner {
    fn entry_or_insert(&mut self, id: &str, capacity: u32, owner: Option<SessionId>) -> &mut Entry {
        let Self { entries, handles, next_handle } = self;
        entries.entry(id.to_owned()).or_insert_with(|| {
            let handle = allocate_handle(next_handle, handles);
            handles.insert(handle, id.to_owned());
            Entry { handle, capacity, holders: BTreeSet::new(), owner }
        })
    }

    fn collect_if_unreferenced(&mut self, kind: &'static str, id: &str) -> bool {
        let unreferenced = self.entries.get(id).is_some_and(Entry::is_unreferenced);
        if unreferenced && let Some(entry) = self.entries.remove(id) {
            self.handles.remove(&entry.handle);
            debug!(kind, id, handle = entry.handle, "collected unreferenced entry");
        }
        unreferenced
    }
}

fn admit(kind: &'static str, id: &str, entry: &mut Entry, session: SessionId) -> Result<Grant, SyncError> {
    if entry.holders.contains(&session) {
        return Ok(Grant { handle: entry.handle, newly_admitted: false });
    }
    if entry.holders.len() >= entry.capacity as usize {
        return Err(SyncError::Full { kind, id: id.to_owned(), capacity: entry.capacity });
    }
    entry.holders.insert(session);
    Ok(Grant { handle: entry.handle, newly_admitted: true })
}

/// Process-wide table of named admission-control resources.
#[derive(Debug)]
pub struct SemaphoreTable {
    kind: &'static str,
    inner: Mutex<Inner>,
}

impl Default for SemaphoreTable {
    fn default() -> Self {
        Self::new("semaphore")
    }
}

impl SemaphoreTable {
    /// Empty table. `kind` names the resource family in errors and logs.
    pub fn new(kind: &'static str) -> Self {
        Self { kind, inner: Mutex::new(Inner::default()) }
    }

    /// Create `id` if absent, owned by `creator` until it is acquired.
    ///
    /// An existing entry keeps its capacity; its handle is returned.
    pub fn create(&self, id: &str, capacity: u32, creator: SessionId) -> u32 {
        let mut inner = self.inner.lock();
        let entry = inner.entry_or_insert(id, capacity, Some(creator));
        entry.handle
    }

    /// Create `id` if absent and admit `session`, atomically.
    pub fn create_acquire(&self, id: &str, capacity: u32, session: SessionId) -> Result<Grant, SyncError> {
        let mut inner = self.inner.lock();
        let entry = inner.entry_or_insert(id, capacity, None);
        let grant = admit(self.kind, id, entry, session);
        // A fresh entry that refused admission (capacity 0) must not linger.
        inner.collect_if_unreferenced(self.kind, id);
        grant
    }

    /// Admit `session` to an existing semaphore.
    pub fn acquire(&self, id: &str, session: SessionId) -> Result<Grant, SyncError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| SyncError::NotFound { kind: self.kind, id: id.to_owned() })?;
        admit(self.kind, id, entry, session)
    }

    /// Remove `session` from the holders of `id`.
    pub fn release(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| SyncError::NotFound { kind: self.kind, id: id.to_owned() })?;
        if !entry.holders.remove(&session) {
            return Err(SyncError::NotHolder { kind: self.kind, id: id.to_owned(), session });
        }
        inner.collect_if_unreferenced(self.kind, id);
        Ok(())
    }

    /// Drop every reference `session` has on the semaphore with `handle`.
    ///
    /// Returns the identifier of the semaphore.
    pub fn release_handle(&self, handle: u32, session: SessionId) -> Result<String, SyncError> {
        let mut inner = self.inner.lock();
        let id = inner.handles.get(&handle).cloned().ok_or(SyncError::UnknownHandle(handle))?;
        let released = inner.entries.get_mut(&id).is_some_and(|entry| entry.drop_session(session));
        if !released {
            return Err(SyncError::NotHolder { kind: self.kind, id, session });
        }
        inner.collect_if_unreferenced(self.kind, &id);
        Ok(id)
    }

    /// Remove `id` outright.
    ///
    /// Fails with [`SyncError::Busy`] while anyone other than `session`
    /// holds it, and with [`SyncError::NotHolder`] when `session` neither
    /// owns nor holds it.
    pub fn delete(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get(id)
            .ok_or_else(|| SyncError::NotFound { kind: self.kind, id: id.to_owned() })?;
        if entry.holders.iter().any(|&holder| holder != session) {
            return Err(SyncError::Busy { kind: self.kind, id: id.to_owned() });
        }
        if entry.owner != Some(session) && !entry.holders.contains(&session) {
            return Err(SyncError::NotHolder { kind: self.kind, id: id.to_owned(), session });
        }
        if let Some(entry) = inner.entries.remove(id) {
            inner.handles.remove(&entry.handle);
        }
        Ok(())
    }

    /// Drop every reference `session` holds. Returns the affected ids.
    pub fn release_all(&self, session: SessionId) -> Vec<String> {
        let mut inner = self.inner.lock();
        let mut affected: Vec<String> = inner
            .entries
            .iter_mut()
            .filter_map(|(id, entry)| entry.drop_session(session).then(|| id.clone()))
            .collect();
        affected.sort();
        for id in &affected {
            inner.collect_if_unreferenced(self.kind, id);
        }
        affected
    }

    /// Snapshot of `id`, if it exists.
    pub fn get(&self, id: &str) -> Option<SemaphoreInfo> {
        let inner = self.inner.lock();
        inner.entries.get(id).map(|entry| SemaphoreInfo {
            id: id.to_owned(),
            handle: entry.handle,
            capacity: entry.capacity,
            holders: entry.holders.iter().copied().collect(),
            owner: entry.owner,
        })
    }

    /// True when `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().entries.contains_key(id)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when no entries are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
