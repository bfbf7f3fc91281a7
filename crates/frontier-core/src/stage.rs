//! Stage table: membership, reservations, locks and binary side-table.
//!
//! A stage is a named room. Sessions occupy it either as members (entered)
//! or as reservers (holding a slot before entering). Admission counts the
//! union of both against `max_players`, so membership can never exceed the
//! player cap.
//!
//! # Presence
//!
//! Each session is a member of at most one stage and holds at most one
//! reservation. Entering from another stage pushes the stage being left
//! onto a per-session history and locks it; `BACK_STAGE` unlocks it and pops.
//! Moving while the history is unlocked resets it to the stage being left,
//! so a client bouncing between stages keeps a single entry. The history
//! never holds more than [`HISTORY_DEPTH`] entries; the oldest is dropped.
//!
//! # Lifetime
//!
//! A stage is collected when its last member leaves and no reservation
//! remains, when its host destructs it, or when its host disconnects while
//! it is empty. Collection drops the stage's publish channel, which wakes
//! every `WAIT_STAGE_BINARY` waiter with an error.
//!
//! # Binaries
//!
//! Blobs are keyed by `(type0, type1)`. Every publish bumps a
//! [`watch`] counter; waiters subscribe under the table lock, so a publish
//! that lands between lookup and subscription is never missed.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::{config::SyncConfig, error::SyncError, session::SessionId};

/// Most stage ids remembered for `BACK_STAGE` per session.
pub const HISTORY_DEPTH: usize = 8;

/// `(type0, type1)` key of a stage binary.
pub type BinaryKey = (u8, u8);

/// Snapshot of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    /// Identifier
    pub id: String,
    /// Creator; the only session allowed to lock or destruct
    pub host: Option<SessionId>,
    /// Player cap
    pub max_players: u16,
    /// Entered sessions, ascending
    pub members: Vec<SessionId>,
    /// Reserving sessions with their ready flag, ascending
    pub reservations: Vec<(SessionId, bool)>,
    /// Refuses entry and new reservations
    pub locked: bool,
    /// Reservation requires a password
    pub has_password: bool,
}

impl StageInfo {
    /// Sessions occupying a slot: members plus reservers, counted once.
    pub fn occupancy(&self) -> usize {
        let reserved_only =
            self.reservations.iter().filter(|(session, _)| !self.members.contains(session)).count();
        self.members.len() + reserved_only
    }
}

/// Result of entering, moving or going back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transfer {
    /// Stage the session was a member of before, if any
    pub left: Option<String>,
    /// Target stage was created by this transfer
    pub created: bool,
}

/// Where a `SET_STAGE_PASS` password ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordTarget {
    /// Applied to the hosted, reserved stage
    Stage(String),
    /// Remembered for the session's next reservation
    Pending,
}

/// Stage-binary lookup for a waiter.
#[derive(Debug)]
pub enum BinaryLookup {
    /// Already published
    Ready(Bytes),
    /// Not yet published; resolves when the counter changes
    Pending(watch::Receiver<u64>),
}

/// What a disconnect removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageDeparture {
    /// Stage the session was a member of
    pub left: Option<String>,
    /// Stage the session had reserved
    pub unreserved: Option<String>,
    /// Empty hosted stages collected with the session
    pub collected: Vec<String>,
}

#[derive(Debug)]
struct Stage {
    host: Option<SessionId>,
    max_players: u16,
    members: BTreeSet<SessionId>,
    reservations: BTreeMap<SessionId, bool>,
    locked: bool,
    password: Option<String>,
    binaries: HashMap<BinaryKey, Bytes>,
    published: watch::Sender<u64>,
}

impl Stage {
    fn new(host: SessionId, max_players: u16) -> Self {
        let (published, _) = watch::channel(0);
        Self {
            host: Some(host),
            max_players,
            members: BTreeSet::new(),
            reservations: BTreeMap::new(),
            locked: false,
            password: None,
            binaries: HashMap::new(),
            published,
        }
    }

    fn holds_slot(&self, session: SessionId) -> bool {
        self.members.contains(&session) || self.reservations.contains_key(&session)
    }

    fn occupancy(&self) -> usize {
        self.members.len() + self.reservations.keys().filter(|s| !self.members.contains(*s)).count()
    }

    fn admits(&self, session: SessionId) -> bool {
        self.holds_slot(session) || self.occupancy() < usize::from(self.max_players)
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty() && self.reservations.is_empty()
    }

    fn require_host(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        if self.host == Some(session) {
            Ok(())
        } else {
            Err(SyncError::NotHost { id: id.to_owned(), session })
        }
    }

    fn info(&self, id: &str) -> StageInfo {
        StageInfo {
            id: id.to_owned(),
            host: self.host,
            max_players: self.max_players,
            members: self.members.iter().copied().collect(),
            reservations: self.reservations.iter().map(|(&s, &ready)| (s, ready)).collect(),
            locked: self.locked,
            has_password: self.password.is_some(),
        }
    }
}

/// How a transfer touches the session's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryUpdate {
    /// `ENTER_STAGE`: push the stage left and lock the history
    Push,
    /// `MOVE_STAGE`: replace an unlocked history with the stage left
    Reset,
    /// `BACK_STAGE`: already popped
    Keep,
}

#[derive(Debug, Default)]
struct Presence {
    current: Option<String>,
    history: VecDeque<String>,
    history_locked: bool,
    reserved: Option<String>,
    pending_password: Option<String>,
}

impl Presence {
    fn record(&mut self, update: HistoryUpdate, left: Option<&str>) {
        match update {
            HistoryUpdate::Push => match left {
                Some(previous) => {
                    if self.history.len() == HISTORY_DEPTH {
                        self.history.pop_front();
                    }
                    self.history.push_back(previous.to_owned());
                    self.history_locked = true;
                },
                None => self.history.clear(),
            },
            HistoryUpdate::Reset if !self.history_locked => {
                self.history.clear();
                self.history.extend(left.map(str::to_owned));
            },
            HistoryUpdate::Reset | HistoryUpdate::Keep => {},
        }
    }

    fn is_idle(&self) -> bool {
        self.current.is_none()
            && self.history.is_empty()
            && self.reserved.is_none()
            && self.pending_password.is_none()
    }
}

#[derive(Debug, Default)]
struct Inner {
    stages: HashMap<String, Stage>,
    presence: HashMap<SessionId, Presence>,
}

impl Inner {
    fn stage(&self, id: &str) -> Result<&Stage, SyncError> {
        self.stages.get(id).ok_or_else(|| SyncError::StageNotFound(id.to_owned()))
    }

    fn stage_mut(&mut self, id: &str) -> Result<&mut Stage, SyncError> {
        self.stages.get_mut(id).ok_or_else(|| SyncError::StageNotFound(id.to_owned()))
    }

    fn collect_if_empty(&mut self, id: &str) -> bool {
        let empty = self.stages.get(id).is_some_and(Stage::is_empty);
        if empty {
            self.stages.remove(id);
            debug!(stage = id, "collected empty stage");
        }
        empty
    }

    /// Remove `session` from the members of its current stage.
    fn leave(&mut self, session: SessionId) -> Option<String> {
        let id = self.presence.get_mut(&session)?.current.take()?;
        if let Some(stage) = self.stages.get_mut(&id) {
            stage.members.remove(&session);
        }
        self.collect_if_empty(&id);
        Some(id)
    }

    /// Drop the reservation `session` holds, if any.
    fn unreserve(&mut self, session: SessionId) -> Option<String> {
        let id = self.presence.get_mut(&session)?.reserved.take()?;
        if let Some(stage) = self.stages.get_mut(&id) {
            stage.reservations.remove(&session);
        }
        self.collect_if_empty(&id);
        Some(id)
    }

    fn forget_if_idle(&mut self, session: SessionId) {
        if self.presence.get(&session).is_some_and(Presence::is_idle) {
            self.presence.remove(&session);
        }
    }
}

/// Process-wide stage table.
#[derive(Debug)]
pub struct StageTable {
    default_capacity: u16,
    auto_create: bool,
    inner: Mutex<Inner>,
}

impl Default for StageTable {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

impl StageTable {
    /// Empty table using the stage defaults of `config`.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            default_capacity: config.default_stage_capacity,
            auto_create: config.auto_create_stages,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// `CREATE_STAGE`: new empty stage hosted by `session`.
    pub fn create(&self, id: &str, max_players: u16, session: SessionId) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        if inner.stages.contains_key(id) {
            return Err(SyncError::StageExists(id.to_owned()));
        }
        inner.stages.insert(id.to_owned(), Stage::new(session, max_players));
        debug!(%session, stage = id, max_players, "stage created");
        Ok(())
    }

    /// `ENTER_STAGE`: become a member of `id`.
    pub fn enter(&self, id: &str, session: SessionId) -> Result<Transfer, SyncError> {
        self.inner.lock().transfer(id, session, self.auto_create, self.default_capacity, HistoryUpdate::Push)
    }

    /// `MOVE_STAGE`: same admission as entering.
    pub fn move_to(&self, id: &str, session: SessionId) -> Result<Transfer, SyncError> {
        self.inner.lock().transfer(id, session, self.auto_create, self.default_capacity, HistoryUpdate::Reset)
    }

    /// `BACK_STAGE`: return to the stage left most recently.
    ///
    /// Unlocks the history. A failed return puts the popped entry back.
    pub fn back(&self, session: SessionId) -> Result<(String, Transfer), SyncError> {
        let mut inner = self.inner.lock();
        let target = inner
            .presence
            .get_mut(&session)
            .and_then(|presence| {
                presence.history_locked = false;
                presence.history.pop_back()
            })
            .ok_or(SyncError::NoPreviousStage)?;
        match inner.transfer(&target, session, self.auto_create, self.default_capacity, HistoryUpdate::Keep) {
            Ok(transfer) => Ok((target, transfer)),
            Err(err) => {
                inner.presence.entry(session).or_default().history.push_back(target);
                Err(err)
            },
        }
    }

    /// Stages `BACK_STAGE` would return to, most recent last.
    pub fn history(&self, session: SessionId) -> Vec<String> {
        let inner = self.inner.lock();
        inner.presence.get(&session).map(|p| p.history.iter().cloned().collect()).unwrap_or_default()
    }

    /// `LEAVE_STAGE`: stop being a member of the current stage.
    pub fn leave(&self, session: SessionId) -> Option<String> {
        let mut inner = self.inner.lock();
        let left = inner.leave(session);
        inner.forget_if_idle(session);
        left
    }

    /// `LOCK_STAGE`: host-only.
    pub fn lock(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.set_locked(id, session, true)
    }

    /// `UNLOCK_STAGE`: host-only.
    pub fn unlock(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.set_locked(id, session, false)
    }

    fn set_locked(&self, id: &str, session: SessionId, locked: bool) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let stage = inner.stage_mut(id)?;
        stage.require_host(id, session)?;
        stage.locked = locked;
        debug!(%session, stage = id, locked, "stage lock changed");
        Ok(())
    }

    /// `RESERVE_STAGE`: hold a slot in `id`, replacing any other reservation.
    ///
    /// Re-reserving the same stage only updates the ready flag.
    pub fn reserve(&self, id: &str, ready: bool, session: SessionId) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let pending = inner.presence.get(&session).and_then(|p| p.pending_password.clone());

        let stage = inner.stage_mut(id)?;
        if let Some(flag) = stage.reservations.get_mut(&session) {
            *flag = ready;
            return Ok(());
        }
        if stage.locked {
            return Err(SyncError::StageLocked(id.to_owned()));
        }
        if stage.password.is_some() && stage.password != pending {
            return Err(SyncError::WrongPassword(id.to_owned()));
        }
        if !stage.admits(session) {
            return Err(SyncError::StageFull { id: id.to_owned(), max_players: stage.max_players });
        }
        stage.reservations.insert(session, ready);

        let previous = inner.unreserve(session);
        let presence = inner.presence.entry(session).or_default();
        presence.reserved = Some(id.to_owned());
        presence.pending_password = None;
        debug!(%session, stage = id, ready, ?previous, "stage reserved");
        Ok(())
    }

    /// `UNRESERVE_STAGE`: give the reserved slot back.
    pub fn unreserve(&self, session: SessionId) -> Option<String> {
        let mut inner = self.inner.lock();
        let released = inner.unreserve(session);
        inner.forget_if_idle(session);
        released
    }

    /// `SET_STAGE_PASS`.
    ///
    /// Applies to the stage `session` has reserved when it hosts that stage;
    /// otherwise the password is kept for the session's next reservation.
    /// An empty password clears the stage password.
    pub fn set_password(&self, password: &str, session: SessionId) -> PasswordTarget {
        let mut inner = self.inner.lock();
        let reserved = inner.presence.get(&session).and_then(|p| p.reserved.clone());
        if let Some(id) = reserved
            && let Some(stage) = inner.stages.get_mut(&id)
            && stage.host == Some(session)
        {
            stage.password = (!password.is_empty()).then(|| password.to_owned());
            return PasswordTarget::Stage(id);
        }
        inner.presence.entry(session).or_default().pending_password = Some(password.to_owned());
        PasswordTarget::Pending
    }

    /// `SET_STAGE_BINARY`: publish a blob and wake its waiters.
    pub fn set_binary(&self, id: &str, key: BinaryKey, data: Bytes) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let stage = inner.stage_mut(id)?;
        stage.binaries.insert(key, data);
        stage.published.send_modify(|version| *version = version.wrapping_add(1));
        Ok(())
    }

    /// `GET_STAGE_BINARY`: `None` when the key was never published.
    pub fn binary(&self, id: &str, key: BinaryKey) -> Result<Option<Bytes>, SyncError> {
        let inner = self.inner.lock();
        Ok(inner.stage(id)?.binaries.get(&key).cloned())
    }

    /// Lookup for `WAIT_STAGE_BINARY`.
    pub fn subscribe_binary(&self, id: &str, key: BinaryKey) -> Result<BinaryLookup, SyncError> {
        let inner = self.inner.lock();
        let stage = inner.stage(id)?;
        Ok(match stage.binaries.get(&key) {
            Some(data) => BinaryLookup::Ready(data.clone()),
            None => BinaryLookup::Pending(stage.published.subscribe()),
        })
    }

    /// `STAGE_DESTRUCT`: host-only removal.
    ///
    /// Returns the members and reservers to notify, excluding the caller.
    pub fn destruct(&self, id: &str, session: SessionId) -> Result<Vec<SessionId>, SyncError> {
        let mut inner = self.inner.lock();
        inner.stage(id)?.require_host(id, session)?;
        let Some(stage) = inner.stages.remove(id) else {
            return Err(SyncError::StageNotFound(id.to_owned()));
        };

        let occupants: BTreeSet<SessionId> =
            stage.members.iter().chain(stage.reservations.keys()).copied().collect();
        for occupant in &occupants {
            if let Some(presence) = inner.presence.get_mut(occupant) {
                if presence.current.as_deref() == Some(id) {
                    presence.current = None;
                }
                if presence.reserved.as_deref() == Some(id) {
                    presence.reserved = None;
                }
            }
            inner.forget_if_idle(*occupant);
        }
        debug!(%session, stage = id, occupants = occupants.len(), "stage destructed");
        Ok(occupants.into_iter().filter(|&occupant| occupant != session).collect())
    }

    /// `ENUMERATE_STAGE`: occupied stages whose id starts with `prefix`,
    /// sorted by id.
    pub fn enumerate(&self, prefix: &str) -> Vec<StageInfo> {
        let inner = self.inner.lock();
        let mut listed: Vec<StageInfo> = inner
            .stages
            .iter()
            .filter(|(id, stage)| id.starts_with(prefix) && !stage.is_empty())
            .map(|(id, stage)| stage.info(id))
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        listed
    }

    /// Snapshot of `id`.
    pub fn get(&self, id: &str) -> Option<StageInfo> {
        self.inner.lock().stages.get(id).map(|stage| stage.info(id))
    }

    /// Stage `session` is a member of.
    pub fn current_stage(&self, session: SessionId) -> Option<String> {
        self.inner.lock().presence.get(&session).and_then(|p| p.current.clone())
    }

    /// Stage `session` has reserved.
    pub fn reservation(&self, session: SessionId) -> Option<String> {
        self.inner.lock().presence.get(&session).and_then(|p| p.reserved.clone())
    }

    /// Number of live stages.
    pub fn len(&self) -> usize {
        self.inner.lock().stages.len()
    }

    /// True when no stages are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leave, unreserve and forget `session` in one critical section.
    pub fn disconnect(&self, session: SessionId) -> StageDeparture {
        let mut inner = self.inner.lock();
        let left = inner.leave(session);
        let unreserved = inner.unreserve(session);
        inner.presence.remove(&session);

        let mut collected: Vec<String> = inner
            .stages
            .iter()
            .filter(|(_, stage)| stage.host == Some(session) && stage.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        collected.sort();
        for id in &collected {
            inner.stages.remove(id);
        }
        StageDeparture { left, unreserved, collected }
    }
}

impl Inner {
    fn transfer(
        &mut self,
        id: &str,
        session: SessionId,
        auto_create: bool,
        default_capacity: u16,
        update: HistoryUpdate,
    ) -> Result<Transfer, SyncError> {
        let current = self.presence.get(&session).and_then(|p| p.current.clone());
        if current.as_deref() == Some(id) {
            return Ok(Transfer::default());
        }

        let created = match self.stages.get(id) {
            Some(stage) => {
                if stage.locked {
                    return Err(SyncError::StageLocked(id.to_owned()));
                }
                if !stage.admits(session) {
                    return Err(SyncError::StageFull { id: id.to_owned(), max_players: stage.max_players });
                }
                false
            },
            None if auto_create => {
                self.stages.insert(id.to_owned(), Stage::new(session, default_capacity));
                true
            },
            None => return Err(SyncError::StageNotFound(id.to_owned())),
        };

        let left = self.leave(session);
        let stage = self.stage_mut(id)?;
        stage.members.insert(session);
        let consumed_reservation = stage.reservations.remove(&session).is_some();

        let presence = self.presence.entry(session).or_default();
        if consumed_reservation {
            presence.reserved = None;
        }
        presence.record(update, left.as_deref());
        presence.current = Some(id.to_owned());
        debug!(%session, stage = id, ?left, created, "stage entered");
        Ok(Transfer { left, created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: SessionId = SessionId(1);
    const GUEST: SessionId = SessionId(2);
    const THIRD: SessionId = SessionId(3);

    fn table() -> StageTable {
        StageTable::default()
    }

    #[test]
    fn enter_auto_creates_with_host() {
        let stages = table();
        let transfer = stages.enter("sl1Ns200p0a0u0", HOST).unwrap();
        assert!(transfer.created);
        let info = stages.get("sl1Ns200p0a0u0").unwrap();
        assert_eq!(info.host, Some(HOST));
        assert_eq!(info.members, vec![HOST]);
        assert_eq!(info.max_players, 4);
    }

    #[test]
    fn enter_unknown_without_auto_create_fails() {
        let config = SyncConfig { auto_create_stages: false, ..SyncConfig::default() };
        let stages = StageTable::new(&config);
        assert_eq!(stages.enter("x", HOST), Err(SyncError::StageNotFound("x".to_owned())));
    }

    #[test]
    fn reenter_is_noop() {
        let stages = table();
        stages.enter("a", HOST).unwrap();
        assert_eq!(stages.enter("a", HOST).unwrap(), Transfer::default());
        assert_eq!(stages.get("a").unwrap().members, vec![HOST]);
    }

    #[test]
    fn moving_leaves_previous_and_collects_it() {
        let stages = table();
        stages.enter("a", HOST).unwrap();
        let transfer = stages.move_to("b", HOST).unwrap();
        assert_eq!(transfer.left.as_deref(), Some("a"));
        assert!(stages.get("a").is_none());
        assert_eq!(stages.current_stage(HOST).as_deref(), Some("b"));
    }

    #[test]
    fn back_returns_to_previous() {
        let stages = table();
        stages.enter("a", HOST).unwrap();
        stages.enter("a", GUEST).unwrap();
        stages.move_to("b", HOST).unwrap();

        let (target, transfer) = stages.back(HOST).unwrap();
        assert_eq!(target, "a");
        assert_eq!(transfer.left.as_deref(), Some("b"));
        assert_eq!(stages.back(HOST), Err(SyncError::NoPreviousStage));
    }

    #[test]
    fn failed_back_keeps_history() {
        let stages = table();
        stages.enter("a", HOST).unwrap();
        stages.enter("a", GUEST).unwrap();
        stages.move_to("b", HOST).unwrap();

        // HOST still hosts "a" after leaving it.
        stages.lock("a", HOST).unwrap();
        assert_eq!(stages.back(HOST), Err(SyncError::StageLocked("a".to_owned())));
        assert_eq!(stages.current_stage(HOST).as_deref(), Some("b"));

        stages.unlock("a", HOST).unwrap();
        assert_eq!(stages.back(HOST).unwrap().0, "a");
    }

    #[test]
    fn moving_back_and_forth_keeps_one_entry() {
        let stages = table();
        stages.enter("a", HOST).unwrap();
        for _ in 0..50 {
            stages.move_to("b", HOST).unwrap();
            stages.move_to("a", HOST).unwrap();
        }
        assert_eq!(stages.history(HOST), vec!["b"]);

        assert_eq!(stages.back(HOST).unwrap().0, "b");
        assert_eq!(stages.back(HOST), Err(SyncError::NoPreviousStage));
    }

    #[test]
    fn entering_locks_history_against_moves() {
        let stages = table();
        stages.enter("town", HOST).unwrap();
        stages.enter("quest", HOST).unwrap();
        stages.move_to("area1", HOST).unwrap();
        stages.move_to("area2", HOST).unwrap();
        assert_eq!(stages.history(HOST), vec!["town"]);

        assert_eq!(stages.back(HOST).unwrap().0, "town");
        // Unlocked again: the next move resets the history.
        stages.move_to("market", HOST).unwrap();
        assert_eq!(stages.history(HOST), vec!["town"]);
        stages.move_to("hall", HOST).unwrap();
        assert_eq!(stages.history(HOST), vec!["market"]);
    }

    #[test]
    fn history_depth_is_bounded() {
        let stages = table();
        stages.enter("s0", HOST).unwrap();
        for i in 1..=HISTORY_DEPTH * 3 {
            stages.enter(&format!("s{i}"), HOST).unwrap();
        }
        assert_eq!(stages.history(HOST).len(), HISTORY_DEPTH);

        let mut returns = 0;
        while stages.back(HOST).is_ok() {
            returns += 1;
            assert!(returns <= HISTORY_DEPTH * 2, "back() never ran dry");
        }
        assert_eq!(returns, HISTORY_DEPTH);
    }

    #[test]
    fn full_stage_rejects_entry() {
        let stages = table();
        stages.create("room", 2, HOST).unwrap();
        stages.enter("room", HOST).unwrap();
        stages.enter("room", GUEST).unwrap();
        assert_eq!(
            stages.enter("room", THIRD),
            Err(SyncError::StageFull { id: "room".to_owned(), max_players: 2 })
        );
    }

    #[test]
    fn locked_stage_rejects_entry_and_reservation() {
        let stages = table();
        stages.create("room", 4, HOST).unwrap();
        stages.enter("room", HOST).unwrap();
        stages.lock("room", HOST).unwrap();

        assert_eq!(stages.enter("room", GUEST), Err(SyncError::StageLocked("room".to_owned())));
        assert_eq!(stages.reserve("room", false, GUEST), Err(SyncError::StageLocked("room".to_owned())));
    }

    #[test]
    fn only_host_locks() {
        let stages = table();
        stages.create("room", 4, HOST).unwrap();
        assert_eq!(
            stages.lock("room", GUEST),
            Err(SyncError::NotHost { id: "room".to_owned(), session: GUEST })
        );
    }

    #[test]
    fn reservations_count_against_capacity() {
        let stages = table();
        stages.create("quest", 2, HOST).unwrap();
        stages.reserve("quest", false, HOST).unwrap();
        stages.reserve("quest", true, GUEST).unwrap();
        assert!(matches!(stages.reserve("quest", false, THIRD), Err(SyncError::StageFull { .. })));
        assert!(matches!(stages.enter("quest", THIRD), Err(SyncError::StageFull { .. })));

        // Reserved sessions keep their slot when entering.
        stages.enter("quest", GUEST).unwrap();
        let info = stages.get("quest").unwrap();
        assert_eq!(info.members, vec![GUEST]);
        assert_eq!(info.occupancy(), 2);
        assert_eq!(stages.reservation(GUEST), None);
    }

    #[test]
    fn reserve_again_updates_ready_flag() {
        let stages = table();
        stages.create("quest", 4, HOST).unwrap();
        stages.reserve("quest", false, GUEST).unwrap();
        stages.reserve("quest", true, GUEST).unwrap();
        assert_eq!(stages.get("quest").unwrap().reservations, vec![(GUEST, true)]);
    }

    #[test]
    fn reserving_elsewhere_releases_old_slot() {
        let stages = table();
        stages.create("a", 4, HOST).unwrap();
        stages.create("b", 4, HOST).unwrap();
        stages.reserve("a", false, GUEST).unwrap();
        stages.reserve("b", false, GUEST).unwrap();
        assert!(stages.get("a").is_none());
        assert_eq!(stages.reservation(GUEST).as_deref(), Some("b"));
    }

    #[test]
    fn password_gates_reservation() {
        let stages = table();
        stages.create("quest", 4, HOST).unwrap();
        stages.reserve("quest", false, HOST).unwrap();
        assert_eq!(stages.set_password("hunt", HOST), PasswordTarget::Stage("quest".to_owned()));
        assert!(stages.get("quest").unwrap().has_password);

        assert_eq!(stages.reserve("quest", false, GUEST), Err(SyncError::WrongPassword("quest".to_owned())));
        assert_eq!(stages.set_password("nope", GUEST), PasswordTarget::Pending);
        assert!(stages.reserve("quest", false, GUEST).is_err());
        stages.set_password("hunt", GUEST);
        stages.reserve("quest", false, GUEST).unwrap();
    }

    #[test]
    fn unreserve_collects_empty_stage() {
        let stages = table();
        stages.create("quest", 4, HOST).unwrap();
        stages.reserve("quest", false, GUEST).unwrap();
        assert_eq!(stages.unreserve(GUEST).as_deref(), Some("quest"));
        assert!(stages.is_empty());
        assert_eq!(stages.unreserve(GUEST), None);
    }

    #[test]
    fn destruct_notifies_everyone_but_host() {
        let stages = table();
        stages.create("quest", 4, HOST).unwrap();
        stages.enter("quest", HOST).unwrap();
        stages.enter("quest", GUEST).unwrap();
        stages.reserve("quest", false, THIRD).unwrap();

        assert!(matches!(stages.destruct("quest", GUEST), Err(SyncError::NotHost { .. })));
        assert_eq!(stages.destruct("quest", HOST).unwrap(), vec![GUEST, THIRD]);
        assert!(stages.is_empty());
        assert_eq!(stages.current_stage(GUEST), None);
        assert_eq!(stages.reservation(THIRD), None);
    }

    #[test]
    fn binaries_publish_and_lookup() {
        let stages = table();
        stages.enter("room", HOST).unwrap();
        assert_eq!(stages.binary("room", (1, 2)).unwrap(), None);
        assert!(matches!(stages.subscribe_binary("room", (1, 2)).unwrap(), BinaryLookup::Pending(_)));

        stages.set_binary("room", (1, 2), Bytes::from_static(b"blob")).unwrap();
        assert_eq!(stages.binary("room", (1, 2)).unwrap(), Some(Bytes::from_static(b"blob")));
        assert!(matches!(stages.subscribe_binary("room", (1, 2)).unwrap(), BinaryLookup::Ready(_)));
        assert_eq!(stages.binary("gone", (1, 2)), Err(SyncError::StageNotFound("gone".to_owned())));
    }

    #[test]
    fn publish_marks_subscriber_changed() {
        let stages = table();
        stages.enter("room", HOST).unwrap();
        let BinaryLookup::Pending(rx) = stages.subscribe_binary("room", (0, 0)).unwrap() else {
            panic!("expected pending lookup");
        };
        assert!(!rx.has_changed().unwrap());
        stages.set_binary("room", (0, 0), Bytes::from_static(b"x")).unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn enumerate_filters_by_prefix_and_occupancy() {
        let stages = table();
        stages.enter("sl2Qs1", HOST).unwrap();
        stages.enter("sl2Qs2", GUEST).unwrap();
        stages.enter("sl1Ns200", THIRD).unwrap();
        stages.create("sl2Qs3", 4, THIRD).unwrap();

        let ids: Vec<String> = stages.enumerate("sl2Qs").into_iter().map(|info| info.id).collect();
        assert_eq!(ids, vec!["sl2Qs1", "sl2Qs2"]);
        assert_eq!(stages.enumerate("").len(), 3);
    }

    #[test]
    fn disconnect_clears_presence_and_hosted_empty_stages() {
        let stages = table();
        stages.enter("lobby", HOST).unwrap();
        stages.enter("lobby", GUEST).unwrap();
        stages.create("mine", 4, HOST).unwrap();
        stages.create("quest", 4, GUEST).unwrap();
        stages.reserve("quest", true, HOST).unwrap();

        let departure = stages.disconnect(HOST);
        assert_eq!(departure.left.as_deref(), Some("lobby"));
        assert_eq!(departure.unreserved.as_deref(), Some("quest"));
        assert_eq!(departure.collected, vec!["mine"]);
        assert_eq!(stages.get("lobby").unwrap().members, vec![GUEST]);
        assert!(stages.get("quest").is_none());
    }
}
