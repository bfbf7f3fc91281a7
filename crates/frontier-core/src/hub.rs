//! One façade over every sync table.
//!
//! [`SyncHub`] is shared by all connections of a server process. It
//! validates client-supplied identifiers against [`SyncConfig`], forwards
//! to the individual tables and performs disconnect cleanup across all of
//! them in one call.

use std::{collections::HashMap, pin::pin};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::SyncConfig,
    env::Environment,
    error::SyncError,
    global_lock::GlobalLockTable,
    mutex::MutexTable,
    semaphore::{Grant, SemaphoreInfo, SemaphoreTable},
    session::SessionId,
    stage::{BinaryKey, BinaryLookup, PasswordTarget, StageDeparture, StageInfo, StageTable, Transfer},
};

/// Length of an issued log key.
pub const LOG_KEY_LEN: usize = 16;

/// Everything a disconnect released.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisconnectReport {
    /// Semaphores the session held or created
    pub semaphores: Vec<String>,
    /// Mutexes the session held or created
    pub mutexes: Vec<String>,
    /// Global lock keys the session held
    pub global_locks: Vec<String>,
    /// Stage membership and reservation removed
    pub stage: StageDeparture,
}

impl DisconnectReport {
    /// True when the session held nothing.
    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
            && self.mutexes.is_empty()
            && self.global_locks.is_empty()
            && self.stage == StageDeparture::default()
    }
}

/// Shared sync state of one server process.
#[derive(Debug)]
pub struct SyncHub<E: Environment> {
    config: SyncConfig,
    env: E,
    semaphores: SemaphoreTable,
    mutexes: MutexTable,
    global_locks: GlobalLockTable,
    stages: StageTable,
    log_keys: Mutex<HashMap<SessionId, [u8; LOG_KEY_LEN]>>,
}

impl<E: Environment> SyncHub<E> {
    /// Empty hub.
    pub fn new(config: SyncConfig, env: E) -> Self {
        let stages = StageTable::new(&config);
        Self {
            config,
            env,
            semaphores: SemaphoreTable::default(),
            mutexes: MutexTable::new(),
            global_locks: GlobalLockTable::new(),
            stages,
            log_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Active limits.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Injected environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Semaphore table.
    pub fn semaphores(&self) -> &SemaphoreTable {
        &self.semaphores
    }

    /// Mutex table.
    pub fn mutexes(&self) -> &MutexTable {
        &self.mutexes
    }

    /// Global lock table.
    pub fn global_locks(&self) -> &GlobalLockTable {
        &self.global_locks
    }

    /// Stage table.
    pub fn stages(&self) -> &StageTable {
        &self.stages
    }

    fn check_id(&self, kind: &'static str, id: &str) -> Result<(), SyncError> {
        if id.is_empty() {
            return Err(SyncError::EmptyIdentifier { kind });
        }
        if id.len() > self.config.max_identifier_len {
            return Err(SyncError::IdentifierTooLong {
                kind,
                len: id.len(),
                max: self.config.max_identifier_len,
            });
        }
        Ok(())
    }

    // Semaphores

    /// `CREATE_SEMAPHORE`. Returns the semaphore handle.
    pub fn create_semaphore(&self, id: &str, max_holders: u32, session: SessionId) -> Result<u32, SyncError> {
        self.check_id("semaphore", id)?;
        let handle = self.semaphores.create(id, self.config.semaphore_capacity(max_holders), session);
        debug!(%session, semaphore = id, handle, "semaphore created");
        Ok(handle)
    }

    /// `CREATE_ACQUIRE_SEMAPHORE`: create if absent and admit, atomically.
    pub fn create_acquire_semaphore(
        &self,
        id: &str,
        max_holders: u32,
        session: SessionId,
    ) -> Result<Grant, SyncError> {
        self.check_id("semaphore", id)?;
        let grant = self.semaphores.create_acquire(id, self.config.semaphore_capacity(max_holders), session)?;
        debug!(%session, semaphore = id, handle = grant.handle, "semaphore acquired");
        Ok(grant)
    }

    /// `ACQUIRE_SEMAPHORE`.
    pub fn acquire_semaphore(&self, id: &str, session: SessionId) -> Result<Grant, SyncError> {
        self.check_id("semaphore", id)?;
        let grant = self.semaphores.acquire(id, session)?;
        debug!(%session, semaphore = id, handle = grant.handle, "semaphore acquired");
        Ok(grant)
    }

    /// `RELEASE_SEMAPHORE`.
    pub fn release_semaphore(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.check_id("semaphore", id)?;
        self.semaphores.release(id, session)?;
        debug!(%session, semaphore = id, "semaphore released");
        Ok(())
    }

    /// `DELETE_SEMAPHORE`: drop the caller's references by handle.
    pub fn delete_semaphore(&self, handle: u32, session: SessionId) -> Result<String, SyncError> {
        let id = self.semaphores.release_handle(handle, session)?;
        debug!(%session, semaphore = %id, handle, "semaphore handle released");
        Ok(id)
    }

    /// `CHECK_SEMAPHORE`: current state of `id`, if it exists.
    pub fn check_semaphore(&self, id: &str) -> Result<Option<SemaphoreInfo>, SyncError> {
        self.check_id("semaphore", id)?;
        Ok(self.semaphores.get(id))
    }

    // Mutexes

    /// `CREATE_MUTEX`.
    pub fn create_mutex(&self, id: &str, session: SessionId) -> Result<u32, SyncError> {
        self.check_id("mutex", id)?;
        Ok(self.mutexes.create(id, session))
    }

    /// `CREATE_OPEN_MUTEX`.
    pub fn create_open_mutex(&self, id: &str, session: SessionId) -> Result<Grant, SyncError> {
        self.check_id("mutex", id)?;
        self.mutexes.create_open(id, session)
    }

    /// `OPEN_MUTEX`.
    pub fn open_mutex(&self, id: &str, session: SessionId) -> Result<Grant, SyncError> {
        self.check_id("mutex", id)?;
        self.mutexes.open(id, session)
    }

    /// `CLOSE_MUTEX`.
    pub fn close_mutex(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.check_id("mutex", id)?;
        self.mutexes.close(id, session)
    }

    /// `DELETE_MUTEX`.
    pub fn delete_mutex(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.check_id("mutex", id)?;
        self.mutexes.delete(id, session)
    }

    // Global locks

    /// `LOCK_GLOBAL_SEMA`. Returns the lock key.
    pub fn lock_global(&self, user_id: &str, server_channel_id: &str, session: SessionId) -> Result<String, SyncError> {
        self.check_id("global lock", user_id)?;
        self.global_locks.lock(user_id, server_channel_id, session)
    }

    /// `UNLOCK_GLOBAL_SEMA`: release every global lock of `session`.
    pub fn unlock_global(&self, session: SessionId) -> Vec<String> {
        self.global_locks.unlock_all(session)
    }

    // Stages

    /// `CREATE_STAGE`.
    pub fn create_stage(&self, id: &str, player_count: u16, session: SessionId) -> Result<(), SyncError> {
        self.check_id("stage", id)?;
        self.stages.create(id, self.config.stage_capacity(player_count), session)
    }

    /// `ENTER_STAGE`.
    pub fn enter_stage(&self, id: &str, session: SessionId) -> Result<Transfer, SyncError> {
        self.check_id("stage", id)?;
        self.stages.enter(id, session)
    }

    /// `MOVE_STAGE`.
    pub fn move_stage(&self, id: &str, session: SessionId) -> Result<Transfer, SyncError> {
        self.check_id("stage", id)?;
        self.stages.move_to(id, session)
    }

    /// `BACK_STAGE`.
    pub fn back_stage(&self, session: SessionId) -> Result<(String, Transfer), SyncError> {
        self.stages.back(session)
    }

    /// `LEAVE_STAGE`.
    pub fn leave_stage(&self, session: SessionId) -> Option<String> {
        self.stages.leave(session)
    }

    /// `LOCK_STAGE`.
    pub fn lock_stage(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.check_id("stage", id)?;
        self.stages.lock(id, session)
    }

    /// `UNLOCK_STAGE`.
    pub fn unlock_stage(&self, id: &str, session: SessionId) -> Result<(), SyncError> {
        self.check_id("stage", id)?;
        self.stages.unlock(id, session)
    }

    /// `RESERVE_STAGE`.
    pub fn reserve_stage(&self, id: &str, ready: bool, session: SessionId) -> Result<(), SyncError> {
        self.check_id("stage", id)?;
        self.stages.reserve(id, ready, session)
    }

    /// `UNRESERVE_STAGE`.
    pub fn unreserve_stage(&self, session: SessionId) -> Option<String> {
        self.stages.unreserve(session)
    }

    /// `SET_STAGE_PASS`.
    pub fn set_stage_password(&self, password: &str, session: SessionId) -> PasswordTarget {
        self.stages.set_password(password, session)
    }

    /// `STAGE_DESTRUCT`. Returns the sessions to notify.
    pub fn destruct_stage(&self, id: &str, session: SessionId) -> Result<Vec<SessionId>, SyncError> {
        self.check_id("stage", id)?;
        let notify = self.stages.destruct(id, session)?;
        info!(%session, stage = id, notified = notify.len(), "stage destructed");
        Ok(notify)
    }

    /// `ENUMERATE_STAGE`. An empty prefix lists every occupied stage.
    pub fn enumerate_stages(&self, prefix: &str) -> Vec<StageInfo> {
        self.stages.enumerate(prefix)
    }

    /// `SET_STAGE_BINARY`.
    pub fn set_stage_binary(&self, id: &str, key: BinaryKey, data: Bytes) -> Result<(), SyncError> {
        self.check_id("stage", id)?;
        self.stages.set_binary(id, key, data)
    }

    /// `GET_STAGE_BINARY`. An unpublished key yields an empty buffer.
    pub fn get_stage_binary(&self, id: &str, key: BinaryKey) -> Result<Bytes, SyncError> {
        self.check_id("stage", id)?;
        Ok(self.stages.binary(id, key)?.unwrap_or_default())
    }

    /// `WAIT_STAGE_BINARY`: resolve once `key` is published.
    ///
    /// Fails after the configured timeout, or when the stage is destroyed
    /// while waiting.
    pub async fn wait_stage_binary(&self, id: &str, key: BinaryKey) -> Result<Bytes, SyncError> {
        self.check_id("stage", id)?;
        let mut published = match self.stages.subscribe_binary(id, key)? {
            BinaryLookup::Ready(data) => return Ok(data),
            BinaryLookup::Pending(rx) => rx,
        };

        let timeout = self.config.stage_binary_wait_timeout();
        let mut deadline = pin!(self.env.sleep(timeout));
        loop {
            tokio::select! {
                changed = published.changed() => {
                    if changed.is_err() {
                        return Err(SyncError::StageDestroyed(id.to_owned()));
                    }
                    if let Some(data) = self.stages.binary(id, key)? {
                        return Ok(data);
                    }
                }
                () = &mut deadline => {
                    warn!(stage = id, type0 = key.0, type1 = key.1, ?timeout, "stage binary wait timed out");
                    return Err(SyncError::BinaryWaitTimedOut { id: id.to_owned(), type0: key.0, type1: key.1 });
                }
            }
        }
    }

    // Sessions

    /// `ISSUE_LOG_KEY`: fresh random key remembered for `session`.
    pub fn issue_log_key(&self, session: SessionId) -> [u8; LOG_KEY_LEN] {
        let mut key = [0u8; LOG_KEY_LEN];
        self.env.random_bytes(&mut key);
        self.log_keys.lock().insert(session, key);
        key
    }

    /// Last log key issued to `session`.
    pub fn log_key(&self, session: SessionId) -> Option<[u8; LOG_KEY_LEN]> {
        self.log_keys.lock().get(&session).copied()
    }

    /// Release everything `session` holds: stage membership and reservation,
    /// semaphores, mutexes, global locks and its log key.
    pub fn disconnect(&self, session: SessionId) -> DisconnectReport {
        let report = DisconnectReport {
            stage: self.stages.disconnect(session),
            semaphores: self.semaphores.release_all(session),
            mutexes: self.mutexes.release_all(session),
            global_locks: self.global_locks.unlock_all(session),
        };
        self.log_keys.lock().remove(&session);
        if !report.is_empty() {
            info!(%session, ?report, "released session resources");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::env::SystemEnv;

    fn hub() -> SyncHub<SystemEnv> {
        SyncHub::new(SyncConfig::default(), SystemEnv)
    }

    #[test]
    fn identifiers_are_validated() {
        let config = SyncConfig { max_identifier_len: 4, ..SyncConfig::default() };
        let hub = SyncHub::new(config, SystemEnv);
        assert_eq!(
            hub.acquire_semaphore("", SessionId(1)),
            Err(SyncError::EmptyIdentifier { kind: "semaphore" })
        );
        assert_eq!(
            hub.enter_stage("toolong", SessionId(1)),
            Err(SyncError::IdentifierTooLong { kind: "stage", len: 7, max: 4 })
        );
    }

    #[test]
    fn zero_max_holders_uses_default() {
        let hub = hub();
        hub.create_acquire_semaphore("sem", 0, SessionId(1)).unwrap();
        assert_eq!(hub.check_semaphore("sem").unwrap().unwrap().capacity, 1);
    }

    #[test]
    fn get_unpublished_binary_is_empty() {
        let hub = hub();
        hub.enter_stage("room", SessionId(1)).unwrap();
        assert_eq!(hub.get_stage_binary("room", (1, 1)).unwrap(), Bytes::new());
        assert!(hub.get_stage_binary("missing", (1, 1)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_already_published() {
        let hub = hub();
        hub.enter_stage("room", SessionId(1)).unwrap();
        hub.set_stage_binary("room", (2, 3), Bytes::from_static(b"ok")).unwrap();
        assert_eq!(hub.wait_stage_binary("room", (2, 3)).await.unwrap(), Bytes::from_static(b"ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out() {
        let config = SyncConfig { stage_binary_wait_timeout_ms: 1_000, ..SyncConfig::default() };
        let hub = SyncHub::new(config, SystemEnv);
        hub.enter_stage("room", SessionId(1)).unwrap();

        let started = tokio::time::Instant::now();
        let err = hub.wait_stage_binary("room", (0, 1)).await.unwrap_err();
        assert_eq!(err, SyncError::BinaryWaitTimedOut { id: "room".to_owned(), type0: 0, type1: 1 });
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn log_key_is_remembered_until_disconnect() {
        let hub = hub();
        let key = hub.issue_log_key(SessionId(9));
        assert_eq!(hub.log_key(SessionId(9)), Some(key));
        hub.disconnect(SessionId(9));
        assert_eq!(hub.log_key(SessionId(9)), None);
    }
}
