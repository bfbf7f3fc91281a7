//! Request dispatch.
//!
//! [`Dispatcher::handle`] turns one decoded request into declarative
//! [`ServerAction`]s. It performs no I/O; the connection loop executes the
//! actions. Sync failures become failed ACKs and never close the
//! connection.

use std::sync::Arc;

use bytes::Bytes;
use frontier_core::{BinaryKey, Environment, SessionId, SyncError, SyncHub};
use frontier_proto::{
    AckEnvelope, ByteCursor, Frame, Payload,
    payloads::{StageListing, semaphore::encode_global_sema_grant, stage_destruct_notice},
};
use tracing::{debug, warn};

use crate::error::ServerError;

/// Simple-ACK payload meaning "nothing to report".
const EMPTY: [u8; 4] = [0; 4];

/// Effect of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Send this frame back to the requesting session
    Reply(Frame),

    /// Send this frame to another session
    SendTo {
        /// Recipient
        session: SessionId,
        /// Frame to deliver
        frame: Frame,
    },

    /// Reply once the stage binary is published; see
    /// [`Dispatcher::await_stage_binary`]
    AwaitStageBinary {
        /// Handle to echo
        ack_handle: u32,
        /// Stage identifier
        stage_id: String,
        /// `(type0, type1)`
        key: BinaryKey,
    },

    /// Close the requesting connection
    Close {
        /// Reason for closing the connection
        reason: String,
    },
}

fn simple_frame(handle: u32, result: Result<[u8; 4], SyncError>) -> Result<Frame, ServerError> {
    let ack = match result {
        Ok(data) => AckEnvelope::simple_succeed(handle, &data),
        Err(err) => {
            debug!(handle, error = %err, "request failed");
            AckEnvelope::simple(handle, err.ack_code(), &EMPTY)
        },
    };
    Ok(ack.to_frame()?)
}

fn buffer_frame(handle: u32, result: Result<Bytes, SyncError>) -> Result<Frame, ServerError> {
    let ack = match result {
        Ok(data) => AckEnvelope::buffer_succeed(handle, data),
        Err(err) => {
            debug!(handle, error = %err, "request failed");
            AckEnvelope::buffer(handle, err.ack_code(), Bytes::new())
        },
    };
    Ok(ack.to_frame()?)
}

fn simple(handle: u32, result: Result<[u8; 4], SyncError>) -> Result<ServerAction, ServerError> {
    simple_frame(handle, result).map(ServerAction::Reply)
}

fn buffer(handle: u32, result: Result<Bytes, SyncError>) -> Result<ServerAction, ServerError> {
    buffer_frame(handle, result).map(ServerAction::Reply)
}

fn done(result: Result<impl Sized, SyncError>) -> Result<[u8; 4], SyncError> {
    result.map(|_| EMPTY)
}

/// Maps requests onto the shared [`SyncHub`].
#[derive(Debug)]
pub struct Dispatcher<E: Environment> {
    hub: Arc<SyncHub<E>>,
}

impl<E: Environment> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self { hub: Arc::clone(&self.hub) }
    }
}

impl<E: Environment> Dispatcher<E> {
    /// Dispatcher over `hub`.
    pub fn new(hub: Arc<SyncHub<E>>) -> Self {
        Self { hub }
    }

    /// Shared sync state.
    pub fn hub(&self) -> &SyncHub<E> {
        &self.hub
    }

    /// Decode and handle one raw message (opcode plus body).
    ///
    /// Opcodes this server does not know are logged and skipped. A known
    /// opcode with a malformed body closes the connection.
    pub fn handle_message(&self, session: SessionId, message: &[u8]) -> Result<Vec<ServerAction>, ServerError> {
        let frame = match Frame::decode(message) {
            Ok(frame) => frame,
            Err(err) => return Ok(vec![ServerAction::Close { reason: err.to_string() }]),
        };
        if frame.opcode_enum().is_none() {
            warn!(%session, opcode = frame.opcode(), "unhandled opcode");
            return Ok(Vec::new());
        }
        match Payload::from_frame(&frame) {
            Ok(payload) => {
                debug!(%session, opcode = ?payload.opcode(), "request");
                self.handle(session, payload)
            },
            Err(err) => Ok(vec![ServerAction::Close { reason: err.to_string() }]),
        }
    }

    /// Handle one request from `session`.
    ///
    /// Errors are encoding failures only; the caller closes the connection.
    pub fn handle(&self, session: SessionId, payload: Payload) -> Result<Vec<ServerAction>, ServerError> {
        let hub = &*self.hub;
        let action = match payload {
            Payload::End | Payload::Nop => return Ok(Vec::new()),
            Payload::Ack(ack) => {
                debug!(%session, handle = ack.handle, "ignoring client ACK");
                return Ok(Vec::new());
            },
            Payload::Ping(req) => simple(req.ack_handle, Ok(EMPTY))?,
            Payload::IssueLogKey(req) => {
                let key = hub.issue_log_key(session);
                buffer(req.ack_handle, Ok(Bytes::copy_from_slice(&key)))?
            },

            // Stages
            Payload::CreateStage(req) => simple(
                req.ack_handle,
                done(hub.create_stage(&req.stage_id, u16::from(req.player_count), session)),
            )?,
            Payload::StageDestruct(req) => return self.destruct(session, req.ack_handle, &req.stage_id),
            Payload::EnterStage(req) => simple(req.ack_handle, done(hub.enter_stage(&req.stage_id, session)))?,
            Payload::MoveStage(req) => simple(req.ack_handle, done(hub.move_stage(&req.stage_id, session)))?,
            Payload::BackStage(req) => simple(req.ack_handle, done(hub.back_stage(session)))?,
            Payload::LeaveStage => {
                hub.leave_stage(session);
                return Ok(Vec::new());
            },
            Payload::LockStage(req) => simple(req.ack_handle, done(hub.lock_stage(&req.stage_id, session)))?,
            Payload::UnlockStage(req) => {
                simple(req.ack_handle, done(hub.unlock_stage(&req.stage_id, session)))?
            },
            Payload::ReserveStage(req) => simple(
                req.ack_handle,
                done(hub.reserve_stage(&req.stage_id, req.is_ready(), session)),
            )?,
            Payload::UnreserveStage => {
                hub.unreserve_stage(session);
                return Ok(Vec::new());
            },
            Payload::SetStagePass(req) => {
                let target = hub.set_stage_password(&req.password, session);
                debug!(%session, ?target, "stage password set");
                return Ok(Vec::new());
            },
            Payload::SetStageBinary(req) => {
                let key = (req.binary_type0, req.binary_type1);
                if let Err(err) = hub.set_stage_binary(&req.stage_id, key, req.data) {
                    warn!(%session, stage = %req.stage_id, error = %err, "stage binary dropped");
                }
                return Ok(Vec::new());
            },
            Payload::GetStageBinary(req) => {
                let key = (req.binary_type0, req.binary_type1);
                buffer(req.ack_handle, hub.get_stage_binary(&req.stage_id, key))?
            },
            Payload::WaitStageBinary(req) => ServerAction::AwaitStageBinary {
                ack_handle: req.ack_handle,
                stage_id: req.stage_id,
                key: (req.binary_type0, req.binary_type1),
            },
            Payload::EnumerateStage(req) => {
                let listings: Vec<StageListing> = hub
                    .enumerate_stages(&req.prefix)
                    .into_iter()
                    .map(|info| StageListing {
                        reserved: u16::try_from(info.reservations.len()).unwrap_or(u16::MAX),
                        occupied: !info.members.is_empty(),
                        max_players: info.max_players,
                        locked: info.locked || info.has_password,
                        stage_id: info.id,
                    })
                    .collect();
                let mut cursor = ByteCursor::new();
                StageListing::encode_list(&listings, &mut cursor)?;
                buffer(req.ack_handle, Ok(cursor.into_bytes()))?
            },

            // Mutexes
            Payload::CreateMutex(req) => simple(req.ack_handle, done(hub.create_mutex(&req.id, session)))?,
            Payload::CreateOpenMutex(req) => {
                simple(req.ack_handle, done(hub.create_open_mutex(&req.id, session)))?
            },
            Payload::DeleteMutex(req) => simple(req.ack_handle, done(hub.delete_mutex(&req.id, session)))?,
            Payload::OpenMutex(req) => simple(req.ack_handle, done(hub.open_mutex(&req.id, session)))?,
            Payload::CloseMutex(req) => simple(req.ack_handle, done(hub.close_mutex(&req.id, session)))?,

            // Semaphores
            Payload::CreateSemaphore(req) => simple(
                req.ack_handle,
                hub.create_semaphore(&req.id, u32::from(req.max_holders), session).map(u32::to_be_bytes),
            )?,
            Payload::CreateAcquireSemaphore(req) => simple(
                req.ack_handle,
                hub.create_acquire_semaphore(&req.id, u32::from(req.max_holders), session)
                    .map(|grant| grant.handle.to_be_bytes()),
            )?,
            Payload::AcquireSemaphore(req) => simple(
                req.ack_handle,
                hub.acquire_semaphore(&req.id, session).map(|grant| grant.handle.to_be_bytes()),
            )?,
            Payload::ReleaseSemaphore(req) => {
                simple(req.ack_handle, done(hub.release_semaphore(&req.id, session)))?
            },
            Payload::DeleteSemaphore(req) => {
                if let Err(err) = hub.delete_semaphore(req.semaphore_handle, session) {
                    debug!(%session, error = %err, "semaphore delete ignored");
                }
                return Ok(Vec::new());
            },
            Payload::CheckSemaphore(req) => simple(
                req.ack_handle,
                hub.check_semaphore(&req.id).map(|info| [0, 0, 0, u8::from(info.is_some())]),
            )?,

            // Global locks
            Payload::LockGlobalSema(req) => {
                let result = hub.lock_global(&req.user_id, &req.server_channel_id, session);
                match result {
                    Ok(_) => {
                        let mut cursor = ByteCursor::new();
                        encode_global_sema_grant(&mut cursor, &req.server_channel_id)?;
                        buffer(req.ack_handle, Ok(cursor.into_bytes()))?
                    },
                    Err(err) => buffer(req.ack_handle, Err(err))?,
                }
            },
            Payload::UnlockGlobalSema(req) => {
                hub.unlock_global(session);
                simple(req.ack_handle, Ok(EMPTY))?
            },
        };
        Ok(vec![action])
    }

    fn destruct(&self, session: SessionId, handle: u32, stage_id: &str) -> Result<Vec<ServerAction>, ServerError> {
        match self.hub.destruct_stage(stage_id, session) {
            Ok(notify) => {
                let mut actions = vec![simple(handle, Ok(EMPTY))?];
                actions.extend(notify.into_iter().map(|recipient| ServerAction::SendTo {
                    session: recipient,
                    frame: stage_destruct_notice(),
                }));
                Ok(actions)
            },
            Err(err) => Ok(vec![simple(handle, Err(err))?]),
        }
    }

    /// Resolve an [`ServerAction::AwaitStageBinary`] into its ACK frame.
    pub async fn await_stage_binary(
        &self,
        ack_handle: u32,
        stage_id: &str,
        key: BinaryKey,
    ) -> Result<Frame, ServerError> {
        let result = self.hub.wait_stage_binary(stage_id, key).await;
        buffer_frame(ack_handle, result)
    }

    /// Release everything `session` holds.
    pub fn disconnect(&self, session: SessionId) {
        self.hub.disconnect(session);
    }
}
