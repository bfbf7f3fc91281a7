//! Sync error types.
//!
//! Every variant is a protocol-state failure: the request is answered with
//! a failed ACK and the connection stays open.

use frontier_proto::ack::ACK_FAILURE;
use thiserror::Error;

use crate::session::SessionId;

/// Rejected sync request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Identifier is empty
    #[error("empty {kind} identifier")]
    EmptyIdentifier {
        /// Resource family
        kind: &'static str,
    },

    /// Identifier exceeds the configured cap
    #[error("{kind} identifier of {len} bytes exceeds limit of {max}")]
    IdentifierTooLong {
        /// Resource family
        kind: &'static str,
        /// Identifier length
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Named semaphore or mutex does not exist
    #[error("{kind} {id:?} not found")]
    NotFound {
        /// Resource family
        kind: &'static str,
        /// Identifier
        id: String,
    },

    /// Holder capacity reached
    #[error("{kind} {id:?} full ({capacity} holders)")]
    Full {
        /// Resource family
        kind: &'static str,
        /// Identifier
        id: String,
        /// Holder capacity
        capacity: u32,
    },

    /// Caller does not hold the resource
    #[error("{session} does not hold {kind} {id:?}")]
    NotHolder {
        /// Resource family
        kind: &'static str,
        /// Identifier
        id: String,
        /// Caller
        session: SessionId,
    },

    /// Resource is held by another session
    #[error("{kind} {id:?} is held by another session")]
    Busy {
        /// Resource family
        kind: &'static str,
        /// Identifier
        id: String,
    },

    /// No semaphore carries this handle
    #[error("unknown semaphore handle {0}")]
    UnknownHandle(u32),

    /// Global lock held by another session
    #[error("global lock {key:?} held by {holder}")]
    GlobalLockHeld {
        /// `user:channel` key
        key: String,
        /// Current holder
        holder: SessionId,
    },

    /// Stage does not exist
    #[error("stage {0:?} not found")]
    StageNotFound(String),

    /// Stage already exists
    #[error("stage {0:?} already exists")]
    StageExists(String),

    /// Members and reservations fill every slot
    #[error("stage {id:?} full ({max_players} players)")]
    StageFull {
        /// Stage identifier
        id: String,
        /// Player cap
        max_players: u16,
    },

    /// Stage refuses new entries and reservations
    #[error("stage {0:?} is locked")]
    StageLocked(String),

    /// Stage password missing or wrong
    #[error("wrong password for stage {0:?}")]
    WrongPassword(String),

    /// Only the host may do this
    #[error("{session} is not host of stage {id:?}")]
    NotHost {
        /// Stage identifier
        id: String,
        /// Caller
        session: SessionId,
    },

    /// `BACK_STAGE` with an empty history
    #[error("no previous stage to return to")]
    NoPreviousStage,

    /// `WAIT_STAGE_BINARY` deadline passed
    #[error("timed out waiting for binary ({type0}, {type1}) of stage {id:?}")]
    BinaryWaitTimedOut {
        /// Stage identifier
        id: String,
        /// First key byte
        type0: u8,
        /// Second key byte
        type1: u8,
    },

    /// Stage destroyed while a request waited on it
    #[error("stage {0:?} destroyed")]
    StageDestroyed(String),
}

impl SyncError {
    /// Error byte for the ACK answering the failed request.
    pub fn ack_code(&self) -> u8 {
        ACK_FAILURE
    }
}
