//! Opcode table.
//!
//! Only the system opcodes the channel core understands are listed: the ACK
//! envelope, session keep-alive, and the stage / mutex / semaphore families.
//! Values are fixed by the game client.

use crate::errors::ProtocolError;

/// Message opcode, the first two (big-endian) bytes of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Batch terminator
    End = 0x0010,
    /// No operation
    Nop = 0x0011,
    /// Generic acknowledgement (see [`crate::ack`])
    Ack = 0x0012,
    /// Keep-alive
    Ping = 0x0017,
    /// Request a per-session random log key
    IssueLogKey = 0x001d,
    /// Create a named stage
    CreateStage = 0x0020,
    /// Destroy a stage (client request) or announce its destruction (server)
    StageDestruct = 0x0021,
    /// Enter a stage
    EnterStage = 0x0022,
    /// Return to the previously visited stage
    BackStage = 0x0023,
    /// Move to another stage
    MoveStage = 0x0024,
    /// Leave the current stage
    LeaveStage = 0x0025,
    /// Lock a stage against new entries
    LockStage = 0x0026,
    /// Unlock a stage
    UnlockStage = 0x0027,
    /// Reserve a slot in a stage
    ReserveStage = 0x0028,
    /// Drop the caller's reservation
    UnreserveStage = 0x0029,
    /// Set the password of the reserved stage
    SetStagePass = 0x002a,
    /// Wait until a stage binary is published
    WaitStageBinary = 0x002b,
    /// Publish a stage binary
    SetStageBinary = 0x002c,
    /// Fetch a stage binary
    GetStageBinary = 0x002d,
    /// List stages by prefix
    EnumerateStage = 0x002f,
    /// Create a named mutex
    CreateMutex = 0x0030,
    /// Create and open a named mutex
    CreateOpenMutex = 0x0031,
    /// Delete a named mutex
    DeleteMutex = 0x0032,
    /// Open (lock) a named mutex
    OpenMutex = 0x0033,
    /// Close (unlock) a named mutex
    CloseMutex = 0x0034,
    /// Create a named semaphore
    CreateSemaphore = 0x0035,
    /// Create a named semaphore and acquire it
    CreateAcquireSemaphore = 0x0036,
    /// Release a semaphore by server-issued handle
    DeleteSemaphore = 0x0037,
    /// Acquire a named semaphore
    AcquireSemaphore = 0x0038,
    /// Release a named semaphore
    ReleaseSemaphore = 0x0039,
    /// Take the global semaphore for a user/channel pair
    LockGlobalSema = 0x003a,
    /// Release the caller's global semaphores
    UnlockGlobalSema = 0x003b,
    /// Query whether a semaphore exists
    CheckSemaphore = 0x003c,
}

impl Opcode {
    /// Wire value.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Look up an opcode by wire value.
    pub fn from_u16(value: u16) -> Option<Self> {
        let opcode = match value {
            0x0010 => Self::End,
            0x0011 => Self::Nop,
            0x0012 => Self::Ack,
            0x0017 => Self::Ping,
            0x001d => Self::IssueLogKey,
            0x0020 => Self::CreateStage,
            0x0021 => Self::StageDestruct,
            0x0022 => Self::EnterStage,
            0x0023 => Self::BackStage,
            0x0024 => Self::MoveStage,
            0x0025 => Self::LeaveStage,
            0x0026 => Self::LockStage,
            0x0027 => Self::UnlockStage,
            0x0028 => Self::ReserveStage,
            0x0029 => Self::UnreserveStage,
            0x002a => Self::SetStagePass,
            0x002b => Self::WaitStageBinary,
            0x002c => Self::SetStageBinary,
            0x002d => Self::GetStageBinary,
            0x002f => Self::EnumerateStage,
            0x0030 => Self::CreateMutex,
            0x0031 => Self::CreateOpenMutex,
            0x0032 => Self::DeleteMutex,
            0x0033 => Self::OpenMutex,
            0x0034 => Self::CloseMutex,
            0x0035 => Self::CreateSemaphore,
            0x0036 => Self::CreateAcquireSemaphore,
            0x0037 => Self::DeleteSemaphore,
            0x0038 => Self::AcquireSemaphore,
            0x0039 => Self::ReleaseSemaphore,
            0x003a => Self::LockGlobalSema,
            0x003b => Self::UnlockGlobalSema,
            0x003c => Self::CheckSemaphore,
            _ => return None,
        };
        Some(opcode)
    }
}

impl TryFrom<u16> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_u16(value).ok_or(ProtocolError::UnknownOpcode(value))
    }
}
