//! Typed message bodies.
//!
//! [`Payload`] is the decoded form of a [`Frame`]: one variant per opcode,
//! each wrapping the body struct for that opcode. Bodies implement
//! [`WireBody`] and are read in the cursor's default big-endian order.

pub mod semaphore;
pub mod session;
pub mod stage;

pub use semaphore::{CreateSemaphore, DeleteSemaphore, LockGlobalSema, NamedRequest};
pub use session::{HandleOnly, IssueLogKey};
pub use stage::{
    CreateStage, EnumerateStage, ReserveStage, SetStageBinary, SetStagePass, StageBinaryRequest,
    StageListing, StageRequest, StageTransfer,
};

use crate::{
    ack::AckEnvelope,
    cursor::ByteCursor,
    errors::{ProtocolError, Result},
    frame::Frame,
    opcodes::Opcode,
};

/// A message body with a fixed wire layout.
pub trait WireBody: Sized {
    /// Read the body at the cursor.
    fn decode(cursor: &mut ByteCursor) -> Result<Self>;

    /// Append the body at the cursor.
    fn encode(&self, cursor: &mut ByteCursor) -> Result<()>;
}

impl WireBody for AckEnvelope {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        AckEnvelope::decode(cursor)
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        AckEnvelope::encode(self, cursor)
    }
}

macro_rules! payloads {
    (
        units { $($unit:ident),* $(,)? }
        bodies { $($variant:ident($body:ty)),* $(,)? }
    ) => {
        /// Decoded message, one variant per opcode.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Payload {
            $(
                #[doc = concat!("`", stringify!($unit), "` (no body)")]
                $unit,
            )*
            $(
                #[doc = concat!("`", stringify!($variant), "`")]
                $variant($body),
            )*
        }

        impl Payload {
            /// Opcode this payload travels under.
            pub fn opcode(&self) -> Opcode {
                match self {
                    $(Self::$unit => Opcode::$unit,)*
                    $(Self::$variant(_) => Opcode::$variant,)*
                }
            }

            /// Decode a frame's body according to its opcode.
            pub fn from_frame(frame: &Frame) -> Result<Self> {
                let opcode = frame.require_opcode()?;
                let mut cursor = ByteCursor::from_bytes(&frame.body);
                match opcode {
                    $(Opcode::$unit => Ok(Self::$unit),)*
                    $(Opcode::$variant => Ok(Self::$variant(<$body as WireBody>::decode(&mut cursor)?)),)*
                }
            }

            /// Encode into a frame.
            pub fn into_frame(self) -> Result<Frame> {
                let mut cursor = ByteCursor::new();
                match &self {
                    $(Self::$unit => {})*
                    $(Self::$variant(body) => body.encode(&mut cursor)?,)*
                }
                Ok(Frame::new(self.opcode(), cursor.into_bytes()))
            }
        }
    };
}

payloads! {
    units { End, Nop, LeaveStage, UnreserveStage }
    bodies {
        Ack(AckEnvelope),
        Ping(HandleOnly),
        IssueLogKey(IssueLogKey),
        CreateStage(CreateStage),
        StageDestruct(StageRequest),
        EnterStage(StageTransfer),
        BackStage(HandleOnly),
        MoveStage(StageTransfer),
        LockStage(StageRequest),
        UnlockStage(StageRequest),
        ReserveStage(ReserveStage),
        SetStagePass(SetStagePass),
        WaitStageBinary(StageBinaryRequest),
        SetStageBinary(SetStageBinary),
        GetStageBinary(StageBinaryRequest),
        EnumerateStage(EnumerateStage),
        CreateMutex(NamedRequest),
        CreateOpenMutex(NamedRequest),
        DeleteMutex(NamedRequest),
        OpenMutex(NamedRequest),
        CloseMutex(NamedRequest),
        CreateSemaphore(CreateSemaphore),
        CreateAcquireSemaphore(CreateSemaphore),
        DeleteSemaphore(DeleteSemaphore),
        AcquireSemaphore(NamedRequest),
        ReleaseSemaphore(NamedRequest),
        LockGlobalSema(LockGlobalSema),
        UnlockGlobalSema(HandleOnly),
        CheckSemaphore(NamedRequest),
    }
}

impl Payload {
    /// Decode raw message bytes (opcode plus body).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_frame(&Frame::decode(bytes)?)
    }

    /// Correlation handle the sender expects echoed, if the message has one.
    pub fn ack_handle(&self) -> Option<u32> {
        match self {
            Self::Ack(ack) => Some(ack.handle),
            Self::Ping(body) | Self::BackStage(body) | Self::UnlockGlobalSema(body) => {
                Some(body.ack_handle)
            },
            Self::IssueLogKey(body) => Some(body.ack_handle),
            Self::CreateStage(body) => Some(body.ack_handle),
            Self::StageDestruct(body) | Self::LockStage(body) | Self::UnlockStage(body) => {
                Some(body.ack_handle)
            },
            Self::EnterStage(body) | Self::MoveStage(body) => Some(body.ack_handle),
            Self::ReserveStage(body) => Some(body.ack_handle),
            Self::WaitStageBinary(body) | Self::GetStageBinary(body) => Some(body.ack_handle),
            Self::EnumerateStage(body) => Some(body.ack_handle),
            Self::CreateMutex(body)
            | Self::CreateOpenMutex(body)
            | Self::DeleteMutex(body)
            | Self::OpenMutex(body)
            | Self::CloseMutex(body)
            | Self::AcquireSemaphore(body)
            | Self::ReleaseSemaphore(body)
            | Self::CheckSemaphore(body) => Some(body.ack_handle),
            Self::CreateSemaphore(body) | Self::CreateAcquireSemaphore(body) => {
                Some(body.ack_handle)
            },
            Self::LockGlobalSema(body) => Some(body.ack_handle),
            Self::End
            | Self::Nop
            | Self::LeaveStage
            | Self::UnreserveStage
            | Self::SetStagePass(_)
            | Self::SetStageBinary(_)
            | Self::DeleteSemaphore(_) => None,
        }
    }
}

/// Server-to-client notice that the caller's stage was destroyed.
///
/// Travels under the `STAGE_DESTRUCT` opcode with an empty body.
pub fn stage_destruct_notice() -> Frame {
    Frame::new(Opcode::StageDestruct, bytes::Bytes::new())
}

/// Reject a frame whose opcode is not `expected`.
pub fn expect_opcode(frame: &Frame, expected: Opcode) -> Result<()> {
    let opcode = frame.require_opcode()?;
    if opcode == expected { Ok(()) } else { Err(ProtocolError::UnexpectedOpcode(opcode)) }
}
