//! Session housekeeping bodies.

use super::WireBody;
use crate::{cursor::ByteCursor, errors::Result};

/// `ISSUE_LOG_KEY`: answered with 16 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueLogKey {
    /// Correlation handle
    pub ack_handle: u32,
    /// Unknown
    pub unk0: u16,
    /// Unknown
    pub unk1: u16,
}

impl IssueLogKey {
    /// Size of the issued key.
    pub const KEY_LEN: usize = 16;
}

impl WireBody for IssueLogKey {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            unk0: cursor.read_u16()?,
            unk1: cursor.read_u16()?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        cursor.write_u16(self.unk0);
        cursor.write_u16(self.unk1);
        Ok(())
    }
}

/// Bodies that carry only a correlation handle: `PING`, `BACK_STAGE` and
/// `UNLOCK_GLOBAL_SEMA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleOnly {
    /// Correlation handle
    pub ack_handle: u32,
}

impl WireBody for HandleOnly {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self { ack_handle: cursor.read_u32()? })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        Ok(())
    }
}
