//! Mutex, semaphore and global-lock opcode bodies.

use super::WireBody;
use crate::{
    cursor::ByteCursor,
    errors::{ProtocolError, Result},
    strings::{LengthPrefix, decode_text, read_pascal, up_to_nul, write_pascal},
};

/// Request naming a mutex or semaphore by id.
///
/// Shared by every mutex opcode and by `ACQUIRE_SEMAPHORE`,
/// `RELEASE_SEMAPHORE` and `CHECK_SEMAPHORE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRequest {
    /// Correlation handle
    pub ack_handle: u32,
    /// Primitive identifier
    pub id: String,
}

impl WireBody for NamedRequest {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            id: read_pascal(cursor, LengthPrefix::U8, false)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        write_pascal(cursor, LengthPrefix::U8, &self.id, false)
    }
}

/// `CREATE_SEMAPHORE` / `CREATE_ACQUIRE_SEMAPHORE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSemaphore {
    /// Correlation handle
    pub ack_handle: u32,
    /// Unknown
    pub unk0: u16,
    /// Holder capacity, `0` for the server default
    pub max_holders: u8,
    /// Semaphore identifier
    pub id: String,
}

impl WireBody for CreateSemaphore {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            unk0: cursor.read_u16()?,
            max_holders: cursor.read_u8()?,
            id: read_pascal(cursor, LengthPrefix::U8, false)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        cursor.write_u16(self.unk0);
        cursor.write_u8(self.max_holders);
        write_pascal(cursor, LengthPrefix::U8, &self.id, false)
    }
}

/// `DELETE_SEMAPHORE`: release by server-issued handle. No acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSemaphore {
    /// Handle returned when the semaphore was created
    pub semaphore_handle: u32,
}

impl WireBody for DeleteSemaphore {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self { semaphore_handle: cursor.read_u32()? })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.semaphore_handle);
        Ok(())
    }
}

/// `LOCK_GLOBAL_SEMA`: take the lock for a user on a channel.
///
/// Layout: `ack u32, user_len u16, channel_len u16, user, channel`. Both
/// lengths count the trailing NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockGlobalSema {
    /// Correlation handle
    pub ack_handle: u32,
    /// Requesting user id
    pub user_id: String,
    /// Channel server id, may be empty
    pub server_channel_id: String,
}

fn nul_len(text: &str) -> Result<u16> {
    let len = text.len() + 1;
    u16::try_from(len).map_err(|_| ProtocolError::StringTooLong { len, width: 2 })
}

impl WireBody for LockGlobalSema {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        let ack_handle = cursor.read_u32()?;
        let user_len = usize::from(cursor.read_u16()?);
        let channel_len = usize::from(cursor.read_u16()?);
        let user_id = decode_text(up_to_nul(cursor.read_bytes(user_len)?), false)?;
        let server_channel_id = decode_text(up_to_nul(cursor.read_bytes(channel_len)?), false)?;
        Ok(Self { ack_handle, user_id, server_channel_id })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        let user_len = nul_len(&self.user_id)?;
        let channel_len = nul_len(&self.server_channel_id)?;
        cursor.write_u32(self.ack_handle);
        cursor.write_u16(user_len);
        cursor.write_u16(channel_len);
        cursor.write_null_terminated_bytes(self.user_id.as_bytes());
        cursor.write_null_terminated_bytes(self.server_channel_id.as_bytes());
        Ok(())
    }
}

/// Body of a successful `LOCK_GLOBAL_SEMA` response.
///
/// Empty channel: `00 00 00 01 00`. Otherwise `02 00`, a 2-byte length and
/// the channel bytes.
pub fn encode_global_sema_grant(cursor: &mut ByteCursor, server_channel_id: &str) -> Result<()> {
    if server_channel_id.is_empty() {
        cursor.write_bytes(&[0x00, 0x00, 0x00, 0x01, 0x00]);
        return Ok(());
    }
    let len = u16::try_from(server_channel_id.len()).map_err(|_| ProtocolError::StringTooLong {
        len: server_channel_id.len(),
        width: 2,
    })?;
    cursor.write_u8(0x02);
    cursor.write_u8(0x00);
    cursor.write_u16(len);
    cursor.write_bytes(server_channel_id.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn create_semaphore_layout() {
        let mut cursor = ByteCursor::from_bytes(&hex!("00000009 0000 00 0461626300"));
        let msg = CreateSemaphore::decode(&mut cursor).unwrap();
        assert_eq!(msg.ack_handle, 9);
        assert_eq!(msg.max_holders, 0);
        assert_eq!(msg.id, "abc");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn lock_global_sema_lengths_include_nul() {
        let msg = LockGlobalSema {
            ack_handle: 1,
            user_id: "u1".to_owned(),
            server_channel_id: String::new(),
        };
        let mut cursor = ByteCursor::new();
        msg.encode(&mut cursor).unwrap();
        assert_eq!(cursor.data(), &hex!("00000001 0003 0001 753100 00"));

        let mut cursor = ByteCursor::from_bytes(cursor.data());
        assert_eq!(LockGlobalSema::decode(&mut cursor).unwrap(), msg);
    }

    #[test]
    fn global_sema_grant_bodies() {
        let mut cursor = ByteCursor::new();
        encode_global_sema_grant(&mut cursor, "").unwrap();
        assert_eq!(cursor.data(), &hex!("0000000100"));

        let mut cursor = ByteCursor::new();
        encode_global_sema_grant(&mut cursor, "ch1").unwrap();
        assert_eq!(cursor.data(), &hex!("0200 0003 636831"));
    }
}
