//! Stage opcode bodies.
//!
//! Stage identifiers are 1-byte length-prefixed, NUL-terminated ASCII.

use bytes::Bytes;

use super::WireBody;
use crate::{
    cursor::ByteCursor,
    errors::{ProtocolError, Result},
    strings::{LengthPrefix, decode_text, read_pascal, up_to_nul, write_pascal},
};

fn read_id(cursor: &mut ByteCursor) -> Result<String> {
    read_pascal(cursor, LengthPrefix::U8, false)
}

fn write_id(cursor: &mut ByteCursor, id: &str) -> Result<()> {
    write_pascal(cursor, LengthPrefix::U8, id, false)
}

/// `CREATE_STAGE`: create a stage with a player cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStage {
    /// Correlation handle
    pub ack_handle: u32,
    /// Unknown, echoed by clients as 0 or 1
    pub unk0: u8,
    /// Maximum players
    pub player_count: u8,
    /// Stage identifier
    pub stage_id: String,
}

impl WireBody for CreateStage {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            unk0: cursor.read_u8()?,
            player_count: cursor.read_u8()?,
            stage_id: read_id(cursor)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        cursor.write_u8(self.unk0);
        cursor.write_u8(self.player_count);
        write_id(cursor, &self.stage_id)
    }
}

/// Request naming a single stage: `STAGE_DESTRUCT`, `LOCK_STAGE`,
/// `UNLOCK_STAGE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    /// Correlation handle
    pub ack_handle: u32,
    /// Stage identifier
    pub stage_id: String,
}

impl WireBody for StageRequest {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self { ack_handle: cursor.read_u32()?, stage_id: read_id(cursor)? })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        write_id(cursor, &self.stage_id)
    }
}

/// `ENTER_STAGE` / `MOVE_STAGE`: transfer the caller into a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransfer {
    /// Correlation handle
    pub ack_handle: u32,
    /// Unknown flag (quest vs. town transfer)
    pub unk0: u8,
    /// Target stage
    pub stage_id: String,
}

impl WireBody for StageTransfer {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            unk0: cursor.read_u8()?,
            stage_id: read_id(cursor)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        cursor.write_u8(self.unk0);
        write_id(cursor, &self.stage_id)
    }
}

/// `RESERVE_STAGE`: claim or update a slot in a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveStage {
    /// Correlation handle
    pub ack_handle: u32,
    /// `0x01` not ready, `0x11` ready
    pub ready: u8,
    /// Stage identifier
    pub stage_id: String,
}

impl ReserveStage {
    /// Ready flag value meaning "not ready".
    pub const NOT_READY: u8 = 0x01;
    /// Ready flag value meaning "ready".
    pub const READY: u8 = 0x11;

    /// True when the flag marks the reserver as ready.
    pub fn is_ready(&self) -> bool {
        self.ready == Self::READY
    }
}

impl WireBody for ReserveStage {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            ready: cursor.read_u8()?,
            stage_id: read_id(cursor)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        cursor.write_u8(self.ready);
        write_id(cursor, &self.stage_id)
    }
}

/// `SET_STAGE_PASS`: no acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStagePass {
    /// Unknown
    pub unk0: u8,
    /// Password text
    pub password: String,
}

impl WireBody for SetStagePass {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self { unk0: cursor.read_u8()?, password: read_id(cursor)? })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u8(self.unk0);
        write_id(cursor, &self.password)
    }
}

/// `GET_STAGE_BINARY` / `WAIT_STAGE_BINARY`: look up a stage blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBinaryRequest {
    /// Correlation handle
    pub ack_handle: u32,
    /// First key byte
    pub binary_type0: u8,
    /// Second key byte
    pub binary_type1: u8,
    /// Stage identifier
    pub stage_id: String,
}

impl WireBody for StageBinaryRequest {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            binary_type0: cursor.read_u8()?,
            binary_type1: cursor.read_u8()?,
            stage_id: read_id(cursor)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        cursor.write_u8(self.binary_type0);
        cursor.write_u8(self.binary_type1);
        write_id(cursor, &self.stage_id)
    }
}

/// `SET_STAGE_BINARY`: publish a stage blob. No acknowledgement.
///
/// Layout: `type0 u8, type1 u8, id_len u8, data_len u16, id, data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStageBinary {
    /// First key byte
    pub binary_type0: u8,
    /// Second key byte
    pub binary_type1: u8,
    /// Stage identifier
    pub stage_id: String,
    /// Opaque blob, echoed back verbatim to readers
    pub data: Bytes,
}

impl WireBody for SetStageBinary {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        let binary_type0 = cursor.read_u8()?;
        let binary_type1 = cursor.read_u8()?;
        let id_len = usize::from(cursor.read_u8()?);
        let data_len = usize::from(cursor.read_u16()?);
        let stage_id = decode_text(up_to_nul(cursor.read_bytes(id_len)?), false)?;
        let data = Bytes::copy_from_slice(cursor.read_bytes(data_len)?);
        Ok(Self { binary_type0, binary_type1, stage_id, data })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        let id_len = self.stage_id.len() + 1;
        let id_len = u8::try_from(id_len)
            .map_err(|_| ProtocolError::StringTooLong { len: id_len, width: 1 })?;
        let data_len = u16::try_from(self.data.len()).map_err(|_| ProtocolError::FieldTooLarge {
            field: "stage binary",
            size: self.data.len(),
            max: usize::from(u16::MAX),
        })?;

        cursor.write_u8(self.binary_type0);
        cursor.write_u8(self.binary_type1);
        cursor.write_u8(id_len);
        cursor.write_u16(data_len);
        cursor.write_null_terminated_bytes(self.stage_id.as_bytes());
        cursor.write_bytes(&self.data);
        Ok(())
    }
}

/// `ENUMERATE_STAGE`: list stages whose id starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateStage {
    /// Correlation handle
    pub ack_handle: u32,
    /// Unknown
    pub unk0: u8,
    /// Stage id prefix filter
    pub prefix: String,
}

impl WireBody for EnumerateStage {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            ack_handle: cursor.read_u32()?,
            unk0: cursor.read_u8()?,
            prefix: read_id(cursor)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.ack_handle);
        cursor.write_u8(self.unk0);
        write_id(cursor, &self.prefix)
    }
}

/// One row of an `ENUMERATE_STAGE` response.
///
/// Layout: `reserved u16, 0 u16, occupied u16, max_players u16, lock u8, id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageListing {
    /// Sessions holding a reservation
    pub reserved: u16,
    /// At least one session is inside
    pub occupied: bool,
    /// Player cap
    pub max_players: u16,
    /// Locked or password protected
    pub locked: bool,
    /// Stage identifier
    pub stage_id: String,
}

impl StageListing {
    /// Lock byte clients read as "cannot join freely".
    pub const LOCKED: u8 = 2;

    /// Encode a full response body: `count u16` followed by the rows.
    pub fn encode_list(listings: &[Self], cursor: &mut ByteCursor) -> Result<()> {
        let count = u16::try_from(listings.len()).map_err(|_| ProtocolError::FieldTooLarge {
            field: "stage listing",
            size: listings.len(),
            max: usize::from(u16::MAX),
        })?;
        cursor.write_u16(count);
        for listing in listings {
            listing.encode(cursor)?;
        }
        Ok(())
    }

    /// Decode a full response body.
    pub fn decode_list(cursor: &mut ByteCursor) -> Result<Vec<Self>> {
        let count = cursor.read_u16()?;
        (0..count).map(|_| Self::decode(cursor)).collect()
    }
}

impl WireBody for StageListing {
    fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        let reserved = cursor.read_u16()?;
        let _unk = cursor.read_u16()?;
        Ok(Self {
            reserved,
            occupied: cursor.read_u16()? != 0,
            max_players: cursor.read_u16()?,
            locked: cursor.read_u8()? != 0,
            stage_id: read_id(cursor)?,
        })
    }

    fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u16(self.reserved);
        cursor.write_u16(0);
        cursor.write_u16(u16::from(self.occupied));
        cursor.write_u16(self.max_players);
        cursor.write_u8(if self.locked { Self::LOCKED } else { 0 });
        write_id(cursor, &self.stage_id)
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn create_stage_layout() {
        let mut cursor = ByteCursor::from_bytes(&hex!("00000005 00 04 06 736c31517300"));
        let msg = CreateStage::decode(&mut cursor).unwrap();
        assert_eq!(
            msg,
            CreateStage {
                ack_handle: 5,
                unk0: 0,
                player_count: 4,
                stage_id: "sl1Qs".to_owned()
            }
        );
    }

    #[test]
    fn set_stage_binary_layout() {
        let msg = SetStageBinary {
            binary_type0: 1,
            binary_type1: 2,
            stage_id: "ab".to_owned(),
            data: Bytes::from_static(&[9, 8, 7]),
        };
        let mut cursor = ByteCursor::new();
        msg.encode(&mut cursor).unwrap();
        assert_eq!(cursor.data(), &hex!("01 02 03 0003 616200 090807"));
    }

    #[test]
    fn set_stage_binary_rejects_short_data() {
        let mut cursor = ByteCursor::from_bytes(&hex!("01 02 03 0010 616200 0908"));
        assert!(matches!(
            SetStageBinary::decode(&mut cursor),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn listing_layout() {
        let listing = StageListing {
            reserved: 1,
            occupied: true,
            max_players: 4,
            locked: true,
            stage_id: "q".to_owned(),
        };
        let mut cursor = ByteCursor::new();
        StageListing::encode_list(std::slice::from_ref(&listing), &mut cursor).unwrap();
        assert_eq!(cursor.data(), &hex!("0001 0001 0000 0001 0004 02 027100"));

        let mut cursor = ByteCursor::from_bytes(cursor.data());
        assert_eq!(StageListing::decode_list(&mut cursor).unwrap(), vec![listing]);
    }
}
