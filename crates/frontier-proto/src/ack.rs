//! Acknowledgement envelope.
//!
//! Commands that have no dedicated response opcode are answered with an ACK
//! carrying the client's correlation handle, echoed verbatim.
//!
//! ```text
//! ┌───────────┬──────────┬────────────┬──────────────────────┬─────────┐
//! │ handle u32│ buffer u8│ error u8   │ len u16 [+ len u32]  │ payload │
//! └───────────┴──────────┴────────────┴──────────────────────┴─────────┘
//! ```
//!
//! Buffer responses carry a length-prefixed payload; a length of `0xFFFF` or
//! more is escaped as `0xFFFF` followed by the real length as a `u32`.
//! Simple responses write a zero length and exactly four payload bytes.

use bytes::Bytes;

use crate::{
    cursor::ByteCursor,
    errors::{ProtocolError, Result},
    frame::Frame,
    opcodes::Opcode,
};

/// Length value that escapes to a 4-byte extended length.
pub const EXTENDED_LENGTH: u16 = 0xFFFF;

/// Fixed payload size of a simple (non-buffer) ACK.
pub const SIMPLE_PAYLOAD_LEN: usize = 4;

/// Error code for success.
pub const ACK_SUCCESS: u8 = 0;

/// Error code for a generic failure.
pub const ACK_FAILURE: u8 = 1;

/// Decoded or pending acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckEnvelope {
    /// Correlation handle from the original request
    pub handle: u32,
    /// Length-prefixed buffer payload (`true`) or fixed 4 bytes (`false`)
    pub is_buffer: bool,
    /// `0` on success
    pub error_code: u8,
    /// Response data
    pub payload: Bytes,
}

impl AckEnvelope {
    /// Buffer response with an arbitrary-length payload.
    pub fn buffer(handle: u32, error_code: u8, payload: impl Into<Bytes>) -> Self {
        Self { handle, is_buffer: true, error_code, payload: payload.into() }
    }

    /// Simple response. `data` is truncated or zero-padded to four bytes.
    pub fn simple(handle: u32, error_code: u8, data: &[u8]) -> Self {
        Self { handle, is_buffer: false, error_code, payload: Bytes::copy_from_slice(&fixed(data)) }
    }

    /// Successful buffer response.
    pub fn buffer_succeed(handle: u32, payload: impl Into<Bytes>) -> Self {
        Self::buffer(handle, ACK_SUCCESS, payload)
    }

    /// Failed buffer response.
    pub fn buffer_fail(handle: u32, payload: impl Into<Bytes>) -> Self {
        Self::buffer(handle, ACK_FAILURE, payload)
    }

    /// Successful simple response.
    pub fn simple_succeed(handle: u32, data: &[u8]) -> Self {
        Self::simple(handle, ACK_SUCCESS, data)
    }

    /// Failed simple response.
    pub fn simple_fail(handle: u32, data: &[u8]) -> Self {
        Self::simple(handle, ACK_FAILURE, data)
    }

    /// True when the error code is zero.
    pub fn is_success(&self) -> bool {
        self.error_code == ACK_SUCCESS
    }

    /// Write the envelope body at the cursor.
    pub fn encode(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.handle);
        cursor.write_bool(self.is_buffer);
        cursor.write_u8(self.error_code);

        if self.is_buffer {
            let len = self.payload.len();
            if len < usize::from(EXTENDED_LENGTH) {
                cursor.write_u16(len as u16);
            } else {
                let extended = u32::try_from(len).map_err(|_| ProtocolError::FieldTooLarge {
                    field: "ack payload",
                    size: len,
                    max: u32::MAX as usize,
                })?;
                cursor.write_u16(EXTENDED_LENGTH);
                cursor.write_u32(extended);
            }
            cursor.write_bytes(&self.payload);
        } else {
            cursor.write_u16(0);
            cursor.write_bytes(&fixed(&self.payload));
        }
        Ok(())
    }

    /// Read an envelope body at the cursor.
    pub fn decode(cursor: &mut ByteCursor) -> Result<Self> {
        let handle = cursor.read_u32()?;
        let is_buffer = cursor.read_bool()?;
        let error_code = cursor.read_u8()?;

        let mut len = usize::from(cursor.read_u16()?);
        if len == usize::from(EXTENDED_LENGTH) {
            len = cursor.read_u32()? as usize;
        }

        let payload = if is_buffer {
            Bytes::copy_from_slice(cursor.read_bytes(len)?)
        } else {
            Bytes::copy_from_slice(cursor.read_bytes(SIMPLE_PAYLOAD_LEN)?)
        };

        Ok(Self { handle, is_buffer, error_code, payload })
    }

    /// Encode as a complete `Ack` frame.
    pub fn to_frame(&self) -> Result<Frame> {
        let mut cursor = ByteCursor::new();
        self.encode(&mut cursor)?;
        Ok(Frame::new(Opcode::Ack, cursor.into_bytes()))
    }
}

fn fixed(data: &[u8]) -> [u8; SIMPLE_PAYLOAD_LEN] {
    let mut out = [0u8; SIMPLE_PAYLOAD_LEN];
    let n = data.len().min(SIMPLE_PAYLOAD_LEN);
    out[..n].copy_from_slice(&data[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(ack: &AckEnvelope) -> Vec<u8> {
        let mut cursor = ByteCursor::new();
        ack.encode(&mut cursor).unwrap();
        cursor.data().to_vec()
    }

    #[test]
    fn simple_ack_layout() {
        let ack = AckEnvelope::simple_succeed(0x0102_0304, &[0x00, 0x0F, 0x00, 0x1D]);
        insta::assert_snapshot!(hex::encode(encode(&ack)), @"0102030400000000000f001d");
    }

    #[test]
    fn buffer_ack_layout() {
        let ack = AckEnvelope::buffer_fail(0xDEAD_BEEF, &b"hi"[..]);
        insta::assert_snapshot!(hex::encode(encode(&ack)), @"deadbeef010100026869");
    }

    #[test]
    fn short_simple_payload_is_zero_padded() {
        let ack = AckEnvelope::simple_succeed(7, &[0xAB]);
        assert_eq!(ack.payload.as_ref(), &[0xAB, 0, 0, 0]);

        let literal = AckEnvelope {
            handle: 7,
            is_buffer: false,
            error_code: 0,
            payload: Bytes::from_static(&[0xAB]),
        };
        assert_eq!(&encode(&literal)[8..], &[0xAB, 0, 0, 0]);
    }

    #[test]
    fn long_simple_payload_is_truncated() {
        let ack = AckEnvelope::simple_succeed(7, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ack.payload.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn extended_length_boundary() {
        let just_below = AckEnvelope::buffer_succeed(1, vec![0u8; 0xFFFE]);
        let bytes = encode(&just_below);
        assert_eq!(&bytes[6..8], &[0xFF, 0xFE]);
        assert_eq!(bytes.len(), 8 + 0xFFFE);

        let at_escape = AckEnvelope::buffer_succeed(1, vec![0u8; 0xFFFF]);
        let bytes = encode(&at_escape);
        assert_eq!(&bytes[6..12], &[0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(bytes.len(), 12 + 0xFFFF);

        let mut cursor = ByteCursor::from_bytes(&bytes);
        assert_eq!(AckEnvelope::decode(&mut cursor).unwrap(), at_escape);
    }

    #[test]
    fn decode_truncated_buffer_fails() {
        let ack = AckEnvelope::buffer_succeed(1, &b"abcdef"[..]);
        let bytes = encode(&ack);
        let mut cursor = ByteCursor::from_bytes(&bytes[..bytes.len() - 1]);
        assert!(matches!(
            AckEnvelope::decode(&mut cursor),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn to_frame_prefixes_ack_opcode() {
        let frame = AckEnvelope::simple_succeed(1, &[]).to_frame().unwrap();
        assert_eq!(frame.opcode_enum(), Some(Opcode::Ack));

        let mut cursor = ByteCursor::from_bytes(&frame.body);
        let ack = AckEnvelope::decode(&mut cursor).unwrap();
        assert_eq!(ack.handle, 1);
        assert!(ack.is_success());
    }
}
