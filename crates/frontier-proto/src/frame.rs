//! Message framing: opcode plus body.
//!
//! A frame is the unit the dispatch layer routes on. Transport-level length
//! prefixes are not part of it.

use bytes::Bytes;

use crate::{
    cursor::ByteCursor,
    errors::{ProtocolError, Result},
    opcodes::Opcode,
};

/// One protocol message: a 2-byte big-endian opcode and its raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: u16,
    /// Opcode-specific body
    pub body: Bytes,
}

impl Frame {
    /// Size of the opcode prefix.
    pub const OPCODE_SIZE: usize = 2;

    /// Build a frame for a known opcode.
    pub fn new(opcode: Opcode, body: impl Into<Bytes>) -> Self {
        Self { opcode: opcode.to_u16(), body: body.into() }
    }

    /// Raw opcode value, known or not.
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    /// Opcode as an enum, if this implementation knows it.
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode)
    }

    /// Split raw message bytes into opcode and body.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::from_bytes(bytes);
        let opcode = cursor.read_u16()?;
        Ok(Self { opcode, body: Bytes::copy_from_slice(cursor.data_from_cursor()) })
    }

    /// Serialize as opcode followed by body.
    pub fn encode(&self) -> Bytes {
        let mut cursor = ByteCursor::new();
        cursor.write_u16(self.opcode);
        cursor.write_bytes(&self.body);
        cursor.into_bytes()
    }

    /// Known opcode or [`ProtocolError::UnknownOpcode`].
    pub fn require_opcode(&self) -> Result<Opcode> {
        self.opcode_enum().ok_or(ProtocolError::UnknownOpcode(self.opcode))
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn opcode_is_big_endian_prefix() {
        let frame = Frame::new(Opcode::Ping, hex!("00000001").to_vec());
        assert_eq!(frame.encode().as_ref(), &hex!("0017 00000001"));
    }

    #[test]
    fn decode_splits_body() {
        let frame = Frame::decode(&hex!("0022 0102")).unwrap();
        assert_eq!(frame.opcode_enum(), Some(Opcode::EnterStage));
        assert_eq!(frame.body.as_ref(), &[1, 2]);
    }

    #[test]
    fn decode_keeps_unknown_opcode() {
        let frame = Frame::decode(&hex!("7fff")).unwrap();
        assert_eq!(frame.opcode(), 0x7fff);
        assert_eq!(frame.opcode_enum(), None);
        assert_eq!(frame.require_opcode(), Err(ProtocolError::UnknownOpcode(0x7fff)));
    }

    #[test]
    fn decode_rejects_short_input() {
        assert!(matches!(Frame::decode(&[0x00]), Err(ProtocolError::UnexpectedEof { .. })));
    }
}
