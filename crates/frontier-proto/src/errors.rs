//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while reading or writing wire data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A read needed more bytes than remain before the end of written data.
    #[error("unexpected end of data: needed {needed} bytes at offset {offset}, {available} available")]
    UnexpectedEof {
        /// Cursor position when the read started
        offset: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes left between the cursor and the end of written data
        available: usize,
    },

    /// Seek target lies outside `0..=len`.
    #[error("seek out of bounds: target {target}, length {len}")]
    SeekOutOfBounds {
        /// Requested absolute position (may be negative)
        target: i64,
        /// Written length of the buffer
        len: usize,
    },

    /// Opcode not known to this implementation.
    #[error("unknown opcode 0x{0:04x}")]
    UnknownOpcode(u16),

    /// Opcode known, but only valid in the other direction.
    #[error("opcode {0:?} cannot be decoded as a client request")]
    UnexpectedOpcode(crate::Opcode),

    /// String bytes are not valid in the selected text encoding.
    #[error("string is not valid {encoding}")]
    InvalidString {
        /// Encoding that rejected the bytes
        encoding: &'static str,
    },

    /// String contains characters Shift-JIS cannot represent.
    #[error("string cannot be encoded as Shift-JIS")]
    UnmappableCharacter,

    /// String longer than its length prefix can describe.
    #[error("string of {len} bytes does not fit a {width}-byte length prefix")]
    StringTooLong {
        /// Encoded length including the terminator
        len: usize,
        /// Width of the length prefix in bytes
        width: usize,
    },

    /// Field value violates a protocol limit.
    #[error("field {field} too large: {size} > {max}")]
    FieldTooLarge {
        /// Field name
        field: &'static str,
        /// Actual size
        size: usize,
        /// Maximum allowed
        max: usize,
    },
}
