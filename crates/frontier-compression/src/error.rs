//! Compression error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, CompressionError>;

/// Malformed compressed input.
///
/// Unknown formats are not errors: every decoder passes foreign data through
/// unchanged. These variants cover input that claims a format and then
/// breaks it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    /// JPK magic present but the header is cut short
    #[error("JPK header truncated: need {needed} bytes, have {available}")]
    TruncatedHeader {
        /// Bytes the header requires
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// A signed header field was negative
    #[error("JPK {field} is negative: {value}")]
    NegativeField {
        /// Field name
        field: &'static str,
        /// Decoded value
        value: i32,
    },

    /// Declared output exceeds the decoder's limit
    #[error("JPK output of {size} bytes exceeds limit of {limit}")]
    OutputTooLarge {
        /// Declared output size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Bitstream start offset lies outside the input
    #[error("JPK start offset {start} outside input of {len} bytes")]
    StartOutOfBounds {
        /// Declared start offset
        start: usize,
        /// Input length
        len: usize,
    },

    /// Compressed stream ended mid-token
    #[error("compressed stream truncated at offset {offset}")]
    TruncatedInput {
        /// Input offset of the missing byte
        offset: usize,
    },

    /// Back-reference points before the start of the output
    #[error("back-reference distance {distance} at output offset {position}")]
    BadBackReference {
        /// Output position being written
        position: usize,
        /// Distance back (offset + 1)
        distance: usize,
    },

    /// A token would write past the end of the output buffer
    #[error("output overflow at offset {position} (capacity {capacity})")]
    OutputOverflow {
        /// Output position being written
        position: usize,
        /// Output buffer size
        capacity: usize,
    },

    /// Delta patch claims more literal bytes than it carries
    #[error("delta patch truncated: {needed} literal bytes at patch offset {offset}")]
    PatchTruncated {
        /// Patch offset of the first missing literal
        offset: usize,
        /// Literal bytes claimed by the record
        needed: usize,
    },

    /// Delta record with a zero different-count
    #[error("delta patch record at offset {offset} has a zero different-count")]
    ZeroDifferentCount {
        /// Patch offset of the count
        offset: usize,
    },

    /// Delta record writes outside the base buffer
    #[error("delta patch writes at {position}, base is {len} bytes")]
    PatchOutOfRange {
        /// Base offset of the write
        position: i64,
        /// Base buffer length
        len: usize,
    },
}
