//! Blob codecs for the Frontier channel protocol.
//!
//! Save data and stage binaries arrive in one of three formats:
//!
//! - [`null_run`]: zero-run-length, identified by a 16-byte ASCII header
//! - [`jpk`]: LZ77 bitstream, identified by a 4-byte magic and a type field
//! - [`delta`]: headerless copy/literal patch, applied against a known base
//!
//! Decoders are pure functions over borrowed input. Data that does not
//! carry a decoder's header is returned unchanged ([`Cow::Borrowed`]), so
//! callers can feed blobs of unknown provenance. Input that claims a format
//! and then violates it fails with [`CompressionError`].
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod delta;
pub mod error;
pub mod jpk;
pub mod null_run;

use std::borrow::Cow;

pub use delta::apply_diff;
pub use error::{CompressionError, Result};

/// Format of a blob, judged by its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Null-run header present
    NullRun,
    /// JPK magic present (any type)
    Jpk,
    /// Neither header; raw data or a delta patch
    Unknown,
}

impl Codec {
    /// Classify `data` by its leading bytes.
    pub fn detect(data: &[u8]) -> Self {
        if null_run::is_null_run(data) {
            Self::NullRun
        } else if jpk::is_jpk(data) {
            Self::Jpk
        } else {
            Self::Unknown
        }
    }
}

/// Decode whatever container `data` is in.
///
/// JPK is unwrapped first, then null-run; either step passes foreign data
/// through, so raw input comes back borrowed.
pub fn decompress_any(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    match jpk::decompress(data)? {
        Cow::Borrowed(raw) => Ok(null_run::decompress(raw)),
        Cow::Owned(unpacked) => Ok(Cow::Owned(null_run::decompress(&unpacked).into_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_header() {
        assert_eq!(Codec::detect(null_run::MAGIC), Codec::NullRun);
        assert_eq!(Codec::detect(&[0x4A, 0x4B, 0x52, 0x1A, 0, 0, 3, 0]), Codec::Jpk);
        assert_eq!(Codec::detect(b"plain"), Codec::Unknown);
        assert_eq!(Codec::detect(&[]), Codec::Unknown);
    }

    #[test]
    fn decompress_any_unwraps_null_run() {
        let packed = null_run::compress(&[1, 0, 0, 0, 2]);
        assert_eq!(decompress_any(&packed).unwrap().as_ref(), &[1, 0, 0, 0, 2]);
    }

    #[test]
    fn decompress_any_borrows_raw_input() {
        let raw = b"raw bytes";
        assert!(matches!(decompress_any(raw).unwrap(), Cow::Borrowed(_)));
    }
}
