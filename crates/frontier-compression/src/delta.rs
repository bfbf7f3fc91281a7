//! Delta patch decoder.
//!
//! A patch is a headerless sequence of records applied over a copy of the
//! base buffer:
//!
//! ```text
//! ┌─────────────┬─────────────────┬──────────────────────────┐
//! │ match count │ different count │ different - 1 literals   │ ...
//! └─────────────┴─────────────────┴──────────────────────────┘
//! ```
//!
//! Counts are one byte, or `0x00` followed by a big-endian `u16`. The running
//! offset starts at -1 and after each record rests on the last literal
//! written, so every match count is one larger than the number of bytes it
//! leaves untouched.
//!
//! The patch ends where the stream ends. A count cut short ends the patch
//! quietly; literals cut short are an error.

use crate::error::{CompressionError, Result};

struct PatchReader<'a> {
    patch: &'a [u8],
    pos: usize,
}

impl<'a> PatchReader<'a> {
    fn u8(&mut self) -> Option<u8> {
        let byte = *self.patch.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes = self.patch.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn count(&mut self) -> Option<usize> {
        match self.u8()? {
            0 => self.u16().map(usize::from),
            n => Some(usize::from(n)),
        }
    }

    fn literals(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self
            .patch
            .get(self.pos..self.pos + n)
            .ok_or(CompressionError::PatchTruncated { offset: self.pos, needed: n })?;
        self.pos += n;
        Ok(bytes)
    }
}

/// Apply `patch` over a copy of `base`.
pub fn apply_diff(patch: &[u8], base: &[u8]) -> Result<Vec<u8>> {
    let mut out = base.to_vec();
    let mut reader = PatchReader { patch, pos: 0 };
    let mut offset: i64 = -1;

    loop {
        let Some(match_count) = reader.count() else { break };
        offset += match_count as i64;

        let count_at = reader.pos;
        let Some(different_count) = reader.count() else { break };
        let literal_count = different_count
            .checked_sub(1)
            .ok_or(CompressionError::ZeroDifferentCount { offset: count_at })?;

        let literals = reader.literals(literal_count)?;
        if !literals.is_empty() {
            let start = usize::try_from(offset)
                .ok()
                .filter(|start| start + literals.len() <= out.len())
                .ok_or(CompressionError::PatchOutOfRange { position: offset, len: out.len() })?;
            out[start..start + literals.len()].copy_from_slice(literals);
        }

        offset += literal_count as i64 - 1;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn empty_patch_is_identity() {
        let base = hex!("00112233");
        assert_eq!(apply_diff(&[], &base).unwrap(), base);
    }

    #[test]
    fn first_record_is_biased() {
        let out = apply_diff(&hex!("01 03 aabb"), &hex!("00112233")).unwrap();
        assert_eq!(out, hex!("aabb2233"));
    }

    #[test]
    fn second_record_is_relative_to_last_literal() {
        let out = apply_diff(&hex!("01 03 aabb 02 02 cc"), &hex!("0011223344")).unwrap();
        assert_eq!(out, hex!("aabb 22 cc 44"));
    }

    #[test]
    fn escaped_counts() {
        let base = vec![0u8; 300];
        let out = apply_diff(&hex!("00 0101 02 ee"), &base).unwrap();
        assert_eq!(out[256], 0xEE);
        assert_eq!(out.iter().filter(|&&b| b != 0).count(), 1);
    }

    #[test]
    fn truncated_count_ends_patch() {
        let base = hex!("00112233");
        assert_eq!(apply_diff(&hex!("01 03 aabb 00 01"), &base).unwrap(), hex!("aabb2233"));
        assert_eq!(apply_diff(&hex!("02"), &base).unwrap(), base);
    }

    #[test]
    fn truncated_literals_fail() {
        let err = apply_diff(&hex!("01 05 aabb"), &hex!("00112233")).unwrap_err();
        assert_eq!(err, CompressionError::PatchTruncated { offset: 2, needed: 4 });
    }

    #[test]
    fn zero_different_count_fails() {
        let err = apply_diff(&hex!("01 00 0000"), &hex!("00")).unwrap_err();
        assert_eq!(err, CompressionError::ZeroDifferentCount { offset: 1 });
    }

    #[test]
    fn write_past_base_fails() {
        let err = apply_diff(&hex!("04 03 ffff"), &hex!("00112233")).unwrap_err();
        assert_eq!(err, CompressionError::PatchOutOfRange { position: 3, len: 4 });
        let err = apply_diff(&hex!("05 02 ff"), &hex!("00112233")).unwrap_err();
        assert_eq!(err, CompressionError::PatchOutOfRange { position: 4, len: 4 });
    }
}
