//! Length-prefixed string encoding.
//!
//! Strings travel as "Pascal strings": a 1, 2 or 4 byte length equal to the
//! encoded byte count plus one, the encoded bytes, then a single NUL. Player
//! visible text is transcoded to Shift-JIS first; identifiers stay as raw
//! ASCII/UTF-8. The caller picks with the `sjis` flag.

use std::borrow::Cow;

use encoding_rs::SHIFT_JIS;

use crate::{
    cursor::ByteCursor,
    errors::{ProtocolError, Result},
};

/// Width of a Pascal string length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// 1-byte length
    U8,
    /// 2-byte length
    U16,
    /// 4-byte length
    U32,
}

impl LengthPrefix {
    fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    fn max(self) -> u64 {
        match self {
            Self::U8 => u64::from(u8::MAX),
            Self::U16 => u64::from(u16::MAX),
            Self::U32 => u64::from(u32::MAX),
        }
    }
}

/// Encode text as Shift-JIS (`sjis`) or leave it as UTF-8 bytes.
pub fn encode_text(text: &str, sjis: bool) -> Result<Cow<'_, [u8]>> {
    if !sjis {
        return Ok(Cow::Borrowed(text.as_bytes()));
    }
    let (bytes, _, had_errors) = SHIFT_JIS.encode(text);
    if had_errors {
        return Err(ProtocolError::UnmappableCharacter);
    }
    Ok(bytes)
}

/// Decode Shift-JIS (`sjis`) or UTF-8 bytes into a string.
pub fn decode_text(bytes: &[u8], sjis: bool) -> Result<String> {
    if sjis {
        SHIFT_JIS
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(Cow::into_owned)
            .ok_or(ProtocolError::InvalidString { encoding: "Shift-JIS" })
    } else {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidString { encoding: "UTF-8" })
    }
}

/// Bytes before the first NUL, or all of `bytes` if there is none.
pub fn up_to_nul(bytes: &[u8]) -> &[u8] {
    bytes.iter().position(|&b| b == 0).map_or(bytes, |end| &bytes[..end])
}

/// Write `text` as a Pascal string with the given prefix width.
pub fn write_pascal(
    cursor: &mut ByteCursor,
    prefix: LengthPrefix,
    text: &str,
    sjis: bool,
) -> Result<()> {
    let bytes = encode_text(text, sjis)?;
    let len = bytes.len() + 1;
    if len as u64 > prefix.max() {
        return Err(ProtocolError::StringTooLong { len, width: prefix.width() });
    }

    match prefix {
        LengthPrefix::U8 => cursor.write_u8(len as u8),
        LengthPrefix::U16 => cursor.write_u16(len as u16),
        LengthPrefix::U32 => cursor.write_u32(len as u32),
    }
    cursor.write_null_terminated_bytes(&bytes);
    Ok(())
}

/// Read a Pascal string with the given prefix width.
///
/// The declared length is consumed in full; the string ends at the first
/// NUL inside it.
pub fn read_pascal(cursor: &mut ByteCursor, prefix: LengthPrefix, sjis: bool) -> Result<String> {
    let len = match prefix {
        LengthPrefix::U8 => usize::from(cursor.read_u8()?),
        LengthPrefix::U16 => usize::from(cursor.read_u16()?),
        LengthPrefix::U32 => cursor.read_u32()? as usize,
    };
    let raw = cursor.read_bytes(len)?;
    decode_text(up_to_nul(raw), sjis)
}

#[cfg(test)]
mod tests {
    use std::io::SeekFrom;

    use super::*;

    #[test]
    fn pascal_u8_layout() {
        let mut cursor = ByteCursor::new();
        write_pascal(&mut cursor, LengthPrefix::U8, "abc", false).unwrap();
        assert_eq!(cursor.data(), &[4, b'a', b'b', b'c', 0]);
    }

    #[test]
    fn pascal_u16_layout_follows_cursor_endianness() {
        let mut cursor = ByteCursor::new();
        write_pascal(&mut cursor, LengthPrefix::U16, "ab", false).unwrap();
        cursor.set_endian(crate::Endian::Little);
        write_pascal(&mut cursor, LengthPrefix::U16, "ab", false).unwrap();
        assert_eq!(cursor.data(), &[0, 3, b'a', b'b', 0, 3, 0, b'a', b'b', 0]);
    }

    #[test]
    fn empty_string_is_just_terminator() {
        let mut cursor = ByteCursor::new();
        write_pascal(&mut cursor, LengthPrefix::U32, "", false).unwrap();
        assert_eq!(cursor.data(), &[0, 0, 0, 1, 0]);
        cursor.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(read_pascal(&mut cursor, LengthPrefix::U32, false).unwrap(), "");
    }

    #[test]
    fn zero_length_prefix_reads_empty() {
        let mut cursor = ByteCursor::from_bytes(&[0, 7]);
        assert_eq!(read_pascal(&mut cursor, LengthPrefix::U8, false).unwrap(), "");
        assert_eq!(cursor.read_u8().unwrap(), 7);
    }

    #[test]
    fn shift_jis_hiragana() {
        let mut cursor = ByteCursor::new();
        write_pascal(&mut cursor, LengthPrefix::U8, "あ", true).unwrap();
        assert_eq!(cursor.data(), &[3, 0x82, 0xA0, 0]);

        cursor.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(read_pascal(&mut cursor, LengthPrefix::U8, true).unwrap(), "あ");
    }

    #[test]
    fn unmappable_character_rejected() {
        let mut cursor = ByteCursor::new();
        let err = write_pascal(&mut cursor, LengthPrefix::U8, "😀", true).unwrap_err();
        assert_eq!(err, ProtocolError::UnmappableCharacter);
        assert!(cursor.is_empty());
    }

    #[test]
    fn oversized_string_rejected() {
        let long = "x".repeat(255);
        let mut cursor = ByteCursor::new();
        let err = write_pascal(&mut cursor, LengthPrefix::U8, &long, false).unwrap_err();
        assert_eq!(err, ProtocolError::StringTooLong { len: 256, width: 1 });
    }

    #[test]
    fn declared_length_consumed_past_embedded_nul() {
        let mut cursor = ByteCursor::from_bytes(&[6, b'h', b'i', 0, 0xFF, 0xFF, 0, 42]);
        assert_eq!(read_pascal(&mut cursor, LengthPrefix::U8, false).unwrap(), "hi");
        assert_eq!(cursor.read_u8().unwrap(), 42);
    }

    #[test]
    fn truncated_string_fails() {
        let mut cursor = ByteCursor::from_bytes(&[10, b'a']);
        assert!(matches!(
            read_pascal(&mut cursor, LengthPrefix::U8, false),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut cursor = ByteCursor::from_bytes(&[3, 0xC3, 0x28, 0]);
        assert_eq!(
            read_pascal(&mut cursor, LengthPrefix::U8, false).unwrap_err(),
            ProtocolError::InvalidString { encoding: "UTF-8" }
        );
    }
}
