//! JPK decoder.
//!
//! JPK is an LZ77 variant. Control bits are pulled one at a time from flag
//! bytes that are interleaved with the data bytes in a single stream; a flag
//! byte is fetched whenever the previous one runs out of bits.
//!
//! ```text
//! 0               literal byte
//! 1 0 LL  off     copy LL+3 bytes, distance off+1
//! 1 1 hi lo       LLL = hi >> 5, off = (hi & 0x1f) << 8 | lo
//!     LLL != 0    copy LLL+2 bytes
//!     LLL == 0
//!       0 LLLL    copy LLLL+10 bytes
//!       1 n       n == 0xff: off+0x1b literal bytes, else copy n+0x1a bytes
//! ```
//!
//! Copies run byte by byte so a short distance repeats the bytes it has
//! just written.
//!
//! # Header
//!
//! All fields little-endian: magic `u32`, two reserved bytes, type `u16`.
//! Type 3 follows with a start offset `i32` and an output size `i32`; the
//! bitstream begins at the start offset. Missing magic or any other type is
//! passed through untouched.

use std::borrow::Cow;

use tracing::trace;
use zerocopy::{
    FromBytes, Immutable, KnownLayout, Unaligned,
    byteorder::little_endian::{I32, U16, U32},
};

use crate::error::{CompressionError, Result};

/// Little-endian magic: `"JKR\x1a"`.
pub const MAGIC: u32 = 0x1A52_4B4A;

/// The only JPK type this decoder expands.
pub const TYPE_LZ: u16 = 3;

/// Largest output size accepted by [`decompress`].
pub const DEFAULT_MAX_OUTPUT: usize = 64 * 1024 * 1024;

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct Header {
    _magic: U32,
    _reserved: U16,
    kind: U16,
}

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct LzHeader {
    start: I32,
    out_size: I32,
}

const HEADER_LEN: usize = size_of::<Header>() + size_of::<LzHeader>();

/// True when `data` starts with the JPK magic.
pub fn is_jpk(data: &[u8]) -> bool {
    U32::read_from_prefix(data).is_ok_and(|(magic, _)| magic.get() == MAGIC)
}

/// Decode a JPK blob with the default output limit.
pub fn decompress(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    decompress_with_limit(data, DEFAULT_MAX_OUTPUT)
}

/// Decode a JPK blob, rejecting declared outputs larger than `limit`.
///
/// Returns the input unchanged when it is not a type-3 JPK blob.
pub fn decompress_with_limit(data: &[u8], limit: usize) -> Result<Cow<'_, [u8]>> {
    if !is_jpk(data) {
        trace!(len = data.len(), "JPK magic absent, passing through");
        return Ok(Cow::Borrowed(data));
    }

    let truncated = || CompressionError::TruncatedHeader { needed: HEADER_LEN, available: data.len() };
    let (header, rest) = Header::read_from_prefix(data).map_err(|_| truncated())?;
    if header.kind.get() != TYPE_LZ {
        trace!(kind = header.kind.get(), "unsupported JPK type, passing through");
        return Ok(Cow::Borrowed(data));
    }
    let (lz, _) = LzHeader::read_from_prefix(rest).map_err(|_| truncated())?;

    let start = non_negative("start offset", lz.start.get())?;
    let out_size = non_negative("output size", lz.out_size.get())?;
    if out_size > limit {
        return Err(CompressionError::OutputTooLarge { size: out_size, limit });
    }
    if start > data.len() {
        return Err(CompressionError::StartOutOfBounds { start, len: data.len() });
    }

    let mut decoder = Decoder::new(data, start, out_size);
    decoder.run()?;
    Ok(Cow::Owned(decoder.out))
}

fn non_negative(field: &'static str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| CompressionError::NegativeField { field, value })
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    flag: u8,
    /// Bits left in `flag`
    bits: u8,
    out: Vec<u8>,
    out_index: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a [u8], start: usize, out_size: usize) -> Self {
        Self { input, pos: start, flag: 0, bits: 0, out: vec![0; out_size], out_index: 0 }
    }

    fn run(&mut self) -> Result<()> {
        // Decoding stops one slot short of the declared size, so the last
        // output byte is never written. Existing assets depend on this; it
        // may be an off-by-one in the format's reference encoder.
        while self.pos < self.input.len() && self.out_index + 1 < self.out.len() {
            if self.bit()? == 0 {
                let byte = self.byte()?;
                self.put(byte)?;
                continue;
            }

            if self.bit()? == 0 {
                let len = (self.bit()? << 1) | self.bit()?;
                let off = self.byte()?;
                self.copy(usize::from(off), usize::from(len) + 3)?;
                continue;
            }

            let hi = self.byte()?;
            let lo = self.byte()?;
            let len = usize::from(hi >> 5);
            let off = (usize::from(hi & 0x1F) << 8) | usize::from(lo);
            if len != 0 {
                self.copy(off, len + 2)?;
                continue;
            }

            if self.bit()? == 0 {
                let mut len = 0usize;
                for _ in 0..4 {
                    len = (len << 1) | usize::from(self.bit()?);
                }
                self.copy(off, len + 10)?;
                continue;
            }

            let n = self.byte()?;
            if n == 0xFF {
                for _ in 0..off + 0x1B {
                    let byte = self.byte()?;
                    self.put(byte)?;
                }
            } else {
                self.copy(off, usize::from(n) + 0x1A)?;
            }
        }
        Ok(())
    }

    fn bit(&mut self) -> Result<u8> {
        if self.bits == 0 {
            self.flag = self.byte()?;
            self.bits = 8;
        }
        self.bits -= 1;
        Ok((self.flag >> self.bits) & 1)
    }

    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(CompressionError::TruncatedInput { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn put(&mut self, byte: u8) -> Result<()> {
        let capacity = self.out.len();
        let slot = self.out.get_mut(self.out_index).ok_or(CompressionError::OutputOverflow {
            position: self.out_index,
            capacity,
        })?;
        *slot = byte;
        self.out_index += 1;
        Ok(())
    }

    fn copy(&mut self, off: usize, len: usize) -> Result<()> {
        let distance = off + 1;
        if distance > self.out_index {
            return Err(CompressionError::BadBackReference { position: self.out_index, distance });
        }
        for _ in 0..len {
            let byte = self.out[self.out_index - distance];
            self.put(byte)?;
        }
        Ok(())
    }
}
