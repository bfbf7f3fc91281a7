//! Growable, seekable byte cursor.
//!
//! [`ByteCursor`] is the single buffer type every packet is parsed from and
//! built into. It keeps three positions:
//!
//! ```text
//!  0            index          used            buf.len()
//!  ├──────────────┼──────────────┼────────────────┤
//!  │  consumed    │   unread     │  spare capacity │
//! ```
//!
//! Writes land at `index`, grow the backing storage when needed and push
//! `used` forward. Reads never look past `used`. The byte order is a mutable
//! property of the cursor, consulted on every scalar access, because a single
//! packet may switch between big- and little-endian fields.

use std::io::SeekFrom;

use bytes::Bytes;

use crate::errors::{ProtocolError, Result};

/// Initial backing capacity of an empty cursor.
const INITIAL_CAPACITY: usize = 4;

/// Byte order applied to scalar reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Most significant byte first (protocol default)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width scalar that a [`ByteCursor`] can read and write.
///
/// Implemented for the 8/16/32/64-bit integers and both float widths. Floats
/// round-trip bit-for-bit, NaN payloads included.
pub trait Primitive: sealed::Sealed + Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Encode into the first [`Self::SIZE`] bytes of `out`.
    fn encode(self, endian: Endian, out: &mut [u8]);

    /// Decode from the first [`Self::SIZE`] bytes of `bytes`.
    fn decode(endian: Endian, bytes: &[u8]) -> Self;
}

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl Primitive for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn encode(self, endian: Endian, out: &mut [u8]) {
                let bytes = match endian {
                    Endian::Big => self.to_be_bytes(),
                    Endian::Little => self.to_le_bytes(),
                };
                out[..Self::SIZE].copy_from_slice(&bytes);
            }

            fn decode(endian: Endian, bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..Self::SIZE]);
                match endian {
                    Endian::Big => <$ty>::from_be_bytes(raw),
                    Endian::Little => <$ty>::from_le_bytes(raw),
                }
            }
        }
    )*};
}

impl_primitive!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

macro_rules! scalar_accessors {
    ($($write:ident, $read:ident => $ty:ty;)*) => {$(
        #[doc = concat!("Write a `", stringify!($ty), "` at the cursor in the current byte order.")]
        pub fn $write(&mut self, value: $ty) {
            self.write(value);
        }

        #[doc = concat!("Read a `", stringify!($ty), "` at the cursor in the current byte order.")]
        pub fn $read(&mut self) -> Result<$ty> {
            self.read()
        }
    )*};
}

/// Seekable read/write cursor over a growable byte buffer.
///
/// Owned by exactly one packet-processing call; never shared.
#[derive(Debug, Clone)]
pub struct ByteCursor {
    buf: Vec<u8>,
    index: usize,
    used: usize,
    endian: Endian,
}

impl Default for ByteCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteCursor {
    /// Empty cursor for building an outbound packet. Big-endian.
    pub fn new() -> Self {
        Self { buf: vec![0; INITIAL_CAPACITY], index: 0, used: 0, endian: Endian::Big }
    }

    /// Cursor positioned at the start of a copy of `data`. Big-endian.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self { buf: data.to_vec(), index: 0, used: data.len(), endian: Endian::Big }
    }

    /// Current byte order.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Switch byte order for all subsequent scalar accesses.
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Cursor position from the start of the buffer.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Number of bytes written (the high-water mark).
    pub fn len(&self) -> usize {
        self.used
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Bytes between the cursor and the end of written data.
    pub fn remaining(&self) -> usize {
        self.used - self.index
    }

    /// All written bytes.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.used]
    }

    /// Unread remainder, without copying.
    pub fn data_from_cursor(&self) -> &[u8] {
        &self.buf[self.index..self.used]
    }

    /// Consume the cursor, keeping only the written bytes.
    pub fn into_bytes(mut self) -> Bytes {
        self.buf.truncate(self.used);
        Bytes::from(self.buf)
    }

    /// Move the cursor.
    ///
    /// The target must lie within `0..=len()`; seeking into spare capacity
    /// is rejected so reads can never observe unwritten bytes.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<usize> {
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            SeekFrom::Current(offset) => {
                (self.index as i64).checked_add(offset).unwrap_or(i64::MAX)
            },
            SeekFrom::End(offset) => (self.used as i64).checked_add(offset).unwrap_or(i64::MAX),
        };

        if target < 0 || target > self.used as i64 {
            return Err(ProtocolError::SeekOutOfBounds { target, len: self.used });
        }

        self.index = target as usize;
        Ok(self.index)
    }

    /// Write a scalar at the cursor in the current byte order.
    pub fn write<T: Primitive>(&mut self, value: T) {
        self.reserve(T::SIZE);
        value.encode(self.endian, &mut self.buf[self.index..]);
        self.advance_write(T::SIZE);
    }

    /// Read a scalar at the cursor in the current byte order.
    pub fn read<T: Primitive>(&mut self) -> Result<T> {
        self.check_read(T::SIZE)?;
        let value = T::decode(self.endian, &self.buf[self.index..]);
        self.index += T::SIZE;
        Ok(value)
    }

    scalar_accessors! {
        write_u8, read_u8 => u8;
        write_u16, read_u16 => u16;
        write_u32, read_u32 => u32;
        write_u64, read_u64 => u64;
        write_i8, read_i8 => i8;
        write_i16, read_i16 => i16;
        write_i32, read_i32 => i32;
        write_i64, read_i64 => i64;
        write_f32, read_f32 => f32;
        write_f64, read_f64 => f64;
    }

    /// Write a bool as one byte (`1` or `0`).
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Read one byte as a bool; any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Write raw bytes at the cursor.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.buf[self.index..self.index + bytes.len()].copy_from_slice(bytes);
        self.advance_write(bytes.len());
    }

    /// Write raw bytes followed by a single NUL.
    pub fn write_null_terminated_bytes(&mut self, bytes: &[u8]) {
        self.write_bytes(bytes);
        self.write_u8(0);
    }

    /// Read exactly `size` bytes at the cursor.
    pub fn read_bytes(&mut self, size: usize) -> Result<&[u8]> {
        self.check_read(size)?;
        let start = self.index;
        self.index += size;
        Ok(&self.buf[start..start + size])
    }

    /// Read up to the next NUL and step past it.
    ///
    /// With no terminator before the end of data this returns an empty slice
    /// and leaves the cursor where it was.
    pub fn read_null_terminated_bytes(&mut self) -> &[u8] {
        let start = self.index;
        match self.buf[start..self.used].iter().position(|&b| b == 0) {
            Some(len) => {
                self.index = start + len + 1;
                &self.buf[start..start + len]
            },
            None => &[],
        }
    }

    fn reserve(&mut self, size: usize) {
        if self.index + size > self.buf.len() {
            // Grow by the larger of the request and the current capacity.
            let extra = size.max(self.buf.len());
            self.buf.resize(self.buf.len() + extra, 0);
        }
    }

    fn advance_write(&mut self, size: usize) {
        self.index += size;
        self.used = self.used.max(self.index);
    }

    fn check_read(&self, size: usize) -> Result<()> {
        let available = self.remaining();
        if size > available {
            return Err(ProtocolError::UnexpectedEof { offset: self.index, needed: size, available });
        }
        Ok(())
    }
}
