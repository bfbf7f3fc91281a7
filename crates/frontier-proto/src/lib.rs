//! Wire format for the Frontier channel protocol.
//!
//! Every message on the wire is a 2-byte big-endian opcode followed by an
//! opcode-specific body. Bodies are read and written through [`ByteCursor`],
//! a growable buffer with a seekable cursor whose byte order can be switched
//! mid-message, because the protocol mixes big- and little-endian fields in
//! the same packet.
//!
//! # Layers
//!
//! - [`cursor`]: the byte cursor every packet is built on
//! - [`strings`]: length-prefixed, NUL-terminated strings with optional
//!   Shift-JIS transcoding
//! - [`ack`]: the generic request/response correlation envelope
//! - [`frame`] and [`payloads`]: opcode dispatch into typed messages
//!
//! # Failure model
//!
//! Reads never return partial data. A read that runs past the written region
//! fails with [`ProtocolError::UnexpectedEof`] and the caller drops the
//! packet.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ack;
pub mod cursor;
pub mod errors;
pub mod frame;
pub mod opcodes;
pub mod payloads;
pub mod strings;

pub use ack::AckEnvelope;
pub use cursor::{ByteCursor, Endian, Primitive};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use opcodes::Opcode;
pub use payloads::Payload;
