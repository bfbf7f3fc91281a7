//! Server error types.

use frontier_core::ConfigError;
use frontier_proto::ProtocolError;
use thiserror::Error;

/// Errors that end a connection or prevent the server from starting.
///
/// Protocol-state failures never show up here; they are answered with a
/// failed ACK and the connection stays open.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound bytes are not a valid message
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Length prefix exceeds the configured frame limit
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Announced frame length
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Configuration is unreadable or inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// `[sync]` limits are inconsistent
    #[error("invalid [sync] table: {0}")]
    SyncConfig(#[from] ConfigError),
}
