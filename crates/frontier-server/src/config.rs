//! Server configuration.
//!
//! Loaded from a TOML file; every key is optional. The `[sync]` table maps
//! onto [`SyncConfig`].
//!
//! ```toml
//! bind_addr = "0.0.0.0:54001"
//! max_frame_bytes = 16777216
//! send_queue_depth = 20
//!
//! [sync]
//! stage_binary_wait_timeout_ms = 30000
//! ```

use std::{net::SocketAddr, path::Path};

use frontier_core::SyncConfig;
use serde::Deserialize;

use crate::error::ServerError;

/// Runtime settings of one server process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Largest accepted message, opcode included
    pub max_frame_bytes: usize,
    /// Outbound frames buffered per session before senders wait
    pub send_queue_depth: usize,
    /// Sync table limits
    pub sync: SyncConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 54001)),
            max_frame_bytes: 16 * 1024 * 1024,
            send_queue_depth: 20,
            sync: SyncConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_frame_bytes < frontier_proto::Frame::OPCODE_SIZE {
            return Err(ServerError::Config("max_frame_bytes must fit an opcode".to_owned()));
        }
        if self.send_queue_depth == 0 {
            return Err(ServerError::Config("send_queue_depth must be at least 1".to_owned()));
        }
        Ok(self.sync.validate()?)
    }
}

#[cfg(test)]
mod tests {
    use frontier_core::ConfigError;

    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ServerConfig::from_toml("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn sync_table_is_nested() {
        let config = ServerConfig::from_toml(
            r#"
            bind_addr = "127.0.0.1:4000"

            [sync]
            max_identifier_len = 32
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 4000)));
        assert_eq!(config.sync.max_identifier_len, 32);
        assert_eq!(config.send_queue_depth, 20);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(ServerConfig::from_toml("send_queue_depth = 0"), Err(ServerError::Config(_))));
        assert!(matches!(
            ServerConfig::from_toml("[sync]\nmax_identifier_len = 0"),
            Err(ServerError::SyncConfig(ConfigError::ZeroIdentifierLen))
        ));
        assert!(matches!(ServerConfig::from_toml("port = 1"), Err(ServerError::Config(_))));
    }
}
