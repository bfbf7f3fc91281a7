//! Admission limits and timeouts for the sync tables.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Inconsistent [`SyncConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_identifier_len` is zero
    #[error("max_identifier_len must be at least 1")]
    ZeroIdentifierLen,

    /// A default capacity falls outside `1..=max`
    #[error("{field} of {value} must be in 1..={max}")]
    DefaultOutOfRange {
        /// Offending key
        field: &'static str,
        /// Configured default
        value: u32,
        /// Configured upper bound
        max: u32,
    },
}

/// Limits applied by [`crate::SyncHub`].
///
/// Every field has a default, so an empty `[sync]` table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Longest accepted semaphore, mutex or stage identifier, in bytes
    pub max_identifier_len: usize,
    /// Holder capacity when a client asks for `0`
    pub default_semaphore_capacity: u32,
    /// Upper bound on any requested holder capacity
    pub max_semaphore_capacity: u32,
    /// Player cap of stages created implicitly or with a cap of `0`
    pub default_stage_capacity: u16,
    /// Upper bound on any requested player cap
    pub max_stage_capacity: u16,
    /// Entering an unknown stage creates it
    pub auto_create_stages: bool,
    /// How long `WAIT_STAGE_BINARY` waits for a publisher
    pub stage_binary_wait_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_identifier_len: 64,
            default_semaphore_capacity: 1,
            max_semaphore_capacity: 127,
            default_stage_capacity: 4,
            max_stage_capacity: 127,
            auto_create_stages: true,
            stage_binary_wait_timeout_ms: 30_000,
        }
    }
}

impl SyncConfig {
    /// Stage binary wait timeout as a [`Duration`].
    pub fn stage_binary_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_binary_wait_timeout_ms)
    }

    /// Effective holder capacity for a client request.
    pub fn semaphore_capacity(&self, requested: u32) -> u32 {
        match requested {
            0 => self.default_semaphore_capacity,
            n => n.min(self.max_semaphore_capacity),
        }
    }

    /// Effective player cap for a client request.
    pub fn stage_capacity(&self, requested: u16) -> u16 {
        match requested {
            0 => self.default_stage_capacity,
            n => n.min(self.max_stage_capacity),
        }
    }

    /// Reject limits that would make every request fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_identifier_len == 0 {
            return Err(ConfigError::ZeroIdentifierLen);
        }
        if self.default_semaphore_capacity == 0
            || self.default_semaphore_capacity > self.max_semaphore_capacity
        {
            return Err(ConfigError::DefaultOutOfRange {
                field: "default_semaphore_capacity",
                value: self.default_semaphore_capacity,
                max: self.max_semaphore_capacity,
            });
        }
        if self.default_stage_capacity == 0 || self.default_stage_capacity > self.max_stage_capacity
        {
            return Err(ConfigError::DefaultOutOfRange {
                field: "default_stage_capacity",
                value: u32::from(self.default_stage_capacity),
                max: u32::from(self.max_stage_capacity),
            });
        }
        Ok(())
    }
}
