//! Server-side synchronization for the Frontier channel protocol.
//!
//! Clients coordinate through named resources the server arbitrates:
//! semaphores, mutexes, global locks and stages. Every table here is a
//! process-wide map keyed by client-supplied strings, created on demand and
//! collected once nothing references an entry.
//!
//! Tables hold no I/O. Handlers call into [`SyncHub`], turn the result into
//! an ACK and decide who else to notify. Time and randomness come from an
//! [`Environment`] so tests run on a paused clock with a seeded RNG.
//!
//! # Components
//!
//! - [`semaphore`]: admission-controlled named semaphores with handles
//! - [`mutex`]: single-holder semaphores
//! - [`global_lock`]: `user:channel` keyed locks
//! - [`stage`]: rooms with members, reservations and a binary side-table
//! - [`hub`]: the façade plus disconnect cleanup
//! - [`mod@env`]: time and randomness abstraction

pub mod config;
pub mod env;
pub mod error;
pub mod global_lock;
pub mod hub;
pub mod mutex;
pub mod semaphore;
pub mod session;
pub mod stage;

pub use config::{ConfigError, SyncConfig};
pub use env::{Environment, SystemEnv};
pub use error::SyncError;
pub use global_lock::GlobalLockTable;
pub use hub::{DisconnectReport, LOG_KEY_LEN, SyncHub};
pub use mutex::MutexTable;
pub use semaphore::{Grant, SemaphoreInfo, SemaphoreTable};
pub use session::SessionId;
pub use stage::{BinaryKey, PasswordTarget, StageDeparture, StageInfo, StageTable, Transfer};
