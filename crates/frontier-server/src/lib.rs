//! Frontier channel server.
//!
//! Accepts TCP connections, frames messages with a `u32` length prefix and
//! routes every request through one shared [`frontier_core::SyncHub`].
//!
//! # Components
//!
//! - [`transport`]: length-prefixed message framing
//! - [`dispatch`]: request to [`ServerAction`] mapping, no I/O
//! - [`registry`]: connected sessions and their outbound queues
//! - [`server`]: accept loop and per-connection tasks
//! - [`config`]: TOML configuration

pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod server;
pub mod transport;

pub use config::ServerConfig;
pub use dispatch::{Dispatcher, ServerAction};
pub use error::ServerError;
pub use registry::SessionRegistry;
pub use server::Server;
