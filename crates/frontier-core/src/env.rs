//! Environment abstraction: time, sleeping and randomness.
//!
//! Tables never read the clock or an RNG directly. Production passes
//! [`SystemEnv`]; tests pass a seeded implementation and tokio's paused
//! clock.

use std::{future::Future, time::Duration};

use rand::RngCore;
use tokio::time::Instant;

/// Side effects the sync layer needs from its host.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> Instant;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Tokio clock and the thread-local OS-seeded RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}
