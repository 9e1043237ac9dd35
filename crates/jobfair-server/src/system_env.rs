//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` uses real monotonic time, tokio's timer for sleeping and the OS
//! RNG for session codes, participant ids and card ids. Behavior is therefore
//! not reproducible; tests use `jobfair_harness::SimEnv` instead.

use std::time::Duration;

use jobfair_core::Environment;

/// Production environment using system time and the OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without randomness the server cannot mint
/// unguessable participant ids, and such a failure indicates an OS-level
/// problem that retrying will not fix.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
