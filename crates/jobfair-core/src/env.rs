//! Environment abstraction for deterministic testing.
//!
//! Decouples game logic from system resources (time, randomness). The round
//! machine shuffles and mints card ids through this trait, so a seeded
//! environment replays a whole game exactly.

use std::{
    fmt,
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

use rand::{RngCore, seq::SliceRandom};
use uuid::Uuid;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses OS entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Timer deadlines are expressed in this type, so it must support adding
    /// a round duration.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + fmt::Debug
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps. Game logic receives `now` as an argument.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// Generates a version 4 UUID from the environment's entropy.
    fn random_uuid(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Adapter exposing an [`Environment`] as a `rand` RNG.
pub struct EnvRng<'a, E> {
    env: &'a E,
}

impl<'a, E: Environment> EnvRng<'a, E> {
    /// Borrow `env` as a random source.
    pub fn new(env: &'a E) -> Self {
        Self { env }
    }
}

impl<E: Environment> RngCore for EnvRng<'_, E> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.env.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        self.env.random_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.env.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.env.random_bytes(dest);
        Ok(())
    }
}

/// Uniformly shuffle `items` using the environment's entropy.
pub fn shuffle<E: Environment, T>(env: &E, items: &mut [T]) {
    items.shuffle(&mut EnvRng::new(env));
}
