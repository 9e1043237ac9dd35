//! Deterministic test harness for the jobfair server.
//!
//! [`SimEnv`] replaces system time and entropy with tokio's clock and a
//! seeded RNG. Under `#[tokio::test(start_paused = true)]` the clock only
//! moves when the test advances it, so timer expiry and intermissions are
//! reproducible.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;

pub use sim_env::SimEnv;
