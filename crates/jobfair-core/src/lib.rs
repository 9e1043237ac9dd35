//! Game logic for the jobfair session server.
//!
//! Pure state machines with no I/O. Time is passed in, randomness comes
//! through [`Environment`], and deferred work (timer expiry, intermission) is
//! returned to the caller to schedule.
//!
//! # Components
//!
//! - [`RoundState`]: job collection, dealing and card selection
//! - [`ImprovSession`]: presentation order, timer generations, scoring
//! - [`Game`]: one full game over a frozen roster
//! - [`GameConfig`]: limits, durations and connection settings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod game;
pub mod improv;
pub mod participant;
pub mod round;

pub use config::GameConfig;
pub use env::Environment;
pub use error::RoundError;
pub use game::{Advance, CardSelection, Game, ImprovStart, ScoreOutcome, TimerOutcome};
pub use improv::{
    ClosedPresentation, ImprovSession, Interruption, PresentationQueue, PresentationStart,
    RoundStart, RoundTimes, SessionCounters, Timer,
};
pub use participant::{ParticipantId, ParticipantRecord};
pub use round::{JobSubmission, RoundPhase, RoundState, Selection};
