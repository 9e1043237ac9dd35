//! Error types for the round machine.
//!
//! Two classes matter to callers: validation failures (the request itself was
//! bad and the sender is told so) and precondition failures (the request was
//! well-formed but arrived at the wrong time, and is ignored).

use thiserror::Error;

use crate::{participant::ParticipantId, round::RoundPhase};

/// Errors raised by [`RoundState`](crate::RoundState),
/// [`ImprovSession`](crate::ImprovSession) and [`Game`](crate::Game).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    /// A game needs at least one participant
    #[error("cannot start a game without participants")]
    EmptyRoster,

    /// Operation does not apply in the current phase
    #[error("{operation} not allowed in phase {actual:?}")]
    WrongPhase {
        /// Operation that was attempted
        operation: &'static str,
        /// Phase the game was in
        actual: RoundPhase,
    },

    /// Participant is not part of the frozen roster
    #[error("participant {0} is not in this game")]
    UnknownParticipant(ParticipantId),

    /// Submitted job text was blank
    #[error("job text is empty")]
    EmptyJobText,

    /// Selected card is not one of the participant's drawn cards
    #[error("card {card_id} is not in the hand of {participant}")]
    CardNotInHand {
        /// Participant who selected
        participant: ParticipantId,
        /// Card that was referenced
        card_id: uuid::Uuid,
    },

    /// Card carries no text
    #[error("card {0} has no text")]
    BlankCard(uuid::Uuid),

    /// Participant already selected a card this game
    #[error("participant {0} already selected a card")]
    AlreadySelected(ParticipantId),

    /// No presentation is running
    #[error("no active presentation")]
    NoActivePresentation,

    /// The presenter tried to interrupt or score themselves
    #[error("presenter {0} cannot act on their own presentation")]
    PresenterNotAllowed(ParticipantId),

    /// Timer already expired or was disarmed
    #[error("presentation timer is not running")]
    TimerNotRunning,

    /// Participant already scored this presentation
    #[error("participant {0} already scored this presentation")]
    AlreadyScored(ParticipantId),

    /// Presentation already collected all of its scores
    #[error("presentation is closed")]
    RoundClosed,

    /// Previous presentation has not closed yet
    #[error("presentation {0} still in progress")]
    PresentationInProgress(u64),

    /// Advance request refers to a presentation that is not the closed one
    #[error("stale advance for presentation {requested}, current is {current}")]
    StaleAdvance {
        /// Presentation the request referred to
        requested: u64,
        /// Presentation currently tracked
        current: u64,
    },
}

impl RoundError {
    /// Returns true if the request itself was invalid.
    ///
    /// Validation failures are reported to the sender. Everything else is a
    /// precondition failure: the request is logged and ignored.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyJobText | Self::CardNotInHand { .. } | Self::BlankCard(_) | Self::EmptyRoster
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(RoundError::EmptyJobText.is_validation());
        assert!(RoundError::BlankCard(uuid::Uuid::nil()).is_validation());
        assert!(!RoundError::TimerNotRunning.is_validation());
        assert!(!RoundError::RoundClosed.is_validation());
    }
}
