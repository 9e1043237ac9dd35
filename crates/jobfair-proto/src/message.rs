//! Typed messages exchanged between clients and the server.
//!
//! # Invariants
//!
//! - Each variant maps to exactly one `message_type` tag per direction.
//! - Decoding is strict: unknown tags, missing fields and malformed UUIDs are
//!   all [`ProtocolError::Malformed`]. The session answers those with
//!   `connection_rejected`.

use serde::{Deserialize, Serialize};

use crate::{
    card::{Card, ParticipantId},
    errors::{ProtocolError, Result},
};

/// Messages sent by the host display or by participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Host asks to open a new session.
    CreateLobby,

    /// Participant asks to join the open session.
    LobbyJoinAttempt {
        /// Session code shown on the host display
        lobby_code: String,
        /// Display name chosen by the participant
        name: String,
    },

    /// Host starts the game with the currently joined participants.
    GameStart,

    /// Participant submits one job description.
    JobSubmitted {
        /// Job description text
        job_input: String,
    },

    /// Participant picks the card they will present with.
    CardData {
        /// The selected card, taken from the participant's drawn cards
        card: Card,
    },

    /// Participant interrupts the current presenter with a card.
    InterceptCardData {
        /// The card played as the interruption
        card: Card,
    },

    /// Participant scores the current presenter.
    ScoreSubmission {
        /// Offered salary in cents
        score_in_cents: i64,
    },
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// Encode to a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|source| ProtocolError::Encode { message_type: self.message_type(), source })
    }

    /// Wire tag of this message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::CreateLobby => "create_lobby",
            Self::LobbyJoinAttempt { .. } => "lobby_join_attempt",
            Self::GameStart => "game_start",
            Self::JobSubmitted { .. } => "job_submitted",
            Self::CardData { .. } => "card_data",
            Self::InterceptCardData { .. } => "intercept_card_data",
            Self::ScoreSubmission { .. } => "score_submission",
        }
    }
}

/// A joined participant as announced to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Assigned participant id
    pub player_id: ParticipantId,
    /// Display name
    pub name: String,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session code for the host to display.
    LobbyCode {
        /// The session code participants must enter
        lobby_code: String,
    },

    /// A participant id. Sent to a joining participant (their own id), to
    /// participants when a presenter starts, and to the host when someone
    /// scores.
    PlayerId {
        /// The participant being referred to
        player_id: ParticipantId,
    },

    /// A participant joined (host only).
    PlayerJoined {
        /// The joined participant
        player: PlayerInfo,
    },

    /// Game started; every participant owes this many job submissions.
    GameStart {
        /// Jobs each participant must submit
        number_of_jobs: usize,
    },

    /// A participant submitted all of their jobs (host only).
    #[serde(rename = "player_job_submitting_finished")]
    JobSubmittingFinished {
        /// The participant who finished
        player_id: ParticipantId,
    },

    /// Cards were dealt. The host receives the bare notification, each
    /// participant receives their own hand.
    ReceivedCards {
        /// Cards the participant may present with
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drawn_cards: Option<Vec<Card>>,
        /// The job the participant is applying for
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_card: Option<Card>,
    },

    /// A participant selected their card (host only).
    CardData {
        /// The participant who selected
        player_id: ParticipantId,
    },

    /// A presentation round started (host only).
    PlayerImprovStart {
        /// The presenter
        player_id: ParticipantId,
        /// Card the presenter selected
        selected_card: Card,
        /// Job the presenter is applying for
        job_card: Card,
        /// Round length
        time_in_seconds: u64,
        /// Presenters still waiting after this one
        players_remaining: usize,
    },

    /// A participant interrupted the presenter (host only).
    InterceptCardData {
        /// The interrupting participant
        player_id: ParticipantId,
        /// Card played as the interruption
        intercepted_card: Card,
        /// Time left on the reset timer
        time_in_seconds: u64,
    },

    /// Cumulative score of the presenter whose round just closed (host only).
    ScoreSubmission {
        /// Total offered salary in cents
        score_in_cents: i64,
    },

    /// The presentation timer ran out.
    TimerFinished,

    /// Every participant has presented.
    GameFinished,

    /// The last request was refused.
    ConnectionRejected,
}

impl ServerMessage {
    /// Host-side notification that cards were dealt.
    pub fn cards_dealt() -> Self {
        Self::ReceivedCards { drawn_cards: None, job_card: None }
    }

    /// A participant's private hand.
    pub fn hand(drawn_cards: Vec<Card>, job_card: Card) -> Self {
        Self::ReceivedCards { drawn_cards: Some(drawn_cards), job_card: Some(job_card) }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// Encode to a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|source| ProtocolError::Encode { message_type: self.message_type(), source })
    }

    /// Wire tag of this message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::LobbyCode { .. } => "lobby_code",
            Self::PlayerId { .. } => "player_id",
            Self::PlayerJoined { .. } => "player_joined",
            Self::GameStart { .. } => "game_start",
            Self::JobSubmittingFinished { .. } => "player_job_submitting_finished",
            Self::ReceivedCards { .. } => "received_cards",
            Self::CardData { .. } => "card_data",
            Self::PlayerImprovStart { .. } => "player_improv_start",
            Self::InterceptCardData { .. } => "intercept_card_data",
            Self::ScoreSubmission { .. } => "score_submission",
            Self::TimerFinished => "timer_finished",
            Self::GameFinished => "game_finished",
            Self::ConnectionRejected => "connection_rejected",
        }
    }
}
