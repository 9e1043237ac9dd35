//! Card and identifier types shared by every message.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a [`Card`].
pub type CardId = Uuid;

/// Identifier of a participant, unique within one session.
///
/// Serialized as a bare UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Wrap a raw UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A job description submitted by a participant.
///
/// Immutable once created. The server is the only party that mints cards;
/// clients echo them back when selecting or intercepting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// Unique card identifier
    pub card_id: CardId,
    /// Job description text
    pub job_text: String,
}

impl Card {
    /// Create a card.
    pub fn new(card_id: CardId, job_text: impl Into<String>) -> Self {
        Self { card_id, job_text: job_text.into() }
    }

    /// Whether the card carries non-blank text.
    pub fn has_text(&self) -> bool {
        !self.job_text.trim().is_empty()
    }
}
