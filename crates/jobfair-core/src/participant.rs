//! Per-participant game record.

use jobfair_proto::Card;
pub use jobfair_proto::ParticipantId;

/// A participant's hand, selection and score for the current game.
///
/// Created when cards are dealt and owned by [`RoundState`](crate::RoundState).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Participant this record belongs to
    pub id: ParticipantId,
    /// Cards the participant may present with
    pub drawn_cards: Vec<Card>,
    /// Job the participant is applying for
    pub job_card: Card,
    /// Card chosen for the presentation, set exactly once per game
    pub selected_card: Option<Card>,
    /// Total offered salary received, in cents
    pub score_cents: i64,
    /// Number of scores received
    pub score_submission_count: usize,
}

impl ParticipantRecord {
    /// Build a record from a dealt hand. The last card becomes the job card.
    ///
    /// Returns `None` for an empty hand.
    pub fn from_hand(id: ParticipantId, mut hand: Vec<Card>) -> Option<Self> {
        let job_card = hand.pop()?;
        Some(Self {
            id,
            drawn_cards: hand,
            job_card,
            selected_card: None,
            score_cents: 0,
            score_submission_count: 0,
        })
    }

    /// Look up a drawn card by id.
    pub fn drawn_card(&self, card_id: &jobfair_proto::CardId) -> Option<&Card> {
        self.drawn_cards.iter().find(|card| &card.card_id == card_id)
    }

    /// Whether a card has been selected.
    pub fn has_selected(&self) -> bool {
        self.selected_card.is_some()
    }

    /// Add one score.
    pub fn credit(&mut self, amount_cents: i64) {
        self.score_cents = self.score_cents.saturating_add(amount_cents);
        self.score_submission_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn card(n: u128, text: &str) -> Card {
        Card::new(Uuid::from_u128(n), text)
    }

    #[test]
    fn last_card_of_hand_is_job() {
        let id = ParticipantId::from_uuid(Uuid::from_u128(1));
        let hand = vec![card(10, "Pilot"), card(11, "Chef"), card(12, "Mime")];

        let record = ParticipantRecord::from_hand(id, hand).unwrap();

        assert_eq!(record.drawn_cards.len(), 2);
        assert_eq!(record.job_card.job_text, "Mime");
        assert!(!record.has_selected());
    }

    #[test]
    fn empty_hand_yields_no_record() {
        let id = ParticipantId::from_uuid(Uuid::from_u128(1));
        assert!(ParticipantRecord::from_hand(id, Vec::new()).is_none());
    }

    #[test]
    fn credit_accumulates_and_counts() {
        let id = ParticipantId::from_uuid(Uuid::from_u128(1));
        let mut record = ParticipantRecord::from_hand(id, vec![card(1, "Job")]).unwrap();

        record.credit(1_500);
        record.credit(250);

        assert_eq!(record.score_cents, 1_750);
        assert_eq!(record.score_submission_count, 2);
    }

    #[test]
    fn credit_saturates() {
        let id = ParticipantId::from_uuid(Uuid::from_u128(1));
        let mut record = ParticipantRecord::from_hand(id, vec![card(1, "Job")]).unwrap();

        record.credit(i64::MAX);
        record.credit(1);

        assert_eq!(record.score_cents, i64::MAX);
    }
}
