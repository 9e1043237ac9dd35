//! Round state machine: job collection, dealing and card selection.
//!
//! ```text
//! Collecting --(all jobs in)--> Dealing --> Selecting --(all selected)--> Improv --> Finished
//! ```
//!
//! The last accepted job enters `Dealing` and the machine lands in
//! `Selecting` within the same call, so callers never observe `Dealing`.
//!
//! # Invariants
//!
//! - The roster is frozen at construction. `required_jobs_per_participant` is
//!   `roster.len() + 1` and never changes.
//! - Before dealing, `job_pool.len()` equals the sum of all submission lists.
//! - After dealing, the pool is partitioned across dealt hands without loss or
//!   duplication, one hand of `required_jobs_per_participant` cards each.
//! - Failed operations never mutate state.

use std::collections::HashMap;

use jobfair_proto::{Card, CardId};

use crate::{
    env::{self, Environment},
    error::RoundError,
    improv::PresentationQueue,
    participant::{ParticipantId, ParticipantRecord},
};

/// Phase of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    /// Participants are submitting job descriptions
    Collecting,
    /// Every quota is met and hands are being dealt
    Dealing,
    /// Hands are dealt, participants are choosing a card
    Selecting,
    /// Presentations are running
    Improv,
    /// Every participant has presented
    Finished,
}

/// Result of a successful [`RoundState::submit_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSubmission {
    /// Job stored, participant still owes `remaining` more
    Accepted {
        /// Jobs still owed by this participant
        remaining: usize,
    },
    /// Participant reached their quota, others are still submitting
    ParticipantFinished,
    /// Participant reached their quota and so did everyone else. Cards have
    /// been dealt.
    AllFinished,
    /// Participant was already at quota, nothing changed
    Ignored,
}

/// Result of a successful [`RoundState::select_card`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Selection stored, others are still choosing
    Recorded,
    /// Every participant has selected; the presentation order is fixed
    AllSelected(PresentationQueue),
}

/// Job pool, submissions, hands and participant records for one game.
#[derive(Debug, Clone)]
pub struct RoundState {
    phase: RoundPhase,
    roster: Vec<ParticipantId>,
    required_jobs_per_participant: usize,
    job_pool: Vec<Card>,
    submitted_jobs: HashMap<ParticipantId, Vec<Card>>,
    dealt_hands: HashMap<ParticipantId, Vec<Card>>,
    participants: HashMap<ParticipantId, ParticipantRecord>,
}

impl RoundState {
    /// Start collecting jobs from a frozen roster.
    pub fn new(roster: Vec<ParticipantId>) -> Result<Self, RoundError> {
        if roster.is_empty() {
            return Err(RoundError::EmptyRoster);
        }

        let required_jobs_per_participant = roster.len() + 1;
        let submitted_jobs = roster.iter().map(|id| (*id, Vec::new())).collect();

        Ok(Self {
            phase: RoundPhase::Collecting,
            roster,
            required_jobs_per_participant,
            job_pool: Vec::new(),
            submitted_jobs,
            dealt_hands: HashMap::new(),
            participants: HashMap::new(),
        })
    }

    /// Store one job description for `participant`.
    ///
    /// Deals automatically once every participant has reached the quota.
    /// Submissions past the quota are ignored.
    pub fn submit_job<E: Environment>(
        &mut self,
        env: &E,
        participant: ParticipantId,
        text: &str,
    ) -> Result<JobSubmission, RoundError> {
        self.expect_phase(RoundPhase::Collecting, "submit job")?;

        let required = self.required_jobs_per_participant;
        let submitted = self
            .submitted_jobs
            .get_mut(&participant)
            .ok_or(RoundError::UnknownParticipant(participant))?;

        if text.trim().is_empty() {
            return Err(RoundError::EmptyJobText);
        }

        if submitted.len() >= required {
            return Ok(JobSubmission::Ignored);
        }

        let card = Card::new(env.random_uuid(), text);
        submitted.push(card.clone());
        let remaining = required - submitted.len();
        self.job_pool.push(card);

        if remaining > 0 {
            return Ok(JobSubmission::Accepted { remaining });
        }

        if self.all_jobs_submitted() {
            self.phase = RoundPhase::Dealing;
            self.deal(env)?;
            Ok(JobSubmission::AllFinished)
        } else {
            Ok(JobSubmission::ParticipantFinished)
        }
    }

    fn all_jobs_submitted(&self) -> bool {
        self.submitted_jobs.values().all(|jobs| jobs.len() >= self.required_jobs_per_participant)
    }

    /// Shuffle the pool and hand each participant one contiguous chunk.
    fn deal<E: Environment>(&mut self, env: &E) -> Result<(), RoundError> {
        self.expect_phase(RoundPhase::Dealing, "deal")?;
        env::shuffle(env, &mut self.job_pool);

        let chunks = self.job_pool.chunks(self.required_jobs_per_participant);
        for (id, chunk) in self.roster.iter().zip(chunks) {
            let hand = chunk.to_vec();
            if let Some(record) = ParticipantRecord::from_hand(*id, hand.clone()) {
                self.participants.insert(*id, record);
            }
            self.dealt_hands.insert(*id, hand);
        }

        self.phase = RoundPhase::Selecting;
        Ok(())
    }

    /// Record the card `participant` will present with.
    ///
    /// The card must be one of the participant's drawn cards and carry text.
    /// Once everyone has selected, the presentation order is shuffled once and
    /// the machine moves to `Improv`.
    pub fn select_card<E: Environment>(
        &mut self,
        env: &E,
        participant: ParticipantId,
        card_id: &CardId,
    ) -> Result<Selection, RoundError> {
        self.expect_phase(RoundPhase::Selecting, "select card")?;

        let record = self
            .participants
            .get_mut(&participant)
            .ok_or(RoundError::UnknownParticipant(participant))?;

        if record.has_selected() {
            return Err(RoundError::AlreadySelected(participant));
        }

        let card = record
            .drawn_card(card_id)
            .ok_or(RoundError::CardNotInHand { participant, card_id: *card_id })?;

        if !card.has_text() {
            return Err(RoundError::BlankCard(*card_id));
        }

        let selected = card.clone();
        record.selected_card = Some(selected);

        if !self.participants.values().all(ParticipantRecord::has_selected) {
            return Ok(Selection::Recorded);
        }

        let mut order = self.roster.clone();
        env::shuffle(env, &mut order);
        self.phase = RoundPhase::Improv;

        Ok(Selection::AllSelected(PresentationQueue::new(order)))
    }

    /// Credit one score to `presenter`, returning the updated record.
    pub fn credit_score(
        &mut self,
        presenter: ParticipantId,
        amount_cents: i64,
    ) -> Result<&ParticipantRecord, RoundError> {
        self.expect_phase(RoundPhase::Improv, "submit score")?;

        let record = self
            .participants
            .get_mut(&presenter)
            .ok_or(RoundError::UnknownParticipant(presenter))?;
        record.credit(amount_cents);

        Ok(record)
    }

    /// Mark the game finished.
    pub fn finish(&mut self) {
        self.phase = RoundPhase::Finished;
    }

    fn expect_phase(&self, expected: RoundPhase, operation: &'static str) -> Result<(), RoundError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RoundError::WrongPhase { operation, actual: self.phase })
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Frozen roster, in the order it was captured.
    pub fn roster(&self) -> &[ParticipantId] {
        &self.roster
    }

    /// Number of participants in the game.
    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    /// Whether `participant` is part of this game.
    pub fn is_participant(&self, participant: &ParticipantId) -> bool {
        self.submitted_jobs.contains_key(participant)
    }

    /// Jobs each participant must submit.
    pub fn required_jobs_per_participant(&self) -> usize {
        self.required_jobs_per_participant
    }

    /// Every accepted job card. Shuffled once dealing has happened.
    pub fn job_pool(&self) -> &[Card] {
        &self.job_pool
    }

    /// Jobs submitted by `participant`.
    pub fn submitted_jobs(&self, participant: &ParticipantId) -> Option<&[Card]> {
        self.submitted_jobs.get(participant).map(Vec::as_slice)
    }

    /// Full dealt hand (drawn cards followed by the job card).
    pub fn dealt_hand(&self, participant: &ParticipantId) -> Option<&[Card]> {
        self.dealt_hands.get(participant).map(Vec::as_slice)
    }

    /// Participant record, present once dealt.
    pub fn participant(&self, participant: &ParticipantId) -> Option<&ParticipantRecord> {
        self.participants.get(participant)
    }
}
