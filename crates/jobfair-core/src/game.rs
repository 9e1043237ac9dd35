//! One game from job collection to the last presentation.
//!
//! [`Game`] ties the [`RoundState`] machine to the [`ImprovSession`] that
//! runs once every card is selected. It is pure: time arrives as an argument
//! and randomness through the [`Environment`]. The caller schedules the
//! deferred work (timer expiry, intermission) that the returned values ask
//! for.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use jobfair_proto::{Card, CardId};

use crate::{
    env::Environment,
    error::RoundError,
    improv::{
        ClosedPresentation, ImprovSession, Interruption, PresentationStart, RoundStart, RoundTimes,
        SessionCounters,
    },
    participant::ParticipantId,
    round::{JobSubmission, RoundPhase, RoundState, Selection},
};

/// A presentation that started, with the cards the host displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImprovStart {
    /// Timer and queue details
    pub start: PresentationStart,
    /// Card the presenter selected
    pub selected_card: Card,
    /// Job the presenter is applying for
    pub job_card: Card,
}

/// What happens after a presentation slot opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next presenter is up
    Started(ImprovStart),
    /// Everyone has presented; the game is finished
    Finished,
}

/// Result of [`Game::select_card`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardSelection {
    /// Selection stored, others are still choosing
    Recorded,
    /// Last selection; presentations began
    AllSelected(Advance),
}

/// Result of [`Game::submit_score`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// Score stored, more are expected
    Recorded {
        /// Presenter who was scored
        presenter: ParticipantId,
    },
    /// Score stored and the presentation closed
    Closed {
        /// Presenter's cumulative score in cents
        total_cents: i64,
        /// The closed presentation
        closed: ClosedPresentation,
    },
}

/// Result of [`Game::timer_fired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Expiry for an older generation, ignored
    Stale,
    /// Time is up; scoring stays open
    Expired,
    /// Time is up and nobody is left to score, so the presentation closed
    ExpiredAndClosed {
        /// Presenter's cumulative score in cents
        total_cents: i64,
        /// The closed presentation
        closed: ClosedPresentation,
    },
}

/// A single game over a frozen roster.
#[derive(Debug, Clone)]
pub struct Game<I> {
    round: RoundState,
    improv: Option<ImprovSession<I>>,
    times: RoundTimes,
    /// Counters inherited from the previous game of the session
    counters: SessionCounters,
}

impl<I> Game<I>
where
    I: Copy + Ord + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// Start collecting jobs from `roster`.
    pub fn new(roster: Vec<ParticipantId>, times: RoundTimes) -> Result<Self, RoundError> {
        Self::with_counters(roster, times, SessionCounters::default())
    }

    /// Start the next game of the same session over `roster`.
    ///
    /// Timer generations and presentation numbers carry on from this game,
    /// so expiries and intermissions it scheduled are stale in the new one.
    pub fn rematch(&self, roster: Vec<ParticipantId>, times: RoundTimes) -> Result<Self, RoundError> {
        Self::with_counters(roster, times, self.counters())
    }

    fn with_counters(
        roster: Vec<ParticipantId>,
        times: RoundTimes,
        counters: SessionCounters,
    ) -> Result<Self, RoundError> {
        Ok(Self { round: RoundState::new(roster)?, improv: None, times, counters })
    }

    /// Store a job description.
    pub fn submit_job<E: Environment<Instant = I>>(
        &mut self,
        env: &E,
        participant: ParticipantId,
        text: &str,
    ) -> Result<JobSubmission, RoundError> {
        self.round.submit_job(env, participant, text)
    }

    /// Store a card selection, starting the first presentation after the
    /// last one.
    pub fn select_card<E: Environment<Instant = I>>(
        &mut self,
        env: &E,
        participant: ParticipantId,
        card_id: &CardId,
    ) -> Result<CardSelection, RoundError> {
        match self.round.select_card(env, participant, card_id)? {
            Selection::Recorded => Ok(CardSelection::Recorded),
            Selection::AllSelected(queue) => {
                let mut improv = ImprovSession::resume(queue, self.times, self.counters);
                let start = improv.start_round(env.now())?;
                self.improv = Some(improv);
                Ok(CardSelection::AllSelected(self.describe(start)?))
            },
        }
    }

    /// Interrupt the current presenter with `card`.
    pub fn interrupt(
        &mut self,
        by: ParticipantId,
        card: &Card,
        now: I,
    ) -> Result<Interruption, RoundError> {
        self.expect_member(by)?;
        if !card.has_text() {
            return Err(RoundError::BlankCard(card.card_id));
        }

        self.improv_mut("interrupt")?.interrupt(by, now)
    }

    /// Score the current presenter.
    ///
    /// The presentation closes once every other participant has scored.
    pub fn submit_score(
        &mut self,
        by: ParticipantId,
        amount_cents: i64,
    ) -> Result<ScoreOutcome, RoundError> {
        self.expect_member(by)?;

        let presenter = self.improv_mut("submit score")?.accept_score(by)?;
        let record = self.round.credit_score(presenter, amount_cents)?;
        let total_cents = record.score_cents;
        let scores = record.score_submission_count;

        if scores < self.scorers_per_presentation() {
            return Ok(ScoreOutcome::Recorded { presenter });
        }

        let closed = self.improv_mut("submit score")?.close_presentation()?;
        Ok(ScoreOutcome::Closed { total_cents, closed })
    }

    /// Handle a timer expiry for `generation`.
    pub fn timer_fired(&mut self, generation: u64) -> TimerOutcome {
        let scorers = self.scorers_per_presentation();
        let Some(improv) = self.improv.as_mut() else {
            return TimerOutcome::Stale;
        };

        if !improv.timer_fired(generation) {
            return TimerOutcome::Stale;
        }
        if scorers > 0 {
            return TimerOutcome::Expired;
        }

        let total_cents = improv
            .timer()
            .and_then(|timer| self.round.participant(&timer.presenter()))
            .map_or(0, |record| record.score_cents);

        match improv.close_presentation() {
            Ok(closed) => TimerOutcome::ExpiredAndClosed { total_cents, closed },
            Err(_) => TimerOutcome::Expired,
        }
    }

    /// Move past closed presentation `number`.
    pub fn advance(&mut self, number: u64, now: I) -> Result<Advance, RoundError> {
        let start = self.improv_mut("advance")?.advance(number, now)?;
        self.describe(start)
    }

    fn describe(&mut self, start: RoundStart) -> Result<Advance, RoundError> {
        let start = match start {
            RoundStart::Started(start) => start,
            RoundStart::Exhausted => {
                self.round.finish();
                return Ok(Advance::Finished);
            },
        };

        let record = self
            .round
            .participant(&start.presenter)
            .ok_or(RoundError::UnknownParticipant(start.presenter))?;
        let selected_card =
            record.selected_card.clone().ok_or(RoundError::NoActivePresentation)?;

        Ok(Advance::Started(ImprovStart { start, selected_card, job_card: record.job_card.clone() }))
    }

    fn expect_member(&self, participant: ParticipantId) -> Result<(), RoundError> {
        if self.round.is_participant(&participant) {
            Ok(())
        } else {
            Err(RoundError::UnknownParticipant(participant))
        }
    }

    fn improv_mut(&mut self, operation: &'static str) -> Result<&mut ImprovSession<I>, RoundError> {
        match self.round.phase() {
            RoundPhase::Improv => {},
            actual => return Err(RoundError::WrongPhase { operation, actual }),
        }
        self.improv.as_mut().ok_or(RoundError::NoActivePresentation)
    }

    fn scorers_per_presentation(&self) -> usize {
        self.round.participant_count().saturating_sub(1)
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    /// Underlying round machine.
    pub fn round(&self) -> &RoundState {
        &self.round
    }

    /// Presentation session, present once everyone has selected.
    pub fn improv(&self) -> Option<&ImprovSession<I>> {
        self.improv.as_ref()
    }

    /// Counters reached so far, including earlier games.
    pub fn counters(&self) -> SessionCounters {
        self.improv.as_ref().map_or(self.counters, ImprovSession::counters)
    }
}
