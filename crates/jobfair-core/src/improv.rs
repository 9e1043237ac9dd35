//! Presentation order and the presentation timer.
//!
//! One participant presents at a time, in the order fixed by
//! [`PresentationQueue`]. Each presentation arms a [`Timer`] tagged with a
//! generation. Interruptions and closing a presentation bump the generation,
//! so an expiry scheduled for an older generation is discarded when it fires.
//!
//! # Invariants
//!
//! - The queue is shuffled once when built. It only shrinks afterwards.
//! - The front of the queue is the current presenter until their presentation
//!   closes.
//! - Generations strictly increase over the life of a session.
//! - A timer fires at most once per generation.
//! - A presentation closes at most once.

use std::{
    collections::{HashSet, VecDeque},
    ops::{Add, Sub},
    time::Duration,
};

use crate::{error::RoundError, participant::ParticipantId};

/// Fixed order in which participants present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationQueue {
    order: VecDeque<ParticipantId>,
}

impl PresentationQueue {
    /// Build a queue from an already shuffled order.
    pub fn new(order: Vec<ParticipantId>) -> Self {
        Self { order: order.into() }
    }

    /// Participant at the front (presenting now, or next to present).
    pub fn peek(&self) -> Option<ParticipantId> {
        self.order.front().copied()
    }

    /// Remove the participant at the front.
    pub fn pop(&mut self) -> Option<ParticipantId> {
        self.order.pop_front()
    }

    /// Participants left, including the one at the front.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether everyone has presented.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `participant` has yet to finish presenting.
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.order.contains(participant)
    }

    /// Remaining order, front first.
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.order.iter()
    }
}

/// Durations that drive a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTimes {
    /// Length of a presentation
    pub round_duration: Duration,
    /// Time on the clock after an interruption
    pub interception_bonus: Duration,
    /// Pause between a closed presentation and the next one
    pub intermission: Duration,
}

/// Countdown for the active presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer<I> {
    presenter: ParticipantId,
    deadline: I,
    generation: u64,
    running: bool,
}

impl<I> Timer<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Presenter the timer belongs to.
    pub fn presenter(&self) -> ParticipantId {
        self.presenter
    }

    /// Instant the timer expires.
    pub fn deadline(&self) -> I {
        self.deadline
    }

    /// Generation of the currently armed expiry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the timer is armed and has not fired.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Time left at `now`.
    pub fn remaining(&self, now: I) -> Duration {
        if now >= self.deadline { Duration::ZERO } else { self.deadline - now }
    }
}

/// A presentation that just started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationStart {
    /// Presenter
    pub presenter: ParticipantId,
    /// Sequence number of this presentation within the session
    pub number: u64,
    /// Generation the expiry must carry to count
    pub generation: u64,
    /// Time on the clock
    pub duration: Duration,
    /// Presenters still waiting after this one
    pub players_remaining: usize,
}

/// Outcome of starting the next presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStart {
    /// A presentation started
    Started(PresentationStart),
    /// Everyone has presented
    Exhausted,
}

/// An accepted interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interruption {
    /// Presenter, unchanged by the interruption
    pub presenter: ParticipantId,
    /// New timer generation
    pub generation: u64,
    /// Time on the reset clock
    pub time_remaining: Duration,
}

/// A presentation that collected all of its scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedPresentation {
    /// Presenter whose presentation closed
    pub presenter: ParticipantId,
    /// Sequence number of the closed presentation
    pub number: u64,
    /// Pause before the next presentation
    pub intermission: Duration,
}

/// Timer generation and presentation number reached so far in a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Latest timer generation handed out
    pub generation: u64,
    /// Presentations started
    pub presentations_started: u64,
}

#[derive(Debug, Clone)]
struct Presentation<I> {
    number: u64,
    scored_by: HashSet<ParticipantId>,
    closed: bool,
    timer: Timer<I>,
}

/// Drives presentations through the queue.
#[derive(Debug, Clone)]
pub struct ImprovSession<I> {
    queue: PresentationQueue,
    current: Option<Presentation<I>>,
    generation: u64,
    presentations_started: u64,
    times: RoundTimes,
}

impl<I> ImprovSession<I>
where
    I: Copy + Ord + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// Create a session over a fixed presentation order.
    pub fn new(queue: PresentationQueue, times: RoundTimes) -> Self {
        Self::resume(queue, times, SessionCounters::default())
    }

    /// Create a session whose generations and presentation numbers continue
    /// after `counters`, so events scheduled by an earlier game never match.
    pub fn resume(queue: PresentationQueue, times: RoundTimes, counters: SessionCounters) -> Self {
        Self {
            queue,
            current: None,
            generation: counters.generation,
            presentations_started: counters.presentations_started,
            times,
        }
    }

    /// Arm the timer for the participant at the front of the queue.
    pub fn start_round(&mut self, now: I) -> Result<RoundStart, RoundError> {
        if let Some(current) = &self.current {
            if !current.closed {
                return Err(RoundError::PresentationInProgress(current.number));
            }
        }

        let Some(presenter) = self.queue.peek() else {
            self.current = None;
            return Ok(RoundStart::Exhausted);
        };

        self.generation += 1;
        self.presentations_started += 1;
        let duration = self.times.round_duration;

        self.current = Some(Presentation {
            number: self.presentations_started,
            scored_by: HashSet::new(),
            closed: false,
            timer: Timer {
                presenter,
                deadline: now + duration,
                generation: self.generation,
                running: true,
            },
        });

        Ok(RoundStart::Started(PresentationStart {
            presenter,
            number: self.presentations_started,
            generation: self.generation,
            duration,
            players_remaining: self.queue.len().saturating_sub(1),
        }))
    }

    /// Reset the clock to the interception bonus. The presenter is unchanged.
    pub fn interrupt(&mut self, by: ParticipantId, now: I) -> Result<Interruption, RoundError> {
        let current = self
            .current
            .as_mut()
            .filter(|current| !current.closed)
            .ok_or(RoundError::NoActivePresentation)?;

        if current.timer.presenter == by {
            return Err(RoundError::PresenterNotAllowed(by));
        }
        if !current.timer.running {
            return Err(RoundError::TimerNotRunning);
        }

        self.generation += 1;
        current.timer.generation = self.generation;
        current.timer.deadline = now + self.times.interception_bonus;

        Ok(Interruption {
            presenter: current.timer.presenter,
            generation: self.generation,
            time_remaining: self.times.interception_bonus,
        })
    }

    /// Handle an expiry. Returns true only for the live generation, once.
    pub fn timer_fired(&mut self, generation: u64) -> bool {
        match self.current.as_mut() {
            Some(current) if current.timer.running && current.timer.generation == generation => {
                current.timer.running = false;
                true
            },
            _ => false,
        }
    }

    /// Accept a score from `by` for the current presenter.
    ///
    /// Scoring stays open after the timer expires, until the presentation
    /// closes.
    pub fn accept_score(&mut self, by: ParticipantId) -> Result<ParticipantId, RoundError> {
        let current = self.current.as_mut().ok_or(RoundError::NoActivePresentation)?;

        if current.closed {
            return Err(RoundError::RoundClosed);
        }
        if current.timer.presenter == by {
            return Err(RoundError::PresenterNotAllowed(by));
        }
        if !current.scored_by.insert(by) {
            return Err(RoundError::AlreadyScored(by));
        }

        Ok(current.timer.presenter)
    }

    /// Close the current presentation, disarm its timer and drop the
    /// presenter from the queue.
    pub fn close_presentation(&mut self) -> Result<ClosedPresentation, RoundError> {
        let current = self.current.as_mut().ok_or(RoundError::NoActivePresentation)?;

        if current.closed {
            return Err(RoundError::RoundClosed);
        }

        current.closed = true;
        current.timer.running = false;
        self.generation += 1;
        self.queue.pop();

        Ok(ClosedPresentation {
            presenter: current.timer.presenter,
            number: current.number,
            intermission: self.times.intermission,
        })
    }

    /// Start the presentation following closed presentation `number`.
    ///
    /// Only the first request for a given closed presentation is honored.
    pub fn advance(&mut self, number: u64, now: I) -> Result<RoundStart, RoundError> {
        let ready = matches!(&self.current, Some(current) if current.closed && current.number == number);
        if !ready {
            return Err(RoundError::StaleAdvance {
                requested: number,
                current: self.presentations_started,
            });
        }

        self.start_round(now)
    }

    /// Presentation order still to run.
    pub fn queue(&self) -> &PresentationQueue {
        &self.queue
    }

    /// Timer of the current presentation.
    pub fn timer(&self) -> Option<&Timer<I>> {
        self.current.as_ref().map(|current| &current.timer)
    }

    /// Presenter of the open presentation.
    pub fn presenter(&self) -> Option<ParticipantId> {
        self.current.as_ref().filter(|current| !current.closed).map(|c| c.timer.presenter)
    }

    /// Latest timer generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of presentations started so far, including earlier games.
    pub fn presentations_started(&self) -> u64 {
        self.presentations_started
    }

    /// Counters a following game must continue from.
    pub fn counters(&self) -> SessionCounters {
        SessionCounters {
            generation: self.generation,
            presentations_started: self.presentations_started,
        }
    }

    /// Configured durations.
    pub fn times(&self) -> RoundTimes {
        self.times
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use std::time::Instant;

    use uuid::Uuid;

    use super::*;

    const TIMES: RoundTimes = RoundTimes {
        round_duration: Duration::from_secs(30),
        interception_bonus: Duration::from_secs(20),
        intermission: Duration::from_secs(10),
    };

    fn ids(n: u128) -> Vec<ParticipantId> {
        (1..=n).map(|i| ParticipantId::from_uuid(Uuid::from_u128(i))).collect()
    }

    fn session(n: u128) -> (ImprovSession<Instant>, Vec<ParticipantId>) {
        let order = ids(n);
        (ImprovSession::new(PresentationQueue::new(order.clone()), TIMES), order)
    }

    fn started(start: RoundStart) -> PresentationStart {
        match start {
            RoundStart::Started(start) => start,
            RoundStart::Exhausted => panic!("expected a presentation to start"),
        }
    }

    #[test]
    fn first_round_arms_timer_for_front() {
        let (mut improv, order) = session(3);
        let now = Instant::now();

        let start = started(improv.start_round(now).unwrap());

        assert_eq!(start.presenter, order[0]);
        assert_eq!(start.duration, TIMES.round_duration);
        assert_eq!(start.players_remaining, 2);
        let timer = improv.timer().unwrap();
        assert!(timer.is_running());
        assert_eq!(timer.remaining(now), TIMES.round_duration);
    }

    #[test]
    fn cannot_start_while_presenting() {
        let (mut improv, _) = session(2);
        improv.start_round(Instant::now()).unwrap();

        let err = improv.start_round(Instant::now()).unwrap_err();
        assert_eq!(err, RoundError::PresentationInProgress(1));
    }

    #[test]
    fn interrupt_resets_clock_and_keeps_presenter() {
        let (mut improv, order) = session(3);
        let now = Instant::now();
        let start = started(improv.start_round(now).unwrap());

        let later = now + Duration::from_secs(25);
        let interruption = improv.interrupt(order[1], later).unwrap();

        assert_eq!(interruption.presenter, start.presenter);
        assert!(interruption.generation > start.generation);
        assert_eq!(interruption.time_remaining, TIMES.interception_bonus);
        assert_eq!(improv.timer().unwrap().remaining(later), TIMES.interception_bonus);
        assert_eq!(improv.presenter(), Some(order[0]));
    }

    #[test]
    fn presenter_cannot_interrupt_or_score_self() {
        let (mut improv, order) = session(2);
        improv.start_round(Instant::now()).unwrap();

        assert_eq!(
            improv.interrupt(order[0], Instant::now()).unwrap_err(),
            RoundError::PresenterNotAllowed(order[0])
        );
        assert_eq!(improv.accept_score(order[0]).unwrap_err(), RoundError::PresenterNotAllowed(order[0]));
    }

    #[test]
    fn stale_expiry_ignored_after_interrupt() {
        let (mut improv, order) = session(2);
        let now = Instant::now();
        let start = started(improv.start_round(now).unwrap());
        let interruption = improv.interrupt(order[1], now).unwrap();

        assert!(!improv.timer_fired(start.generation));
        assert!(improv.timer().unwrap().is_running());
        assert!(improv.timer_fired(interruption.generation));
        assert!(!improv.timer_fired(interruption.generation));
    }

    #[test]
    fn interrupt_after_expiry_rejected() {
        let (mut improv, order) = session(2);
        let start = started(improv.start_round(Instant::now()).unwrap());
        assert!(improv.timer_fired(start.generation));

        assert_eq!(improv.interrupt(order[1], Instant::now()).unwrap_err(), RoundError::TimerNotRunning);
    }

    #[test]
    fn scoring_open_after_expiry() {
        let (mut improv, order) = session(2);
        let start = started(improv.start_round(Instant::now()).unwrap());
        improv.timer_fired(start.generation);

        assert_eq!(improv.accept_score(order[1]).unwrap(), order[0]);
    }

    #[test]
    fn duplicate_score_rejected() {
        let (mut improv, order) = session(3);
        improv.start_round(Instant::now()).unwrap();

        improv.accept_score(order[1]).unwrap();
        assert_eq!(improv.accept_score(order[1]).unwrap_err(), RoundError::AlreadyScored(order[1]));
    }

    #[test]
    fn close_disarms_timer_and_pops_presenter() {
        let (mut improv, order) = session(2);
        let start = started(improv.start_round(Instant::now()).unwrap());

        let closed = improv.close_presentation().unwrap();

        assert_eq!(closed.presenter, order[0]);
        assert_eq!(closed.intermission, TIMES.intermission);
        assert!(!improv.timer_fired(start.generation));
        assert_eq!(improv.queue().len(), 1);
        assert_eq!(improv.presenter(), None);
        assert_eq!(improv.close_presentation().unwrap_err(), RoundError::RoundClosed);
        assert_eq!(improv.accept_score(order[1]).unwrap_err(), RoundError::RoundClosed);
    }

    #[test]
    fn advance_is_idempotent() {
        let (mut improv, order) = session(2);
        let now = Instant::now();
        improv.start_round(now).unwrap();
        let closed = improv.close_presentation().unwrap();

        let next = started(improv.advance(closed.number, now).unwrap());
        assert_eq!(next.presenter, order[1]);
        assert_eq!(next.players_remaining, 0);

        assert!(matches!(
            improv.advance(closed.number, now),
            Err(RoundError::StaleAdvance { requested: 1, current: 2 })
        ));
    }

    #[test]
    fn exhausted_after_last_presentation() {
        let (mut improv, _) = session(1);
        let now = Instant::now();
        improv.start_round(now).unwrap();
        let closed = improv.close_presentation().unwrap();

        assert_eq!(improv.advance(closed.number, now).unwrap(), RoundStart::Exhausted);
        assert!(improv.queue().is_empty());
        assert!(improv.advance(closed.number, now).is_err());
    }

    #[test]
    fn resumed_session_continues_counters() {
        let (mut first, order) = session(1);
        let now = Instant::now();
        let old = started(first.start_round(now).unwrap());
        let closed = first.close_presentation().unwrap();

        let queue = PresentationQueue::new(order);
        let mut second = ImprovSession::resume(queue, TIMES, first.counters());
        let new = started(second.start_round(now).unwrap());

        assert!(new.generation > first.generation());
        assert!(new.number > closed.number);
        assert!(!second.timer_fired(old.generation));
        assert!(matches!(second.advance(closed.number, now), Err(RoundError::StaleAdvance { .. })));
        assert!(second.timer().unwrap().is_running());
    }
}
