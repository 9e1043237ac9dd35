//! Session driver.
//!
//! Ties together the connection registry and the game. The driver is pure:
//! events go in, [`SessionAction`]s come out, and the router executes them.
//! Deferred work (timer expiry, the pause between presentations) is returned
//! as [`SessionAction::Schedule`] and comes back later as an event.
//!
//! # Invariants
//!
//! - At most one host is registered. Its departure tears the session down and
//!   every later event is a no-op.
//! - The participant set of a game is frozen when the host starts it. Joins
//!   are refused until that game finishes.
//! - Failed requests never mutate game state.

use std::time::Duration;

use jobfair_core::{
    Advance, CardSelection, Environment, Game, GameConfig, JobSubmission, ParticipantId,
    RoundPhase, ScoreOutcome, TimerOutcome,
};
use jobfair_proto::{Card, ClientMessage, Frame, PlayerInfo, ServerMessage};

use crate::{
    error::SessionError,
    registry::{ConnectionId, ConnectionRecord, ConnectionRegistry, Role},
};

/// How a connection asks to join the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Open the session as its host
    Host,
    /// Join as a participant
    Participant {
        /// Session code entered by the participant
        lobby_code: String,
        /// Display name
        name: String,
    },
}

/// Who a delivered frame is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// Only the host
    Host,
    /// Every participant
    Participants,
    /// Host and every participant
    All,
    /// One connection
    Connection(ConnectionId),
}

/// Events that the session driver processes.
///
/// Produced by connection tasks (through the router) or by the driver's own
/// scheduled actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A registered connection sent a decoded message
    MessageReceived {
        /// Sender
        connection: ConnectionId,
        /// Decoded message
        message: ClientMessage,
    },

    /// A registered connection sent a frame that failed to decode
    MessageRejected {
        /// Sender
        connection: ConnectionId,
        /// Decode failure, for logging
        reason: String,
    },

    /// A connection went away (closed by peer, or dropped by the server)
    Disconnected {
        /// Connection that left
        connection: ConnectionId,
    },

    /// Deliver a frame to a group of connections
    Deliver {
        /// Target group
        recipients: Recipients,
        /// Frame to deliver
        frame: Frame,
    },

    /// A presentation timer ran out
    TimerExpired {
        /// Generation the timer was armed with
        generation: u64,
    },

    /// The pause after a closed presentation is over
    AdvanceRound {
        /// Presentation that closed
        presentation: u64,
    },
}

/// Actions that the session driver produces.
///
/// Executed by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Queue a frame on one connection
    Send {
        /// Target connection
        connection: ConnectionId,
        /// Frame to send
        frame: Frame,
    },

    /// Close a connection
    Close {
        /// Connection to close
        connection: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Feed `event` back after `after` has elapsed
    Schedule {
        /// Delay
        after: Duration,
        /// Event to process when the delay ends
        event: SessionEvent,
    },

    /// The session is over; stop the router
    Teardown,
}

/// Action-based session driver.
pub struct SessionDriver<E: Environment> {
    /// Environment (time, RNG)
    env: E,
    /// Limits and durations
    config: GameConfig,
    /// Code participants must present to join
    code: String,
    /// Registered connections
    registry: ConnectionRegistry,
    /// Current (or last finished) game
    game: Option<Game<E::Instant>>,
    /// Set once the host leaves
    torn_down: bool,
}

impl<E: Environment> SessionDriver<E> {
    /// Create a driver. Uses the configured session code, or a random four
    /// digit one.
    pub fn new(env: E, config: GameConfig) -> Self {
        let code = config
            .lobby
            .code
            .clone()
            .unwrap_or_else(|| format!("{:04}", env.random_u64() % 10_000));

        Self { env, config, code, registry: ConnectionRegistry::new(), game: None, torn_down: false }
    }

    /// Session code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether the host has left.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Record for `connection`.
    pub fn lookup(&self, connection: ConnectionId) -> Option<&ConnectionRecord> {
        self.registry.lookup(connection)
    }

    /// Registered connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Current game, if the host has started one.
    pub fn game(&self) -> Option<&Game<E::Instant>> {
        self.game.as_ref()
    }

    /// Register a connection as host or participant.
    ///
    /// The host is told the session code. A participant is told their id and
    /// the host is told who joined.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        registration: Registration,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.torn_down {
            return Err(SessionError::SessionClosed);
        }
        if self.registry.lookup(connection).is_some() {
            return Err(SessionError::AlreadyRegistered(connection));
        }

        match registration {
            Registration::Host => self.register_host(connection),
            Registration::Participant { lobby_code, name } => {
                self.register_participant(connection, &lobby_code, name)
            },
        }
    }

    fn register_host(&mut self, connection: ConnectionId) -> Result<Vec<SessionAction>, SessionError> {
        if !self.registry.register(ConnectionRecord::host(connection)) {
            return Err(SessionError::HostAlreadyRegistered);
        }

        tracing::info!(connection, code = %self.code, "session opened");

        Ok(vec![send(connection, ServerMessage::LobbyCode { lobby_code: self.code.clone() })])
    }

    fn register_participant(
        &mut self,
        connection: ConnectionId,
        lobby_code: &str,
        name: String,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if lobby_code.trim() != self.code {
            return Err(SessionError::WrongLobbyCode);
        }
        if name.trim().is_empty() {
            return Err(SessionError::InvalidName);
        }
        if self.game_in_progress() {
            return Err(SessionError::JoinClosed);
        }

        let player_id = ParticipantId::from_uuid(self.env.random_uuid());
        let record = ConnectionRecord::participant(connection, name.clone(), player_id);
        if !self.registry.register(record) {
            return Err(SessionError::AlreadyRegistered(connection));
        }

        tracing::info!(connection, %player_id, %name, "participant joined");

        let mut actions = vec![send(connection, ServerMessage::PlayerId { player_id })];
        actions.extend(self.deliver(
            Recipients::Host,
            ServerMessage::PlayerJoined { player: PlayerInfo { player_id, name } }.into(),
        ));
        Ok(actions)
    }

    /// Process an event and return actions to execute.
    pub fn process_event(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        if self.torn_down {
            tracing::debug!(?event, "session torn down, dropping event");
            return Vec::new();
        }

        match event {
            SessionEvent::MessageReceived { connection, message } => {
                let message_type = message.message_type();
                self.handle_message(connection, message).unwrap_or_else(|err| {
                    self.refuse(connection, message_type, &err)
                })
            },
            SessionEvent::MessageRejected { connection, reason } => {
                tracing::warn!(connection, %reason, "rejecting malformed frame");
                if self.registry.lookup(connection).is_some() {
                    vec![send(connection, ServerMessage::ConnectionRejected)]
                } else {
                    Vec::new()
                }
            },
            SessionEvent::Disconnected { connection } => self.handle_disconnect(connection),
            SessionEvent::Deliver { recipients, frame } => self.deliver(recipients, frame),
            SessionEvent::TimerExpired { generation } => self.handle_timer_expired(generation),
            SessionEvent::AdvanceRound { presentation } => self.handle_advance(presentation),
        }
    }

    fn refuse(
        &self,
        connection: ConnectionId,
        message_type: &'static str,
        err: &SessionError,
    ) -> Vec<SessionAction> {
        if err.rejects_sender() {
            tracing::warn!(connection, message_type, error = %err, "request rejected");
            vec![send(connection, ServerMessage::ConnectionRejected)]
        } else {
            tracing::warn!(connection, message_type, error = %err, "request ignored");
            Vec::new()
        }
    }

    fn handle_message(
        &mut self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let record = self
            .registry
            .lookup(connection)
            .ok_or(SessionError::UnknownConnection(connection))?;
        let role = record.role;
        let participant = record.participant_id;

        match (role, message) {
            (_, message @ (ClientMessage::CreateLobby | ClientMessage::LobbyJoinAttempt { .. })) => {
                Err(SessionError::UnexpectedMessage(message.message_type()))
            },
            (Role::Host, ClientMessage::GameStart) => self.handle_game_start(),
            (Role::Participant, ClientMessage::GameStart) => Err(SessionError::NotHost(connection)),
            (Role::Host, _) => Err(SessionError::NotParticipant(connection)),
            (Role::Participant, message) => {
                let participant = participant.ok_or(SessionError::NotParticipant(connection))?;
                self.handle_participant_message(participant, message)
            },
        }
    }

    fn handle_participant_message(
        &mut self,
        participant: ParticipantId,
        message: ClientMessage,
    ) -> Result<Vec<SessionAction>, SessionError> {
        match message {
            ClientMessage::JobSubmitted { job_input } => self.handle_job(participant, &job_input),
            ClientMessage::CardData { card } => self.handle_card_selected(participant, &card),
            ClientMessage::InterceptCardData { card } => self.handle_interception(participant, card),
            ClientMessage::ScoreSubmission { score_in_cents } => {
                self.handle_score(participant, score_in_cents)
            },
            other => Err(SessionError::UnexpectedMessage(other.message_type())),
        }
    }

    fn handle_game_start(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.game_in_progress() {
            return Err(SessionError::GameInProgress);
        }

        let roster = self.registry.participant_ids();
        if let Some(required) = self.config.required_players() {
            if roster.len() < required {
                return Err(SessionError::NotEnoughPlayers { required, actual: roster.len() });
            }
        }

        let times = self.config.times.round_times();
        let game = match &self.game {
            Some(previous) => previous.rematch(roster, times)?,
            None => Game::new(roster, times)?,
        };
        let number_of_jobs = game.round().required_jobs_per_participant();
        tracing::info!(
            participants = game.round().participant_count(),
            number_of_jobs,
            "game started"
        );
        self.game = Some(game);

        Ok(self.deliver(Recipients::All, ServerMessage::GameStart { number_of_jobs }.into()))
    }

    fn handle_job(
        &mut self,
        participant: ParticipantId,
        text: &str,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::NoGame)?;
        let outcome = game.submit_job(&self.env, participant, text)?;

        let finished = ServerMessage::JobSubmittingFinished { player_id: participant };
        match outcome {
            JobSubmission::Accepted { remaining } => {
                tracing::debug!(%participant, remaining, "job accepted");
                Ok(Vec::new())
            },
            JobSubmission::Ignored => {
                tracing::debug!(%participant, "job past quota ignored");
                Ok(Vec::new())
            },
            JobSubmission::ParticipantFinished => Ok(self.deliver(Recipients::Host, finished.into())),
            JobSubmission::AllFinished => {
                tracing::info!("all jobs submitted, cards dealt");
                let mut actions = self.deliver(Recipients::Host, finished.into());
                actions.extend(self.deliver(Recipients::Host, ServerMessage::cards_dealt().into()));
                actions.extend(self.deal_hands());
                Ok(actions)
            },
        }
    }

    /// Each participant sees only their own hand.
    fn deal_hands(&self) -> Vec<SessionAction> {
        let Some(game) = self.game.as_ref() else {
            return Vec::new();
        };

        game.round()
            .roster()
            .iter()
            .filter_map(|participant| {
                let record = game.round().participant(participant)?;
                let connection = self.registry.connection_of(participant)?;
                let hand = ServerMessage::hand(record.drawn_cards.clone(), record.job_card.clone());
                Some(send(connection, hand))
            })
            .collect()
    }

    fn handle_card_selected(
        &mut self,
        participant: ParticipantId,
        card: &Card,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::NoGame)?;
        let selection = game.select_card(&self.env, participant, &card.card_id)?;

        let mut actions = self.deliver(
            Recipients::Host,
            ServerMessage::CardData { player_id: participant }.into(),
        );
        if let CardSelection::AllSelected(advance) = selection {
            tracing::info!("all cards selected, presentations begin");
            actions.extend(self.presentation_actions(advance));
        }
        Ok(actions)
    }

    fn handle_interception(
        &mut self,
        participant: ParticipantId,
        card: Card,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let now = self.env.now();
        let game = self.game.as_mut().ok_or(SessionError::NoGame)?;
        let interruption = game.interrupt(participant, &card, now)?;

        tracing::info!(
            %participant,
            presenter = %interruption.presenter,
            generation = interruption.generation,
            "presentation interrupted"
        );

        let announcement = ServerMessage::InterceptCardData {
            player_id: participant,
            intercepted_card: card,
            time_in_seconds: interruption.time_remaining.as_secs(),
        };
        let mut actions = self.deliver(Recipients::Host, announcement.into());
        actions.push(SessionAction::Schedule {
            after: interruption.time_remaining,
            event: SessionEvent::TimerExpired { generation: interruption.generation },
        });
        Ok(actions)
    }

    fn handle_score(
        &mut self,
        participant: ParticipantId,
        score_in_cents: i64,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::NoGame)?;
        let outcome = game.submit_score(participant, score_in_cents)?;

        let mut actions = self.deliver(
            Recipients::Host,
            ServerMessage::PlayerId { player_id: participant }.into(),
        );
        if let ScoreOutcome::Closed { total_cents, closed } = outcome {
            tracing::info!(presenter = %closed.presenter, total_cents, "presentation scored");
            actions.extend(self.close_actions(total_cents, closed.number, closed.intermission));
        }
        Ok(actions)
    }

    fn handle_timer_expired(&mut self, generation: u64) -> Vec<SessionAction> {
        let Some(game) = self.game.as_mut() else {
            return Vec::new();
        };

        match game.timer_fired(generation) {
            TimerOutcome::Stale => {
                tracing::debug!(generation, "stale timer expiry ignored");
                Vec::new()
            },
            TimerOutcome::Expired => {
                tracing::info!(generation, "presentation time is up");
                self.deliver(Recipients::All, ServerMessage::TimerFinished.into())
            },
            TimerOutcome::ExpiredAndClosed { total_cents, closed } => {
                tracing::info!(generation, presenter = %closed.presenter, "time is up, nobody left to score");
                let mut actions = self.deliver(Recipients::All, ServerMessage::TimerFinished.into());
                actions.extend(self.close_actions(total_cents, closed.number, closed.intermission));
                actions
            },
        }
    }

    fn handle_advance(&mut self, presentation: u64) -> Vec<SessionAction> {
        let now = self.env.now();
        let Some(game) = self.game.as_mut() else {
            return Vec::new();
        };

        match game.advance(presentation, now) {
            Ok(advance) => self.presentation_actions(advance),
            Err(err) => {
                tracing::debug!(presentation, error = %err, "advance ignored");
                Vec::new()
            },
        }
    }

    fn close_actions(
        &self,
        total_cents: i64,
        presentation: u64,
        intermission: Duration,
    ) -> Vec<SessionAction> {
        let mut actions = self.deliver(
            Recipients::Host,
            ServerMessage::ScoreSubmission { score_in_cents: total_cents }.into(),
        );
        actions.push(SessionAction::Schedule {
            after: intermission,
            event: SessionEvent::AdvanceRound { presentation },
        });
        actions
    }

    fn presentation_actions(&self, advance: Advance) -> Vec<SessionAction> {
        let start = match advance {
            Advance::Started(start) => start,
            Advance::Finished => {
                tracing::info!("game finished");
                return self.deliver(Recipients::All, ServerMessage::GameFinished.into());
            },
        };

        let presenter = start.start.presenter;
        tracing::info!(
            %presenter,
            presentation = start.start.number,
            players_remaining = start.start.players_remaining,
            "presentation started"
        );

        let announcement = ServerMessage::PlayerImprovStart {
            player_id: presenter,
            selected_card: start.selected_card,
            job_card: start.job_card,
            time_in_seconds: start.start.duration.as_secs(),
            players_remaining: start.start.players_remaining,
        };

        let mut actions = self.deliver(Recipients::Host, announcement.into());
        actions.extend(self.deliver(
            Recipients::Participants,
            ServerMessage::PlayerId { player_id: presenter }.into(),
        ));
        actions.push(SessionAction::Schedule {
            after: start.start.duration,
            event: SessionEvent::TimerExpired { generation: start.start.generation },
        });
        actions
    }

    fn handle_disconnect(&mut self, connection: ConnectionId) -> Vec<SessionAction> {
        let Some(record) = self.registry.unregister(connection) else {
            return Vec::new();
        };

        match record.role {
            Role::Host => self.teardown(connection),
            Role::Participant => {
                tracing::info!(connection, name = ?record.display_name, "participant left");
                vec![SessionAction::Close { connection, reason: "disconnected".to_string() }]
            },
        }
    }

    /// Close every connection and stop. The game is discarded.
    fn teardown(&mut self, host: ConnectionId) -> Vec<SessionAction> {
        tracing::info!(connection = host, "host left, tearing session down");

        self.torn_down = true;
        self.game = None;

        let mut actions =
            vec![SessionAction::Close { connection: host, reason: "host disconnected".to_string() }];
        actions.extend(self.registry.drain().into_iter().map(|connection| SessionAction::Close {
            connection,
            reason: "session closed".to_string(),
        }));
        actions.push(SessionAction::Teardown);
        actions
    }

    fn deliver(&self, recipients: Recipients, frame: Frame) -> Vec<SessionAction> {
        let connections = match recipients {
            Recipients::Host => self.registry.host().into_iter().collect(),
            Recipients::Participants => self.registry.participant_connections(),
            Recipients::All => self.registry.all_connections(),
            Recipients::Connection(connection) => {
                self.registry.lookup(connection).map(|record| record.id).into_iter().collect()
            },
        };

        connections
            .into_iter()
            .map(|connection| SessionAction::Send { connection, frame: frame.clone() })
            .collect()
    }

    fn game_in_progress(&self) -> bool {
        self.game.as_ref().is_some_and(|game| game.phase() != RoundPhase::Finished)
    }
}

fn send(connection: ConnectionId, message: ServerMessage) -> SessionAction {
    SessionAction::Send { connection, frame: Frame::Message(message) }
}
