//! Property-based tests for the session driver
//!
//! The driver is pure, so these tests feed it event sequences directly and
//! inspect the actions it returns. Scheduled events are replayed immediately
//! instead of waiting on a clock.

use std::collections::VecDeque;

use jobfair_core::{GameConfig, RoundPhase};
use jobfair_harness::SimEnv;
use jobfair_proto::{Card, ClientMessage, Frame, ServerMessage};
use jobfair_server::{ConnectionId, Registration, SessionAction, SessionDriver, SessionEvent};
use proptest::prelude::*;
use uuid::Uuid;

const HOST: ConnectionId = 1;
const CODE: &str = "1234";

/// Driver plus everything it has asked for so far.
struct Harness {
    driver: SessionDriver<SimEnv>,
    sent: Vec<(ConnectionId, Frame)>,
    scheduled: VecDeque<SessionEvent>,
}

impl Harness {
    /// Session with a host and `players` participants on connections 2..
    fn new(seed: u64, players: usize) -> Self {
        let mut config = GameConfig::default();
        config.lobby.code = Some(CODE.to_string());

        let mut harness = Self {
            driver: SessionDriver::new(SimEnv::with_seed(seed), config),
            sent: Vec::new(),
            scheduled: VecDeque::new(),
        };

        let actions = harness.driver.register(HOST, Registration::Host).unwrap();
        harness.record(actions);
        for i in 0..players {
            let registration = Registration::Participant {
                lobby_code: CODE.to_string(),
                name: format!("player {i}"),
            };
            let actions = harness.driver.register(2 + i as u64, registration).unwrap();
            harness.record(actions);
        }
        harness
    }

    fn record(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Send { connection, frame } => self.sent.push((connection, frame)),
                SessionAction::Schedule { event, .. } => self.scheduled.push_back(event),
                SessionAction::Close { .. } | SessionAction::Teardown => {},
            }
        }
    }

    fn message(&mut self, connection: ConnectionId, message: ClientMessage) {
        let actions =
            self.driver.process_event(SessionEvent::MessageReceived { connection, message });
        self.record(actions);
    }

    /// Replay every scheduled event, including ones scheduled while replaying.
    fn run_scheduled(&mut self) {
        while let Some(event) = self.scheduled.pop_front() {
            let actions = self.driver.process_event(event);
            self.record(actions);
        }
    }

    fn participants(&self) -> Vec<ConnectionId> {
        self.driver.registry().participant_connections()
    }

    fn received(&self, message: &ServerMessage) -> Vec<ConnectionId> {
        self.sent
            .iter()
            .filter(|(_, frame)| *frame == Frame::Message(message.clone()))
            .map(|(connection, _)| *connection)
            .collect()
    }

    /// Start a game and submit every participant's quota.
    fn deal(&mut self) {
        self.message(HOST, ClientMessage::GameStart);
        let jobs = self.driver.game().unwrap().round().required_jobs_per_participant();
        for connection in self.participants() {
            for i in 0..jobs {
                let job_input = format!("job {connection}/{i}");
                self.message(connection, ClientMessage::JobSubmitted { job_input });
            }
        }
    }

    /// Every participant selects the first card of their hand.
    fn select_all(&mut self) {
        for connection in self.participants() {
            let player = self.driver.lookup(connection).unwrap().participant_id.unwrap();
            let round = self.driver.game().unwrap().round();
            let card = round.participant(&player).unwrap().drawn_cards[0].clone();
            self.message(connection, ClientMessage::CardData { card });
        }
    }
}

fn card() -> impl Strategy<Value = Card> {
    (any::<u128>(), "[a-z ]{0,6}").prop_map(|(id, text)| Card::new(Uuid::from_u128(id), text))
}

fn client_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        Just(ClientMessage::GameStart),
        Just(ClientMessage::CreateLobby),
        ("[0-9]{4}", "[a-z]{0,4}")
            .prop_map(|(lobby_code, name)| ClientMessage::LobbyJoinAttempt { lobby_code, name }),
        "[a-z ]{0,8}".prop_map(|job_input| ClientMessage::JobSubmitted { job_input }),
        card().prop_map(|card| ClientMessage::CardData { card }),
        card().prop_map(|card| ClientMessage::InterceptCardData { card }),
        any::<i64>().prop_map(|score_in_cents| ClientMessage::ScoreSubmission { score_in_cents }),
    ]
}

fn event() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        8 => (1u64..=6, client_message())
            .prop_map(|(connection, message)| SessionEvent::MessageReceived { connection, message }),
        1 => (1u64..=6).prop_map(|connection| SessionEvent::Disconnected { connection }),
        1 => (0u64..8).prop_map(|generation| SessionEvent::TimerExpired { generation }),
        1 => (0u64..6).prop_map(|presentation| SessionEvent::AdvanceRound { presentation }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: Frames are only ever queued for connections registered when
    /// the event arrived
    #[test]
    fn prop_sends_target_registered_connections(
        seed in any::<u64>(),
        players in 0usize..=4,
        events in prop::collection::vec(event(), 0..80),
    ) {
        let mut harness = Harness::new(seed, players);

        for event in events {
            let registered = harness.driver.registry().all_connections();
            for action in harness.driver.process_event(event) {
                if let SessionAction::Send { connection, .. } = action {
                    prop_assert!(registered.contains(&connection));
                }
            }
        }
    }

    /// Property: Once the host leaves, every later event is a no-op
    #[test]
    fn prop_host_departure_is_final(
        seed in any::<u64>(),
        before in prop::collection::vec(event(), 0..30),
        after in prop::collection::vec(event(), 1..30),
    ) {
        let mut harness = Harness::new(seed, 3);
        for event in before {
            if event == (SessionEvent::Disconnected { connection: HOST }) {
                continue;
            }
            harness.driver.process_event(event);
        }

        let actions = harness.driver.process_event(SessionEvent::Disconnected { connection: HOST });
        prop_assert_eq!(actions.last(), Some(&SessionAction::Teardown));
        prop_assert!(harness.driver.is_torn_down());
        prop_assert!(harness.driver.registry().is_empty());
        prop_assert!(harness.driver.game().is_none());

        for event in after {
            prop_assert!(harness.driver.process_event(event).is_empty());
        }
    }

    /// Property: Each participant is dealt exactly one hand, and it is theirs
    #[test]
    fn prop_hands_reach_their_owner(seed in any::<u64>(), players in 1usize..=6) {
        let mut harness = Harness::new(seed, players);
        harness.deal();

        let round = harness.driver.game().unwrap().round();
        prop_assert_eq!(round.phase(), RoundPhase::Selecting);

        let mut dealt_to = Vec::new();
        for (connection, frame) in &harness.sent {
            let Frame::Message(ServerMessage::ReceivedCards { drawn_cards: Some(drawn), job_card: Some(job) }) = frame else {
                continue;
            };
            let player = harness.driver.lookup(*connection).unwrap().participant_id.unwrap();
            let record = round.participant(&player).unwrap();
            prop_assert_eq!(drawn, &record.drawn_cards);
            prop_assert_eq!(job, &record.job_card);
            dealt_to.push(*connection);
        }

        dealt_to.sort_unstable();
        prop_assert_eq!(dealt_to, harness.participants());
        prop_assert_eq!(harness.received(&ServerMessage::cards_dealt()), vec![HOST]);
    }

    /// Property: A fully scored game presents everyone once and finishes for
    /// every connection
    #[test]
    fn prop_scored_game_finishes(seed in any::<u64>(), players in 1usize..=5) {
        let mut harness = Harness::new(seed, players);
        harness.deal();
        harness.select_all();

        for _ in 0..=players {
            let Some(presenter) = harness
                .driver
                .game()
                .and_then(|game| game.improv())
                .and_then(|improv| improv.presenter())
            else {
                break;
            };
            for connection in harness.participants() {
                let player = harness.driver.lookup(connection).unwrap().participant_id;
                if player != Some(presenter) {
                    harness.message(connection, ClientMessage::ScoreSubmission { score_in_cents: 10 });
                }
            }
            harness.run_scheduled();
        }

        prop_assert_eq!(harness.driver.game().unwrap().phase(), RoundPhase::Finished);

        let starts = harness
            .sent
            .iter()
            .filter(|(_, frame)| matches!(frame, Frame::Message(ServerMessage::PlayerImprovStart { .. })))
            .count();
        prop_assert_eq!(starts, players);

        let mut everyone = vec![HOST];
        everyone.extend(harness.participants());
        prop_assert_eq!(harness.received(&ServerMessage::GameFinished), everyone);
    }
}

#[test]
fn wrong_code_never_registers() {
    let mut harness = Harness::new(1, 0);

    let result = harness.driver.register(9, Registration::Participant {
        lobby_code: "9999".to_string(),
        name: "Eve".to_string(),
    });

    assert!(result.is_err());
    assert!(harness.driver.lookup(9).is_none());
}
