//! Fuzz target for SessionDriver
//!
//! Drives a session with arbitrary joins, messages, disconnects and timer
//! events.
//!
//! # Invariants
//!
//! - The driver NEVER panics on any event sequence
//! - Frames are queued ONLY for connections registered when the event arrived
//! - After the host leaves, every event produces no actions
//! - A game's roster never changes while the game is in progress

#![no_main]

use arbitrary::Arbitrary;
use jobfair_core::{GameConfig, RoundPhase};
use jobfair_harness::SimEnv;
use jobfair_proto::{Card, ClientMessage};
use jobfair_server::{Registration, SessionAction, SessionDriver, SessionEvent};
use libfuzzer_sys::fuzz_target;
use uuid::Uuid;

const CODE: &str = "1234";

#[derive(Debug, Clone, Arbitrary)]
struct SessionScenario {
    seed: u64,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    Join { connection: u8, correct_code: bool, name: String },
    Message { connection: u8, message: FuzzedMessage },
    Disconnect { connection: u8 },
    TimerExpired { generation: u8 },
    Advance { presentation: u8 },
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzedMessage {
    GameStart,
    Job(String),
    Select { card: u8, text: String },
    Intercept { card: u8, text: String },
    Score(i64),
}

fuzz_target!(|scenario: SessionScenario| {
    let mut config = GameConfig::default();
    config.lobby.code = Some(CODE.to_string());

    let mut driver = SessionDriver::new(SimEnv::with_seed(scenario.seed), config);
    let _ = driver.register(0, Registration::Host);

    for step in scenario.steps {
        let torn_down = driver.is_torn_down();
        let registered = driver.registry().all_connections();
        let roster = driver
            .game()
            .filter(|game| game.phase() != RoundPhase::Finished)
            .map(|game| game.round().roster().to_vec());

        let actions = match step {
            Step::Join { connection, correct_code, name } => {
                let lobby_code = if correct_code { CODE.to_string() } else { "0000".to_string() };
                let registration = Registration::Participant { lobby_code, name };
                driver.register(u64::from(connection % 7) + 1, registration).unwrap_or_default()
            },
            Step::Message { connection, message } => {
                let message = client_message(&driver, message);
                driver.process_event(SessionEvent::MessageReceived {
                    connection: u64::from(connection % 8),
                    message,
                })
            },
            Step::Disconnect { connection } => driver
                .process_event(SessionEvent::Disconnected { connection: u64::from(connection % 8) }),
            Step::TimerExpired { generation } => driver
                .process_event(SessionEvent::TimerExpired { generation: u64::from(generation) }),
            Step::Advance { presentation } => driver
                .process_event(SessionEvent::AdvanceRound { presentation: u64::from(presentation) }),
        };

        if torn_down {
            assert!(actions.is_empty(), "event after teardown produced actions");
        }

        for action in &actions {
            if let SessionAction::Send { connection, .. } = action {
                let joined_now = driver.lookup(*connection).is_some();
                assert!(
                    registered.contains(connection) || joined_now,
                    "frame queued for unknown connection {connection}"
                );
            }
        }

        if let (Some(before), Some(game)) = (roster, driver.game()) {
            assert_eq!(before, game.round().roster(), "roster changed mid-game");
        }
    }
});

/// Map a fuzzed message onto a real one, preferring cards from the sender's
/// hand so selection and interception paths are reachable.
fn client_message(driver: &SessionDriver<SimEnv>, message: FuzzedMessage) -> ClientMessage {
    let hand: Vec<Card> = driver
        .game()
        .map(|game| game.round().job_pool().to_vec())
        .unwrap_or_default();
    let pick = |index: u8, text: String| {
        if hand.is_empty() {
            Card::new(Uuid::from_u128(u128::from(index)), text)
        } else {
            hand[usize::from(index) % hand.len()].clone()
        }
    };

    match message {
        FuzzedMessage::GameStart => ClientMessage::GameStart,
        FuzzedMessage::Job(job_input) => ClientMessage::JobSubmitted { job_input },
        FuzzedMessage::Select { card, text } => ClientMessage::CardData { card: pick(card, text) },
        FuzzedMessage::Intercept { card, text } => {
            ClientMessage::InterceptCardData { card: pick(card, text) }
        },
        FuzzedMessage::Score(score_in_cents) => ClientMessage::ScoreSubmission { score_in_cents },
    }
}
