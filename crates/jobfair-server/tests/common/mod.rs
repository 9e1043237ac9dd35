//! Shared fixtures for router tests.
//!
//! Connections are in-memory: each fake client is an outbound queue receiver
//! plus the cancellation token the router fires when it drops the client.
//! Tests run on a paused tokio clock, so timers fire only when a test sleeps.

#![allow(dead_code)]

use std::time::Duration;

use jobfair_core::{GameConfig, ParticipantId};
use jobfair_harness::SimEnv;
use jobfair_proto::{Card, ClientMessage, Frame, ServerMessage};
use jobfair_server::{ConnectionId, Registration, Router, RouterHandle, SessionError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Session code used by every fixture session.
pub const CODE: &str = "1234";

/// Host connection id in fixture sessions.
pub const HOST: ConnectionId = 1;

/// Fixture configuration: fixed code, default timings.
pub fn config() -> GameConfig {
    let mut config = GameConfig::default();
    config.lobby.code = Some(CODE.to_string());
    config
}

/// One fake connection.
pub struct Client {
    pub connection: ConnectionId,
    pub player_id: Option<ParticipantId>,
    pub rx: mpsc::Receiver<Frame>,
    pub cancel: CancellationToken,
}

impl Client {
    /// Every message queued so far, keep-alive pings skipped.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            if let Frame::Message(message) = frame {
                messages.push(message);
            }
        }
        messages
    }

    /// The participant id assigned at join.
    pub fn id(&self) -> ParticipantId {
        self.player_id.expect("client is not a participant")
    }
}

/// Register a connection and return its fake client.
pub async fn connect(
    router: &RouterHandle,
    connection: ConnectionId,
    registration: Registration,
    capacity: usize,
) -> Result<Client, SessionError> {
    let (tx, rx) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();
    router.register(connection, registration, tx, cancel.clone()).await?;

    Ok(Client { connection, player_id: None, rx, cancel })
}

/// Spawn a router and register its host.
pub async fn open_session(seed: u64, config: GameConfig) -> (RouterHandle, Client) {
    let router = Router::spawn(SimEnv::with_seed(seed), config);
    let mut host = connect(&router, HOST, Registration::Host, 256).await.unwrap();

    let welcome = host.drain();
    assert!(matches!(welcome.as_slice(), [ServerMessage::LobbyCode { .. }]));
    (router, host)
}

/// Join a participant and record the id it was given.
pub async fn join(router: &RouterHandle, connection: ConnectionId, name: &str) -> Client {
    let registration =
        Registration::Participant { lobby_code: CODE.to_string(), name: name.to_string() };
    let mut client = connect(router, connection, registration, 256).await.unwrap();

    let welcome = client.drain();
    let [ServerMessage::PlayerId { player_id }] = welcome.as_slice() else {
        panic!("expected player id, got {welcome:?}");
    };
    client.player_id = Some(*player_id);
    client
}

/// Wait until the router has processed every command sent before this call.
pub async fn sync(router: &RouterHandle) {
    let _ = router.lookup(HOST).await;
}

/// Forward a message from `client` and wait for it to be processed.
pub async fn send(router: &RouterHandle, client: &Client, message: ClientMessage) {
    router.inbound(client.connection, message).await.unwrap();
    sync(router).await;
}

/// Let the paused clock run for `duration`, then wait for the router.
pub async fn elapse(router: &RouterHandle, duration: Duration) {
    tokio::time::sleep(duration).await;
    sync(router).await;
}

/// A session whose first presentation has just started.
pub struct Presenting {
    pub router: RouterHandle,
    pub host: Client,
    pub players: Vec<Client>,
    /// Each player's hand as dealt (drawn cards, job card)
    pub hands: Vec<(Vec<Card>, Card)>,
    /// Presenter announced by the first `player_improv_start`
    pub presenter: ParticipantId,
}

impl Presenting {
    /// Players other than the current presenter.
    pub fn audience(&self, presenter: ParticipantId) -> impl Iterator<Item = &Client> {
        self.players.iter().filter(move |player| player.id() != presenter)
    }

    /// Index of the player with id `player`.
    pub fn index_of(&self, player: ParticipantId) -> usize {
        self.players.iter().position(|client| client.id() == player).expect("unknown player")
    }
}

/// Run a session with `names.len()` players up to the first presentation.
pub async fn start_presenting(seed: u64, names: &[&str]) -> Presenting {
    let (router, mut host) = open_session(seed, config()).await;

    let mut players = Vec::new();
    for (i, name) in names.iter().enumerate() {
        players.push(join(&router, HOST + 1 + i as u64, name).await);
    }
    assert_eq!(host.drain().len(), names.len());

    let (hands, presenter) = play_to_presentation(&router, &mut host, &mut players).await;
    Presenting { router, host, players, hands, presenter }
}

/// Start a game on an open session and play it up to the first
/// presentation. Returns each player's hand and the first presenter.
pub async fn play_to_presentation(
    router: &RouterHandle,
    host: &mut Client,
    players: &mut [Client],
) -> (Vec<(Vec<Card>, Card)>, ParticipantId) {
    send(router, host, ClientMessage::GameStart).await;
    let jobs = players.len() + 1;
    for player in players.iter_mut() {
        assert_eq!(player.drain(), vec![ServerMessage::GameStart { number_of_jobs: jobs }]);
    }
    host.drain();

    for player in players.iter() {
        for i in 0..jobs {
            let job_input = format!("{} job {i}", player.connection);
            send(router, player, ClientMessage::JobSubmitted { job_input }).await;
        }
    }

    let mut hands = Vec::new();
    for player in players.iter_mut() {
        let dealt = player.drain();
        let [ServerMessage::ReceivedCards { drawn_cards: Some(drawn), job_card: Some(job) }] =
            dealt.as_slice()
        else {
            panic!("expected a dealt hand, got {dealt:?}");
        };
        hands.push((drawn.clone(), job.clone()));
    }
    host.drain();

    for (player, (drawn, _)) in players.iter().zip(&hands) {
        send(router, player, ClientMessage::CardData { card: drawn[0].clone() }).await;
    }

    let start = host.drain();
    let Some(ServerMessage::PlayerImprovStart { player_id: presenter, .. }) = start.last() else {
        panic!("expected first presentation, got {start:?}");
    };
    let presenter = *presenter;
    for player in players.iter_mut() {
        assert_eq!(player.drain(), vec![ServerMessage::PlayerId { player_id: presenter }]);
    }

    (hands, presenter)
}
