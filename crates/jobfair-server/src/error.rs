//! Server error types.
//!
//! [`SessionError`] covers requests the session refuses. [`ServerError`] covers
//! failures of the process itself (configuration, binding, I/O).

use jobfair_core::RoundError;
use jobfair_proto::ProtocolError;
use thiserror::Error;

use crate::registry::ConnectionId;

/// Errors raised while handling a request inside the session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A host is already registered; only one session may exist
    #[error("a session is already open")]
    HostAlreadyRegistered,

    /// Connection tried to register twice
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// Join attempt without an open session
    #[error("no session is open")]
    NoSession,

    /// Join attempt carried the wrong session code
    #[error("incorrect session code")]
    WrongLobbyCode,

    /// Join attempt carried a blank display name
    #[error("display name is empty")]
    InvalidName,

    /// Joins are refused once the roster is frozen
    #[error("game in progress, joins are closed")]
    JoinClosed,

    /// Host asked to start while a game is running
    #[error("a game is already in progress")]
    GameInProgress,

    /// Not enough participants to start
    #[error("need {required} players to start, have {actual}")]
    NotEnoughPlayers {
        /// Configured minimum
        required: usize,
        /// Participants connected
        actual: usize,
    },

    /// Game action before the host started a game
    #[error("no game has been started")]
    NoGame,

    /// Host-only action from a participant
    #[error("connection {0} is not the host")]
    NotHost(ConnectionId),

    /// Participant-only action from the host
    #[error("connection {0} is not a participant")]
    NotParticipant(ConnectionId),

    /// Message from a connection the session does not know
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// Handshake message arrived in the wrong place
    #[error("unexpected {0} message")]
    UnexpectedMessage(&'static str),

    /// Frame could not be decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Game logic refused the request
    #[error(transparent)]
    Round(#[from] RoundError),

    /// Session router has shut down
    #[error("session closed")]
    SessionClosed,
}

impl SessionError {
    /// Returns true if the sender should receive `connection_rejected`.
    ///
    /// Protocol, validation and capacity failures are reported. Precondition
    /// failures (wrong phase, wrong role, out of turn) are logged and ignored.
    pub fn rejects_sender(&self) -> bool {
        match self {
            Self::Round(err) => err.is_validation(),
            Self::HostAlreadyRegistered
            | Self::AlreadyRegistered(_)
            | Self::NoSession
            | Self::WrongLobbyCode
            | Self::InvalidName
            | Self::JoinClosed
            | Self::NotEnoughPlayers { .. }
            | Self::UnexpectedMessage(_)
            | Self::Protocol(_)
            | Self::SessionClosed => true,
            Self::GameInProgress
            | Self::NoGame
            | Self::NotHost(_)
            | Self::NotParticipant(_)
            | Self::UnknownConnection(_) => false,
        }
    }
}

/// Errors that stop the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid configuration (bind address, config file)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network failure
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// WebSocket handshake or framing failure
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_classification() {
        assert!(SessionError::WrongLobbyCode.rejects_sender());
        assert!(SessionError::NotEnoughPlayers { required: 3, actual: 1 }.rejects_sender());
        assert!(SessionError::Round(RoundError::EmptyJobText).rejects_sender());

        assert!(!SessionError::NoGame.rejects_sender());
        assert!(!SessionError::NotHost(4).rejects_sender());
        assert!(!SessionError::Round(RoundError::TimerNotRunning).rejects_sender());
    }

    #[test]
    fn display() {
        let err = SessionError::NotEnoughPlayers { required: 3, actual: 2 };
        assert_eq!(err.to_string(), "need 3 players to start, have 2");

        let err = ServerError::Config("bad address".to_string());
        assert_eq!(err.to_string(), "configuration error: bad address");
    }
}
