//! Jobfair session server.
//!
//! Hosts one party-game session at a time over WebSocket. A host display opens
//! the session, participants join with its code, and the server runs the game:
//! job collection, dealing, card selection, timed presentations with
//! interruptions, and scoring.
//!
//! # Architecture
//!
//! [`SessionDriver`] is pure: it turns [`SessionEvent`]s into
//! [`SessionAction`]s using [`jobfair_core`]'s game state. The [`Router`] task
//! owns the driver and executes its actions against per-connection outbound
//! queues. [`Server`] accepts WebSocket connections and runs a reader, writer
//! and heartbeat task for each.
//!
//! # Components
//!
//! - [`SessionDriver`]: action-based session logic (no I/O)
//! - [`Router`] / [`RouterHandle`]: actor executing driver actions
//! - [`SessionSlot`]: the single session slot
//! - [`ConnectionRegistry`]: connection to participant mapping
//! - [`WsTransport`]: WebSocket listener
//! - [`SystemEnv`]: production environment (real time, OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
mod driver;
mod error;
mod registry;
mod router;
mod slot;
mod system_env;
pub mod transport;

use std::sync::Arc;

pub use driver::{Recipients, Registration, SessionAction, SessionDriver, SessionEvent};
pub use error::{ServerError, SessionError};
use jobfair_core::{GameConfig, config::ConnectionConfig};
pub use registry::{ConnectionId, ConnectionRecord, ConnectionRegistry, Role};
pub use router::{Router, RouterCommand, RouterHandle};
pub use slot::SessionSlot;
pub use system_env::SystemEnv;
use tokio_util::sync::CancellationToken;
pub use transport::WsTransport;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4041")
    pub bind_address: String,
    /// Game settings every session starts with
    pub game: GameConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:4041".to_string(), game: GameConfig::default() }
    }
}

/// Production jobfair server.
pub struct Server {
    /// WebSocket listener
    transport: WsTransport,
    /// The one session
    slot: Arc<SessionSlot<SystemEnv>>,
    /// Per-connection settings
    connection: ConnectionConfig,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let transport = WsTransport::bind(&config.bind_address).await?;
        let connection = config.game.connection.clone();
        let slot = Arc::new(SessionSlot::new(SystemEnv::new(), config.game));

        Ok(Self { transport, slot, connection })
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let mut next_connection: ConnectionId = 0;

        loop {
            let accepted = tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Server shutting down");
                    return Ok(());
                },
                accepted = self.transport.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    next_connection += 1;
                    let connection = next_connection;
                    let slot = Arc::clone(&self.slot);
                    let settings = self.connection.clone();

                    tokio::spawn(async move {
                        match transport::upgrade(stream).await {
                            Ok(ws) => connection::serve_connection(ws, connection, slot, settings).await,
                            Err(e) => {
                                tracing::debug!(connection, %peer, error = %e, "handshake failed");
                            },
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}
