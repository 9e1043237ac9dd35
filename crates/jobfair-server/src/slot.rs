//! The server's single session slot.
//!
//! At most one session runs at a time. A host opens it with `create_lobby`;
//! once that host leaves, the router stops and the slot is free again.

use jobfair_core::{Environment, GameConfig};
use jobfair_proto::Frame;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    driver::Registration,
    error::SessionError,
    registry::ConnectionId,
    router::{Router, RouterHandle},
};

/// Holds the running session, if any.
pub struct SessionSlot<E: Environment> {
    env: E,
    config: GameConfig,
    current: Mutex<Option<RouterHandle>>,
}

impl<E: Environment> SessionSlot<E> {
    /// Create an empty slot.
    pub fn new(env: E, config: GameConfig) -> Self {
        Self { env, config, current: Mutex::new(None) }
    }

    /// Configuration every new session starts with.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Open a session with `connection` as its host.
    ///
    /// # Errors
    ///
    /// - `SessionError::HostAlreadyRegistered` if a session is running
    /// - `SessionError::SessionClosed` if the new router stopped before the
    ///   host was registered
    pub async fn create_lobby(
        &self,
        connection: ConnectionId,
        outbound: mpsc::Sender<Frame>,
        cancel: CancellationToken,
    ) -> Result<RouterHandle, SessionError> {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|handle| !handle.is_closed()) {
            return Err(SessionError::HostAlreadyRegistered);
        }

        let handle = Router::spawn(self.env.clone(), self.config.clone());
        handle.register(connection, Registration::Host, outbound, cancel).await?;

        *current = Some(handle.clone());
        Ok(handle)
    }

    /// Handle to the running session.
    ///
    /// # Errors
    ///
    /// `SessionError::NoSession` if no host has opened one.
    pub async fn current(&self) -> Result<RouterHandle, SessionError> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|handle| !handle.is_closed())
            .cloned()
            .ok_or(SessionError::NoSession)
    }
}
