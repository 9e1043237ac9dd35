//! Session router actor.
//!
//! One task owns the [`SessionDriver`] and every connection's outbound queue.
//! Connection tasks talk to it only through [`RouterHandle`], so commands are
//! applied one at a time in arrival order and no lock guards session state.
//!
//! Outbound queues are bounded. A queue that is full (or whose writer is gone)
//! gets its connection dropped as if it had disconnected, so one slow client
//! never stalls the loop.

use std::{collections::HashMap, collections::VecDeque, time::Duration};

use jobfair_core::{Environment, GameConfig};
use jobfair_proto::{ClientMessage, Frame};
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tokio_util::sync::CancellationToken;

use crate::{
    driver::{Recipients, Registration, SessionAction, SessionDriver, SessionEvent},
    error::SessionError,
    registry::{ConnectionId, ConnectionRecord},
};

/// Commands buffered before senders wait.
const COMMAND_CAPACITY: usize = 1024;

/// Commands accepted by the router loop.
#[derive(Debug)]
pub enum RouterCommand {
    /// Register a connection and attach its outbound queue
    Register {
        /// Transport handle
        connection: ConnectionId,
        /// Requested role
        registration: Registration,
        /// Connection's outbound queue
        outbound: mpsc::Sender<Frame>,
        /// Cancelled when the router closes the connection
        cancel: CancellationToken,
        /// Registration outcome
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// A connection went away
    Unregister {
        /// Transport handle
        connection: ConnectionId,
    },
    /// A decoded message from a connection
    Inbound {
        /// Sender
        connection: ConnectionId,
        /// Message
        message: ClientMessage,
    },
    /// A frame from a connection that failed to decode
    Rejected {
        /// Sender
        connection: ConnectionId,
        /// Decode failure
        reason: String,
    },
    /// Send to the host and every participant
    Broadcast(Frame),
    /// Send to the host
    UnicastHost(Frame),
    /// Send to every participant
    UnicastParticipants(Frame),
    /// Send to one connection
    DirectMessage {
        /// Target
        connection: ConnectionId,
        /// Frame
        frame: Frame,
    },
    /// Resolve a transport handle
    Lookup {
        /// Transport handle
        connection: ConnectionId,
        /// Record, if registered
        reply: oneshot::Sender<Option<ConnectionRecord>>,
    },
    /// A deferred event whose delay has elapsed
    Scheduled(SessionEvent),
}

/// One connection's outbound side.
struct Outbound {
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
}

/// The session's control loop.
pub struct Router<E: Environment> {
    driver: SessionDriver<E>,
    env: E,
    outbound: HashMap<ConnectionId, Outbound>,
    commands: mpsc::Receiver<RouterCommand>,
    /// Weak so that scheduled tasks never keep the session alive
    scheduler: mpsc::WeakSender<RouterCommand>,
    shutdown: CancellationToken,
}

impl<E: Environment> Router<E> {
    /// Spawn a router for a new session.
    pub fn spawn(env: E, config: GameConfig) -> RouterHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let shutdown = CancellationToken::new();

        let router = Self {
            driver: SessionDriver::new(env.clone(), config),
            env,
            outbound: HashMap::new(),
            commands: rx,
            scheduler: tx.downgrade(),
            shutdown: shutdown.clone(),
        };
        tokio::spawn(router.run());

        RouterHandle { commands: tx, shutdown }
    }

    async fn run(mut self) {
        tracing::debug!(code = self.driver.code(), "router started");

        while let Some(command) = self.commands.recv().await {
            if !self.handle_command(command) {
                break;
            }
        }

        self.shutdown.cancel();
        for (_, outbound) in self.outbound.drain() {
            outbound.cancel.cancel();
        }

        tracing::debug!("router stopped");
    }

    /// Apply one command. Returns false once the session is over.
    fn handle_command(&mut self, command: RouterCommand) -> bool {
        let actions = match command {
            RouterCommand::Register { connection, registration, outbound, cancel, reply } => {
                // A duplicate registration must not replace the live queue
                let fresh = !self.outbound.contains_key(&connection);
                if fresh {
                    self.outbound.insert(connection, Outbound { tx: outbound, cancel });
                }
                match self.driver.register(connection, registration) {
                    Ok(actions) => {
                        let _ = reply.send(Ok(()));
                        actions
                    },
                    Err(err) => {
                        tracing::warn!(connection, error = %err, "registration refused");
                        if fresh {
                            self.outbound.remove(&connection);
                        }
                        let _ = reply.send(Err(err));
                        Vec::new()
                    },
                }
            },
            RouterCommand::Unregister { connection } => {
                self.driver.process_event(SessionEvent::Disconnected { connection })
            },
            RouterCommand::Inbound { connection, message } => {
                self.driver.process_event(SessionEvent::MessageReceived { connection, message })
            },
            RouterCommand::Rejected { connection, reason } => {
                self.driver.process_event(SessionEvent::MessageRejected { connection, reason })
            },
            RouterCommand::Broadcast(frame) => self.deliver(Recipients::All, frame),
            RouterCommand::UnicastHost(frame) => self.deliver(Recipients::Host, frame),
            RouterCommand::UnicastParticipants(frame) => self.deliver(Recipients::Participants, frame),
            RouterCommand::DirectMessage { connection, frame } => {
                self.deliver(Recipients::Connection(connection), frame)
            },
            RouterCommand::Lookup { connection, reply } => {
                let _ = reply.send(self.driver.lookup(connection).cloned());
                Vec::new()
            },
            RouterCommand::Scheduled(event) => self.driver.process_event(event),
        };

        self.execute(actions)
    }

    fn deliver(&mut self, recipients: Recipients, frame: Frame) -> Vec<SessionAction> {
        self.driver.process_event(SessionEvent::Deliver { recipients, frame })
    }

    /// Execute actions, feeding dropped connections back in as disconnects.
    fn execute(&mut self, actions: Vec<SessionAction>) -> bool {
        let mut pending = VecDeque::from(actions);
        let mut running = true;

        while let Some(action) = pending.pop_front() {
            match action {
                SessionAction::Send { connection, frame } => {
                    if !self.enqueue(connection, frame) {
                        self.close(connection);
                        pending.extend(
                            self.driver.process_event(SessionEvent::Disconnected { connection }),
                        );
                    }
                },
                SessionAction::Close { connection, reason } => {
                    tracing::debug!(connection, %reason, "closing connection");
                    self.close(connection);
                },
                SessionAction::Schedule { after, event } => self.schedule(after, event),
                SessionAction::Teardown => running = false,
            }
        }

        running
    }

    /// Queue a frame without waiting. Returns false if the connection must be
    /// dropped.
    fn enqueue(&self, connection: ConnectionId, frame: Frame) -> bool {
        let Some(outbound) = self.outbound.get(&connection) else {
            tracing::debug!(connection, "no outbound queue, frame dropped");
            return true;
        };

        match outbound.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection, "outbound queue full, dropping connection");
                false
            },
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection, "outbound queue closed");
                false
            },
        }
    }

    /// Detach a connection's queue. Its writer drains what is queued and the
    /// reader stops.
    fn close(&mut self, connection: ConnectionId) {
        if let Some(outbound) = self.outbound.remove(&connection) {
            outbound.cancel.cancel();
        }
    }

    /// Deliver `event` back to this router after `after`, unless the session
    /// ends first.
    fn schedule(&self, after: Duration, event: SessionEvent) {
        let scheduler = self.scheduler.clone();
        let shutdown = self.shutdown.clone();
        let env = self.env.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {},
                () = env.sleep(after) => {
                    if let Some(commands) = scheduler.upgrade() {
                        let _ = commands.send(RouterCommand::Scheduled(event)).await;
                    }
                },
            }
        });
    }
}

/// Cloneable handle to a running router.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    commands: mpsc::Sender<RouterCommand>,
    shutdown: CancellationToken,
}

impl RouterHandle {
    /// Register a connection. On success the connection's queue is attached
    /// and the welcome message (session code or participant id) is queued.
    pub async fn register(
        &self,
        connection: ConnectionId,
        registration: Registration,
        outbound: mpsc::Sender<Frame>,
        cancel: CancellationToken,
    ) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(RouterCommand::Register { connection, registration, outbound, cancel, reply })
            .await?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Report that a connection went away.
    pub async fn unregister(&self, connection: ConnectionId) -> Result<(), SessionError> {
        self.send(RouterCommand::Unregister { connection }).await
    }

    /// Forward a decoded message.
    pub async fn inbound(
        &self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), SessionError> {
        self.send(RouterCommand::Inbound { connection, message }).await
    }

    /// Report a frame that failed to decode.
    pub async fn rejected(
        &self,
        connection: ConnectionId,
        reason: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send(RouterCommand::Rejected { connection, reason: reason.into() }).await
    }

    /// Send to the host and every participant.
    pub async fn broadcast(&self, frame: Frame) -> Result<(), SessionError> {
        self.send(RouterCommand::Broadcast(frame)).await
    }

    /// Send to the host.
    pub async fn unicast_host(&self, frame: Frame) -> Result<(), SessionError> {
        self.send(RouterCommand::UnicastHost(frame)).await
    }

    /// Send to every participant.
    pub async fn unicast_participants(&self, frame: Frame) -> Result<(), SessionError> {
        self.send(RouterCommand::UnicastParticipants(frame)).await
    }

    /// Send to one connection.
    pub async fn direct_message(
        &self,
        connection: ConnectionId,
        frame: Frame,
    ) -> Result<(), SessionError> {
        self.send(RouterCommand::DirectMessage { connection, frame }).await
    }

    /// Resolve a transport handle to its record.
    pub async fn lookup(&self, connection: ConnectionId) -> Option<ConnectionRecord> {
        let (reply, response) = oneshot::channel();
        self.send(RouterCommand::Lookup { connection, reply }).await.ok()?;
        response.await.ok().flatten()
    }

    /// Whether the session has ended.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.commands.is_closed()
    }

    /// Wait until the session ends.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    async fn send(&self, command: RouterCommand) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::SessionClosed)
    }
}
