//! Connection registry for the session's host and participants.
//!
//! Maps transport handles to logical clients in both directions: connection →
//! record (to resolve who sent a frame) and participant → connection (to
//! deliver a private hand). Connection ids grow monotonically, so iterating
//! participants yields join order.

use std::collections::{BTreeMap, HashMap};

use jobfair_core::ParticipantId;

/// Transport handle of one accepted connection.
pub type ConnectionId = u64;

/// Role a connection registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The display that owns the session
    Host,
    /// A player
    Participant,
}

/// One registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Transport handle
    pub id: ConnectionId,
    /// Registered role
    pub role: Role,
    /// Display name (participants only)
    pub display_name: Option<String>,
    /// Assigned participant id (participants only)
    pub participant_id: Option<ParticipantId>,
}

impl ConnectionRecord {
    /// Record for the host.
    pub fn host(id: ConnectionId) -> Self {
        Self { id, role: Role::Host, display_name: None, participant_id: None }
    }

    /// Record for a participant.
    pub fn participant(id: ConnectionId, name: String, participant_id: ParticipantId) -> Self {
        Self {
            id,
            role: Role::Participant,
            display_name: Some(name),
            participant_id: Some(participant_id),
        }
    }
}

/// Registry of the session's connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Connection id → record
    connections: BTreeMap<ConnectionId, ConnectionRecord>,
    /// The host's connection, if registered
    host: Option<ConnectionId>,
    /// Participant id → connection id (reverse index)
    participants: HashMap<ParticipantId, ConnectionId>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    ///
    /// Returns `false` if the connection id is taken, a second host is
    /// registered, or the participant id is already in use.
    pub fn register(&mut self, record: ConnectionRecord) -> bool {
        if self.connections.contains_key(&record.id) {
            return false;
        }

        match (record.role, record.participant_id) {
            (Role::Host, _) => {
                if self.host.is_some() {
                    return false;
                }
                self.host = Some(record.id);
            },
            (Role::Participant, Some(participant)) => {
                if self.participants.contains_key(&participant) {
                    return false;
                }
                self.participants.insert(participant, record.id);
            },
            (Role::Participant, None) => return false,
        }

        self.connections.insert(record.id, record);
        true
    }

    /// Remove a connection, returning its record if it existed.
    pub fn unregister(&mut self, connection: ConnectionId) -> Option<ConnectionRecord> {
        let record = self.connections.remove(&connection)?;

        if self.host == Some(connection) {
            self.host = None;
        }
        if let Some(participant) = record.participant_id {
            self.participants.remove(&participant);
        }

        Some(record)
    }

    /// Remove every connection, returning their ids (host first).
    pub fn drain(&mut self) -> Vec<ConnectionId> {
        let host = self.host.take();
        let mut ids: Vec<_> = host.into_iter().collect();
        ids.extend(self.connections.keys().copied().filter(|id| Some(*id) != host));

        self.connections.clear();
        self.participants.clear();
        ids
    }

    /// Record for `connection`. `None` if not registered.
    pub fn lookup(&self, connection: ConnectionId) -> Option<&ConnectionRecord> {
        self.connections.get(&connection)
    }

    /// The host's connection id.
    pub fn host(&self) -> Option<ConnectionId> {
        self.host
    }

    /// Connection currently owned by `participant`.
    pub fn connection_of(&self, participant: &ParticipantId) -> Option<ConnectionId> {
        self.participants.get(participant).copied()
    }

    /// Participant records in join order.
    pub fn participants(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.connections.values().filter(|record| record.role == Role::Participant)
    }

    /// Participant ids in join order.
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants().filter_map(|record| record.participant_id).collect()
    }

    /// Participant connection ids in join order.
    pub fn participant_connections(&self) -> Vec<ConnectionId> {
        self.participants().map(|record| record.id).collect()
    }

    /// Every connection id, host first.
    pub fn all_connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.host.into_iter().collect();
        ids.extend(self.participant_connections());
        ids
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
