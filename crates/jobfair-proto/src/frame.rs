//! Outbound units queued for a connection's writer task.

use crate::{errors::Result, message::ServerMessage};

/// One item on a connection's outbound queue.
///
/// Keep-alive pings travel the same queue as messages so a connection has a
/// single writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A protocol message, written as a text frame.
    Message(ServerMessage),
    /// A WebSocket ping.
    Ping,
}

impl Frame {
    /// Text payload for [`Frame::Message`], `None` for control frames.
    pub fn to_text(&self) -> Result<Option<String>> {
        match self {
            Self::Message(message) => message.encode().map(Some),
            Self::Ping => Ok(None),
        }
    }
}

impl From<ServerMessage> for Frame {
    fn from(message: ServerMessage) -> Self {
        Self::Message(message)
    }
}
