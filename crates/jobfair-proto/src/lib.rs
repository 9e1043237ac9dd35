//! Wire protocol for the jobfair session server.
//!
//! Every frame on the wire is a single JSON object. The `message_type` field is
//! the type tag and the payload fields sit beside it. Client and server
//! vocabularies are separate enums because several tags (`game_start`,
//! `card_data`, `score_submission`, ...) carry different payloads depending on
//! direction.
//!
//! # Components
//!
//! - [`ClientMessage`]: frames sent by the host display or participants
//! - [`ServerMessage`]: frames sent by the server
//! - [`Frame`]: an outbound unit on a connection's send queue
//! - [`Card`]: a submitted job description with its identifier

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod card;
mod errors;
pub mod frame;
pub mod message;

pub use card::{Card, CardId, ParticipantId};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use message::{ClientMessage, PlayerInfo, ServerMessage};
