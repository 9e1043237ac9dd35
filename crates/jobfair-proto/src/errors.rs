//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame was not valid JSON, carried an unknown `message_type`, or was
    /// missing a required field.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Frame arrived in a form the protocol does not use (binary data).
    #[error("unsupported frame: {0}")]
    Unsupported(&'static str),

    /// Outbound message could not be serialized.
    #[error("failed to encode {message_type}: {source}")]
    Encode {
        /// Tag of the message that failed
        message_type: &'static str,
        /// Underlying serializer error
        #[source]
        source: serde_json::Error,
    },
}
