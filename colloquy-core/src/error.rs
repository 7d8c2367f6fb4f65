//! Crate-level error type

use crate::config::ConfigError;
use crate::http::TransportError;
use thiserror::Error;

/// Result type for conversation operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors surfaced to the caller of a conversation operation
#[derive(Debug, Error)]
pub enum ChatError {
    /// Configuration could not be turned into a request (fatal, pre-transport)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The remote service answered with an error payload
    #[error("Remote error: {payload}")]
    Remote { payload: serde_json::Value },

    /// The exchange with the remote service failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Message content violates a structural rule
    #[error("Invalid content: {0}")]
    InvalidContent(String),
}

impl ChatError {
    /// Error payload reported by the remote service, if this is a remote error
    pub fn remote_payload(&self) -> Option<&serde_json::Value> {
        match self {
            ChatError::Remote { payload } => Some(payload),
            _ => None,
        }
    }
}
