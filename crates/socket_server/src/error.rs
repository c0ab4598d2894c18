//! Socket server error types

use contracts::ContractError;
use thiserror::Error;

/// Socket server specific error
#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed Engine.IO / Socket.IO packet or payload
    #[error("protocol error: {0}")]
    Protocol(String),

    /// `EIO` query parameter missing or not 3/4
    #[error("unsupported Engine.IO version '{0}'")]
    UnsupportedVersion(String),

    /// Binary packets and attachments
    #[error("binary packets are not supported")]
    BinaryUnsupported,

    /// Payload could not be serialized
    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Listener IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<ServerError> for ContractError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Io(e) => ContractError::Io(e),
            other => ContractError::protocol(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ServerError>;
