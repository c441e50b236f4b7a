use thiserror::Error;

use crate::core::voicelive::UpstreamError;

/// Errors that end (or prevent) a bridged session.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Server is missing upstream credentials or endpoint
    #[error("{0}")]
    Configuration(String),

    /// Upstream connection or handshake failed
    #[error("Failed to connect to Voice Live: {0}")]
    UpstreamConnect(#[source] UpstreamError),

    /// Session configuration was rejected or could not be sent
    #[error("Failed to configure session: {0}")]
    SessionSetup(#[source] UpstreamError),

    /// Unrecoverable upstream failure while relaying
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Upstream ended the conversation while the client was still connected
    #[error("upstream connection closed")]
    UpstreamClosed,

    /// Client connection failed
    #[error("Client connection error: {0}")]
    Client(String),

    /// A relay task panicked or was aborted
    #[error("Relay task failed: {0}")]
    Task(String),
}

impl BridgeError {
    /// Whether the error concerns the client connection itself, in which case
    /// there is nobody left to tell about it.
    pub fn is_client_side(&self) -> bool {
        matches!(self, BridgeError::Client(_))
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
