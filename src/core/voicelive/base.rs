//! Base traits and types for the upstream conversation service.
//!
//! The bridge only ever talks to the service through the traits defined here:
//! a connector that opens one conversation, a sender for commands and a
//! receiver yielding decoded events. The WebSocket implementation lives in
//! [`super::client`]; tests plug in their own.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::config::UpstreamSettings;
use super::messages::SessionConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised by the upstream connection.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection or handshake failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Endpoint, model or credential unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Transport-level WebSocket failure
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// A single event could not be understood
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// A single event could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Peer stayed silent past the liveness window
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Connection already closed
    #[error("Not connected")]
    NotConnected,
}

impl UpstreamError {
    /// Whether the connection survives this error.
    ///
    /// Problems confined to one event are recoverable; anything touching the
    /// transport is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            UpstreamError::ProtocolError(_) | UpstreamError::SerializationError(_)
        )
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

// =============================================================================
// Events
// =============================================================================

/// Decoded event received from the upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Session configuration accepted
    SessionUpdated {
        /// Upstream session identifier
        session_id: String,
    },
    /// Voice activity detected in the input buffer
    SpeechStarted,
    /// Voice activity ended
    SpeechStopped,
    /// A response started generating
    ResponseCreated,
    /// Raw PCM16 audio chunk of the response
    AudioDelta(Bytes),
    /// Response audio finished
    AudioDone,
    /// Response finished
    ResponseDone,
    /// Service reported an error
    Error {
        /// Error text from the service
        message: String,
    },
    /// Event type this bridge does not relay
    Unknown {
        /// Raw `type` tag
        event_type: String,
    },
}

// =============================================================================
// Connection traits
// =============================================================================

/// Opens upstream conversations.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Connect and return both halves of the conversation.
    async fn connect(&self, settings: &UpstreamSettings) -> UpstreamResult<UpstreamConnection>;
}

/// Command half of an upstream conversation.
#[async_trait]
pub trait UpstreamSender: Send {
    /// Apply the session configuration.
    async fn update_session(&mut self, session: SessionConfig) -> UpstreamResult<()>;

    /// Append base64 PCM16 audio to the input buffer.
    async fn append_audio(&mut self, audio: String) -> UpstreamResult<()>;

    /// Cancel the response currently being generated.
    async fn cancel_response(&mut self) -> UpstreamResult<()>;

    /// Close the connection.
    async fn close(&mut self) -> UpstreamResult<()>;
}

/// Event half of an upstream conversation.
#[async_trait]
pub trait UpstreamReceiver: Send {
    /// Wait for the next event. `None` means the stream has ended.
    async fn next_event(&mut self) -> Option<UpstreamResult<UpstreamEvent>>;
}

/// Both halves of an open upstream conversation.
pub struct UpstreamConnection {
    pub sender: Box<dyn UpstreamSender>,
    pub receiver: Box<dyn UpstreamReceiver>,
}

impl UpstreamConnection {
    pub fn new(sender: Box<dyn UpstreamSender>, receiver: Box<dyn UpstreamReceiver>) -> Self {
        Self { sender, receiver }
    }
}
