//! Browser-facing message types.
//!
//! The browser speaks a small JSON vocabulary tagged by `type`:
//!
//! - Client -> bridge: `audio`, `interrupt`, `stop`
//! - Bridge -> client: `session_ready`, `speech_started`, `speech_stopped`,
//!   `response_started`, `audio`, `response_audio_done`, `response_done`, `error`

use serde::{Deserialize, Serialize};

// =============================================================================
// Incoming Messages (Client -> Bridge)
// =============================================================================

/// Incoming WebSocket message from the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Microphone audio chunk
    Audio {
        /// Base64 PCM16, mono, 24kHz
        #[serde(default)]
        audio: Option<String>,
    },

    /// Barge-in: cancel the response being spoken
    Interrupt,

    /// End the call
    Stop,

    /// Any tag the bridge does not understand
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Outgoing Messages (Bridge -> Client)
// =============================================================================

/// Outgoing WebSocket message to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Upstream accepted the session configuration
    SessionReady {
        /// Upstream session identifier
        session_id: String,
    },

    /// User started speaking
    SpeechStarted,

    /// User stopped speaking
    SpeechStopped,

    /// Assistant started a response
    ResponseStarted,

    /// Assistant audio chunk
    Audio {
        /// Base64 PCM16, mono, 24kHz
        audio: String,
    },

    /// Assistant audio for the current response finished
    ResponseAudioDone,

    /// Response finished
    ResponseDone,

    /// Something went wrong
    Error {
        /// Error description
        message: String,
    },
}

impl Notification {
    /// Build an error notification.
    pub fn error(message: impl Into<String>) -> Self {
        Notification::Error {
            message: message.into(),
        }
    }

    /// Serialize to the JSON text frame sent to the browser.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
