//! Voice Live WebSocket message types.
//!
//! All events are JSON-encoded and sent over WebSocket.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Update session configuration
//! - input_audio_buffer.append - Append audio to buffer
//! - response.cancel - Cancel current response
//!
//! Server events relayed by the bridge:
//! - session.updated - Session configuration applied
//! - input_audio_buffer.speech_started - Speech detection started
//! - input_audio_buffer.speech_stopped - Speech detection stopped
//! - response.created - Response generation started
//! - response.audio.delta - Audio data chunk
//! - response.audio.done - Audio generation complete
//! - response.done - Response complete
//! - error - Error occurred
//!
//! Every other server event type deserializes into [`ServerEvent::Other`].

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::base::{UpstreamError, UpstreamEvent, UpstreamResult};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent once with `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities
    pub modalities: Vec<Modality>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    pub voice: VoiceConfig,

    /// Input audio format
    pub input_audio_format: AudioFormat,

    /// Output audio format
    pub output_audio_format: AudioFormat,

    /// Turn detection configuration
    pub turn_detection: TurnDetection,
}

/// Response modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

/// Audio encoding on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    /// 16-bit little-endian PCM, mono, 24kHz
    #[serde(rename = "pcm16")]
    Pcm16,
}

/// Voice selection.
///
/// Flat names ("alloy", "shimmer") serialize as a plain string; regional
/// voices ("en-US-AvaNeural") serialize as an `azure-standard` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoiceConfig {
    /// Named voice
    Named(String),
    /// Structured regional voice
    AzureStandard(AzureStandardVoice),
}

/// Regional voice descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureStandardVoice {
    /// Full voice name, e.g. "en-US-AvaNeural"
    pub name: String,
    /// Always "azure-standard"
    #[serde(rename = "type")]
    pub voice_type: String,
}

impl AzureStandardVoice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice_type: "azure-standard".to_string(),
        }
    }
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        threshold: f32,
        /// Audio kept before detected speech, in ms
        prefix_padding_ms: u32,
        /// Trailing silence that ends a turn, in ms
        silence_duration_ms: u32,
    },
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Cancel the current response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: SessionInfo,
    },

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    /// Response created
    #[serde(rename = "response.created")]
    ResponseCreated,

    /// Audio delta (audio data chunk)
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded audio delta
        delta: String,
    },

    /// Audio done
    #[serde(rename = "response.audio.done")]
    AudioDone,

    /// Response done
    #[serde(rename = "response.done")]
    ResponseDone,

    /// Any event type the bridge does not relay
    #[serde(other)]
    Other,
}

/// API error information.
///
/// Only the message is relayed. The service's `type`, `code` and `param`
/// fields vary in shape (`code` may be a string or a number) and are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Session information carried by session events.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// Session ID
    #[serde(default)]
    pub id: String,
}

/// Just the tag of an event, used to name events we do not relay.
#[derive(Deserialize)]
struct EventTag {
    #[serde(rename = "type", default)]
    event_type: String,
}

impl ServerEvent {
    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

/// Decode one text frame from the service into an [`UpstreamEvent`].
///
/// Malformed JSON and undecodable audio are reported as recoverable errors so
/// a single bad event never ends the conversation.
pub fn decode_server_event(text: &str) -> UpstreamResult<UpstreamEvent> {
    let event: ServerEvent = serde_json::from_str(text)
        .map_err(|e| UpstreamError::SerializationError(e.to_string()))?;

    let decoded = match event {
        ServerEvent::Error { error } => UpstreamEvent::Error {
            message: error.message,
        },
        ServerEvent::SessionUpdated { session } => UpstreamEvent::SessionUpdated {
            session_id: session.id,
        },
        ServerEvent::SpeechStarted => UpstreamEvent::SpeechStarted,
        ServerEvent::SpeechStopped => UpstreamEvent::SpeechStopped,
        ServerEvent::ResponseCreated => UpstreamEvent::ResponseCreated,
        ServerEvent::AudioDelta { delta } => {
            let audio = ServerEvent::decode_audio_delta(&delta).map_err(|e| {
                UpstreamError::ProtocolError(format!("invalid audio delta: {e}"))
            })?;
            UpstreamEvent::AudioDelta(Bytes::from(audio))
        }
        ServerEvent::AudioDone => UpstreamEvent::AudioDone,
        ServerEvent::ResponseDone => UpstreamEvent::ResponseDone,
        ServerEvent::Other => {
            let tag: EventTag = serde_json::from_str(text)
                .map_err(|e| UpstreamError::SerializationError(e.to_string()))?;
            UpstreamEvent::Unknown {
                event_type: tag.event_type,
            }
        }
    };

    Ok(decoded)
}

// =============================================================================
// Tests
// =============================================================================
