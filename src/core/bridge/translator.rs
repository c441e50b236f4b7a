//! Pure mapping between the browser vocabulary and the Voice Live vocabulary.
//!
//! Nothing here performs I/O; the session feeds messages through these
//! functions and acts on the result.

use base64::prelude::*;

use super::messages::{ClientMessage, Notification};
use crate::core::voicelive::{
    AudioFormat, AzureStandardVoice, Modality, SessionConfig, TurnDetection, UpstreamEvent,
    VoiceConfig,
};

/// Server VAD activation threshold (0.0 to 1.0).
pub const VAD_THRESHOLD: f32 = 0.5;

/// Audio kept before detected speech, in milliseconds.
pub const VAD_PREFIX_PADDING_MS: u32 = 300;

/// Trailing silence that ends a user turn, in milliseconds.
pub const VAD_SILENCE_DURATION_MS: u32 = 500;

/// Command forwarded to the upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamCommand {
    /// Append base64 PCM16 audio to the input buffer
    AppendAudio { audio: String },
    /// Cancel the response in progress
    CancelResponse,
}

/// What the bridge should do with one browser message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Forward(UpstreamCommand),
    Stop,
    Ignore,
}

/// Pick the voice payload shape for a configured voice name.
///
/// Regional voices such as `en-US-AvaNeural` always contain a hyphen and use
/// the structured form; everything else is a flat named voice.
pub fn voice_config_for(voice: &str) -> VoiceConfig {
    let voice = voice.trim();
    if voice.contains('-') {
        VoiceConfig::AzureStandard(AzureStandardVoice::new(voice))
    } else {
        VoiceConfig::Named(voice.to_string())
    }
}

/// Build the configuration sent once with `session.update`.
pub fn build_session_config(voice: &str, instructions: &str) -> SessionConfig {
    let instructions = instructions.trim();

    SessionConfig {
        modalities: vec![Modality::Text, Modality::Audio],
        instructions: (!instructions.is_empty()).then(|| instructions.to_string()),
        voice: voice_config_for(voice),
        input_audio_format: AudioFormat::Pcm16,
        output_audio_format: AudioFormat::Pcm16,
        turn_detection: TurnDetection::ServerVad {
            threshold: VAD_THRESHOLD,
            prefix_padding_ms: VAD_PREFIX_PADDING_MS,
            silence_duration_ms: VAD_SILENCE_DURATION_MS,
        },
    }
}

/// Parse one text frame from the browser.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Map a browser message to zero or one upstream command.
pub fn translate_client_message(message: ClientMessage) -> ClientAction {
    match message {
        ClientMessage::Audio { audio: Some(audio) } if !audio.is_empty() => {
            ClientAction::Forward(UpstreamCommand::AppendAudio { audio })
        }
        ClientMessage::Audio { .. } => ClientAction::Ignore,
        ClientMessage::Interrupt => ClientAction::Forward(UpstreamCommand::CancelResponse),
        ClientMessage::Stop => ClientAction::Stop,
        ClientMessage::Unknown => ClientAction::Ignore,
    }
}

/// Map an upstream event to the notification relayed to the browser.
///
/// Audio is base64-encoded here and nowhere else. Unknown events yield `None`.
pub fn translate_upstream_event(event: UpstreamEvent) -> Option<Notification> {
    let notification = match event {
        UpstreamEvent::SessionUpdated { session_id } => Notification::SessionReady { session_id },
        UpstreamEvent::SpeechStarted => Notification::SpeechStarted,
        UpstreamEvent::SpeechStopped => Notification::SpeechStopped,
        UpstreamEvent::ResponseCreated => Notification::ResponseStarted,
        UpstreamEvent::AudioDelta(audio) => Notification::Audio {
            audio: BASE64_STANDARD.encode(&audio),
        },
        UpstreamEvent::AudioDone => Notification::ResponseAudioDone,
        UpstreamEvent::ResponseDone => Notification::ResponseDone,
        UpstreamEvent::Error { message } => Notification::Error { message },
        UpstreamEvent::Unknown { .. } => return None,
    };

    Some(notification)
}
