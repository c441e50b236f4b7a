//! Azure Voice Live realtime conversation client.
//!
//! The service speaks a JSON event protocol over a single WebSocket:
//! the bridge sends `session.update`, `input_audio_buffer.append` and
//! `response.cancel`, and receives session, speech, response and audio
//! events back.
//!
//! # Example
//!
//! ```rust,ignore
//! use voicelive_bridge::core::voicelive::{
//!     ConnectionOptions, Credential, UpstreamConnector, UpstreamSettings, VoiceLiveConnector,
//! };
//!
//! let settings = UpstreamSettings {
//!     endpoint: "https://my-resource.services.ai.azure.com".to_string(),
//!     credential: Credential::api_key("..."),
//!     model: "gpt-4o-realtime-preview".to_string(),
//!     options: ConnectionOptions::default(),
//! };
//!
//! let mut conn = VoiceLiveConnector::new().connect(&settings).await?;
//! while let Some(event) = conn.receiver.next_event().await {
//!     println!("{:?}", event?);
//! }
//! ```

mod base;
mod client;
mod config;
mod messages;

pub use base::{
    UpstreamConnection, UpstreamConnector, UpstreamError, UpstreamEvent, UpstreamReceiver,
    UpstreamResult, UpstreamSender,
};
pub use client::{VoiceLiveConnector, VoiceLiveReceiver, VoiceLiveSender};
pub use config::{
    ConnectionOptions, Credential, HEARTBEAT_INTERVAL, IDLE_TIMEOUT, MAX_MESSAGE_SIZE,
    UpstreamSettings, VOICELIVE_API_KEY_HEADER, VOICELIVE_API_VERSION, VOICELIVE_REALTIME_PATH,
    VOICELIVE_SAMPLE_RATE, build_realtime_url,
};
pub use messages::{
    ApiError, AudioFormat, AzureStandardVoice, ClientEvent, Modality, ServerEvent, SessionConfig,
    SessionInfo, TurnDetection, VoiceConfig, decode_server_event,
};
