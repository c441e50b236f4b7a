pub mod bridge;
pub mod voicelive;

// Re-export commonly used types for convenience
pub use bridge::{
    BridgeError, BridgeResult, ClientConnection, ClientReceiver, ClientSender, Notification,
    SessionOutcome, SessionParams, SessionReport, VoiceSession,
};

pub use voicelive::{
    ConnectionOptions, Credential, UpstreamConnector, UpstreamError, UpstreamEvent,
    UpstreamResult, VoiceLiveConnector,
};
