//! Session bridge between a browser audio client and Voice Live.
//!
//! - [`messages`]: the browser's JSON vocabulary
//! - [`translator`]: pure mapping between the two vocabularies
//! - [`session`]: connection lifecycle and the two relay loops
//! - [`transport`]: the browser connection seam

mod error;
mod messages;
mod session;
mod state;
mod transport;
mod translator;

pub use error::{BridgeError, BridgeResult};
pub use messages::{ClientMessage, Notification};
pub use session::{
    PEER_CLOSE_TIMEOUT, RELAY_SHUTDOWN_GRACE, RelayExit, SessionOutcome, SessionParams,
    SessionReport, VoiceSession,
};
pub use state::SessionState;
pub use transport::{ClientConnection, ClientReceiver, ClientSender, send_notification};
pub use translator::{
    ClientAction, UpstreamCommand, VAD_PREFIX_PADDING_MS, VAD_SILENCE_DURATION_MS, VAD_THRESHOLD,
    build_session_config, parse_client_message, translate_client_message,
    translate_upstream_event, voice_config_for,
};
