//! Voice WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::voice_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the voice WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade bridged to Voice Live. Optional query
/// parameters `voice`, `instructions` and `model` override the configured
/// defaults for this session.
///
/// # Protocol
///
/// Client sends:
/// - `{"type":"audio","audio":"<base64 PCM16 24kHz mono>"}`
/// - `{"type":"interrupt"}`
/// - `{"type":"stop"}`
///
/// Server responds with:
/// - `session_ready` once Voice Live accepted the session
/// - `speech_started` / `speech_stopped` from server VAD
/// - `response_started`, `audio`, `response_audio_done`, `response_done`
/// - `error` on failures
pub fn create_voice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(voice_handler))
        .layer(TraceLayer::new_for_http())
}
