//! Voice WebSocket handler
//!
//! Upgrades `/ws` and hands the socket to a [`VoiceSession`]. The axum socket
//! halves are adapted to the bridge's transport traits here, so the session
//! itself never sees axum types.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::core::bridge::{
    BridgeError, BridgeResult, ClientConnection, ClientReceiver, ClientSender, Notification,
    VoiceSession,
};
use crate::core::voicelive::MAX_MESSAGE_SIZE;
use crate::state::{AppState, SessionOverrides};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = MAX_MESSAGE_SIZE;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = MAX_MESSAGE_SIZE;

/// Voice WebSocket handler
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state containing configuration and the upstream connector
/// * `overrides` - Optional `voice`, `instructions` and `model` query parameters
pub async fn voice_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(overrides): Query<SessionOverrides>,
) -> Response {
    debug!("Voice WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_voice_socket(socket, state, overrides))
}

async fn handle_voice_socket(socket: WebSocket, state: Arc<AppState>, overrides: SessionOverrides) {
    info!("Voice WebSocket connection established");

    let (sink, stream) = socket.split();
    let mut sender = AxumClientSender { sink };

    let params = match state.session_params(&overrides) {
        Ok(params) => params,
        Err(e) => {
            warn!("Rejecting voice connection: {}", e);
            if let Ok(json) = Notification::error(e.to_string()).to_json() {
                let _ = sender.send_text(json).await;
            }
            let _ = sender.close().await;
            return;
        }
    };

    let client = ClientConnection::new(
        Box::new(sender),
        Box::new(AxumClientReceiver { stream }),
    );

    let session = VoiceSession::new(params);
    let report = session.run(client, state.connector.as_ref()).await;

    info!(
        session = %report.id,
        upstream_session = ?report.upstream_session_id,
        ready = report.session_ready,
        "Voice WebSocket connection closed"
    );
}

// =============================================================================
// Transport adapters
// =============================================================================

struct AxumClientReceiver {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl ClientReceiver for AxumClientReceiver {
    async fn recv_text(&mut self) -> Option<BridgeResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                // Some clients send JSON in binary frames
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => {
                        warn!("Ignoring non UTF-8 binary frame: {}", e);
                        continue;
                    }
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(e) => return Some(Err(BridgeError::Client(e.to_string()))),
            }
        }
    }
}

struct AxumClientSender {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ClientSender for AxumClientSender {
    async fn send_text(&mut self, text: String) -> BridgeResult<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| BridgeError::Client(e.to_string()))
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| BridgeError::Client(e.to_string()))
    }
}
