//! Voice Live WebSocket client.
//!
//! # API Reference
//!
//! - Endpoint: `wss://<resource>/voice-live/realtime?api-version=<version>&model=<model>`
//! - Auth: `api-key` header on the upgrade request
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! The connection is split in two: [`VoiceLiveSender`] serializes commands,
//! [`VoiceLiveReceiver`] decodes events and keeps the socket alive with
//! pings. Both share the write half behind a mutex so pongs and heartbeats
//! never race a command mid-frame.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::base::{
    UpstreamConnection, UpstreamConnector, UpstreamError, UpstreamEvent, UpstreamReceiver,
    UpstreamResult, UpstreamSender,
};
use super::config::{
    ConnectionOptions, UpstreamSettings, VOICELIVE_API_KEY_HEADER, build_realtime_url,
};
use super::messages::{ClientEvent, SessionConfig, decode_server_event};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<Mutex<SplitSink<WsStream, Message>>>;

// =============================================================================
// Connector
// =============================================================================

/// Opens conversations against the Voice Live WebSocket API.
///
/// There is no automatic reconnection: a dropped conversation ends the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceLiveConnector;

impl VoiceLiveConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UpstreamConnector for VoiceLiveConnector {
    async fn connect(&self, settings: &UpstreamSettings) -> UpstreamResult<UpstreamConnection> {
        if settings.credential.is_empty() {
            return Err(UpstreamError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        let options = settings.options;
        if options.heartbeat_interval.is_zero() {
            return Err(UpstreamError::InvalidConfiguration(
                "heartbeat interval must be greater than zero".to_string(),
            ));
        }

        let url = build_realtime_url(&settings.endpoint, &settings.model)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;
        let api_key = HeaderValue::from_str(settings.credential.expose())
            .map_err(|_| UpstreamError::InvalidConfiguration("malformed API key".to_string()))?;
        request
            .headers_mut()
            .insert(VOICELIVE_API_KEY_HEADER, api_key);

        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(options.max_message_size))
            .max_frame_size(Some(options.max_message_size));

        tracing::debug!(
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            "Connecting to Voice Live"
        );

        let handshake =
            tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false);
        let (ws_stream, _response) = tokio::time::timeout(options.idle_timeout, handshake)
            .await
            .map_err(|_| {
                UpstreamError::Timeout(format!(
                    "handshake did not complete within {}s",
                    options.idle_timeout.as_secs()
                ))
            })?
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

        tracing::info!("Connected to Voice Live API");

        let (sink, stream) = ws_stream.split();
        let sink: WsSink = Arc::new(Mutex::new(sink));

        Ok(UpstreamConnection::new(
            Box::new(VoiceLiveSender::new(sink.clone())),
            Box::new(VoiceLiveReceiver::new(stream, sink, options)),
        ))
    }
}

// =============================================================================
// Sender
// =============================================================================

/// Command half of a Voice Live conversation.
pub struct VoiceLiveSender {
    sink: WsSink,
    closed: bool,
}

impl VoiceLiveSender {
    fn new(sink: WsSink) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    async fn send_event(&mut self, event: ClientEvent) -> UpstreamResult<()> {
        if self.closed {
            return Err(UpstreamError::NotConnected);
        }

        let json = serde_json::to_string(&event)
            .map_err(|e| UpstreamError::SerializationError(e.to_string()))?;

        self.sink
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| UpstreamError::WebSocketError(e.to_string()))
    }
}

#[async_trait]
impl UpstreamSender for VoiceLiveSender {
    async fn update_session(&mut self, session: SessionConfig) -> UpstreamResult<()> {
        self.send_event(ClientEvent::SessionUpdate { session }).await
    }

    async fn append_audio(&mut self, audio: String) -> UpstreamResult<()> {
        self.send_event(ClientEvent::InputAudioBufferAppend { audio })
            .await
    }

    async fn cancel_response(&mut self) -> UpstreamResult<()> {
        self.send_event(ClientEvent::ResponseCancel).await
    }

    async fn close(&mut self) -> UpstreamResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut sink = self.sink.lock().await;
        // Best effort: the peer may already be gone
        if let Err(e) = sink.send(Message::Close(None)).await {
            tracing::debug!("Voice Live close frame not sent: {}", e);
        }
        sink.close()
            .await
            .map_err(|e| UpstreamError::WebSocketError(e.to_string()))
    }
}

// =============================================================================
// Receiver
// =============================================================================

/// Event half of a Voice Live conversation.
pub struct VoiceLiveReceiver {
    stream: SplitStream<WsStream>,
    sink: WsSink,
    heartbeat: Interval,
    liveness: std::time::Duration,
    last_seen: Instant,
}

impl VoiceLiveReceiver {
    fn new(stream: SplitStream<WsStream>, sink: WsSink, options: ConnectionOptions) -> Self {
        let start = Instant::now();
        let mut heartbeat = tokio::time::interval_at(
            start + options.heartbeat_interval,
            options.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            stream,
            sink,
            heartbeat,
            liveness: options.liveness_window(),
            last_seen: start,
        }
    }

    async fn send_control(&self, message: Message) -> UpstreamResult<()> {
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| UpstreamError::WebSocketError(e.to_string()))
    }
}

#[async_trait]
impl UpstreamReceiver for VoiceLiveReceiver {
    async fn next_event(&mut self) -> Option<UpstreamResult<UpstreamEvent>> {
        loop {
            let deadline = self.last_seen + self.liveness;

            tokio::select! {
                frame = self.stream.next() => {
                    self.last_seen = Instant::now();

                    match frame {
                        None => return None,
                        Some(Ok(Message::Text(text))) => {
                            return Some(decode_server_event(text.as_str()));
                        }
                        Some(Ok(Message::Binary(data))) => {
                            return Some(Err(UpstreamError::ProtocolError(format!(
                                "unexpected binary frame ({} bytes)",
                                data.len()
                            ))));
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if let Err(e) = self.send_control(Message::Pong(payload)).await {
                                return Some(Err(e));
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Voice Live closed the connection");
                            return None;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Some(Err(UpstreamError::WebSocketError(e.to_string())));
                        }
                    }
                }

                _ = self.heartbeat.tick() => {
                    if let Err(e) = self.send_control(Message::Ping(Bytes::new())).await {
                        return Some(Err(e));
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    return Some(Err(UpstreamError::Timeout(format!(
                        "no frame from Voice Live for {}s",
                        self.liveness.as_secs()
                    ))));
                }
            }
        }
    }
}
