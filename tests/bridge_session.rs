//! Session Bridge Tests
//!
//! Drives a `VoiceSession` against in-memory peers: the browser side is a pair
//! of channels, the upstream side a fake connector whose events are pushed by
//! the test and whose commands are recorded.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use voicelive_bridge::core::bridge::{
    BridgeError, BridgeResult, ClientConnection, ClientReceiver, ClientSender,
    RELAY_SHUTDOWN_GRACE, SessionOutcome, SessionParams, SessionReport, VoiceSession,
};
use voicelive_bridge::core::voicelive::{
    AzureStandardVoice, ConnectionOptions, Credential, SessionConfig, UpstreamConnection,
    UpstreamConnector, UpstreamError, UpstreamEvent, UpstreamReceiver, UpstreamResult,
    UpstreamSender, UpstreamSettings, VoiceConfig,
};

const STEP: Duration = Duration::from_secs(2);

// =============================================================================
// Browser side
// =============================================================================

struct ChannelClientReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl ClientReceiver for ChannelClientReceiver {
    async fn recv_text(&mut self) -> Option<BridgeResult<String>> {
        self.rx.recv().await.map(Ok)
    }
}

struct ChannelClientSender {
    tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    sent_after_close: Arc<AtomicUsize>,
    fail_next_send: Arc<AtomicBool>,
}

#[async_trait]
impl ClientSender for ChannelClientSender {
    async fn send_text(&mut self, text: String) -> BridgeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            self.sent_after_close.fetch_add(1, Ordering::SeqCst);
            return Err(BridgeError::Client("connection closed".to_string()));
        }
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::Client("send buffer full".to_string()));
        }
        self.tx
            .send(text)
            .map_err(|_| BridgeError::Client("browser gone".to_string()))
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Browser {
    inbox: Option<mpsc::UnboundedSender<String>>,
    outbox: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
    sent_after_close: Arc<AtomicUsize>,
    fail_next_send: Arc<AtomicBool>,
}

impl Browser {
    fn send(&self, message: Value) {
        self.send_raw(message.to_string());
    }

    fn send_raw(&self, text: impl Into<String>) {
        if let Some(inbox) = &self.inbox {
            inbox.send(text.into()).unwrap();
        }
    }

    fn disconnect(&mut self) {
        self.inbox = None;
    }

    /// Make the bridge's next send towards this browser fail.
    fn fail_next_delivery(&self) {
        self.fail_next_send.store(true, Ordering::SeqCst);
    }

    async fn next(&mut self) -> Value {
        let text = timeout(STEP, self.outbox.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("bridge dropped the browser sender");
        serde_json::from_str(&text).unwrap()
    }
}

fn browser() -> (ClientConnection, Browser) {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let sent_after_close = Arc::new(AtomicUsize::new(0));
    let fail_next_send = Arc::new(AtomicBool::new(false));

    let connection = ClientConnection::new(
        Box::new(ChannelClientSender {
            tx: outbox_tx,
            closed: closed.clone(),
            sent_after_close: sent_after_close.clone(),
            fail_next_send: fail_next_send.clone(),
        }),
        Box::new(ChannelClientReceiver { rx: inbox_rx }),
    );

    (
        connection,
        Browser {
            inbox: Some(inbox_tx),
            outbox: outbox_rx,
            closed,
            sent_after_close,
            fail_next_send,
        },
    )
}

// =============================================================================
// Upstream side
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Command {
    UpdateSession(SessionConfig),
    AppendAudio(String),
    CancelResponse,
    Close,
}

struct FakeUpstreamSender {
    commands: mpsc::UnboundedSender<Command>,
    reject_session: bool,
    fail_next_send: Arc<AtomicBool>,
    stall_audio: Arc<AtomicBool>,
}

#[async_trait]
impl UpstreamSender for FakeUpstreamSender {
    async fn update_session(&mut self, session: SessionConfig) -> UpstreamResult<()> {
        if self.reject_session {
            return Err(UpstreamError::WebSocketError("session rejected".to_string()));
        }
        let _ = self.commands.send(Command::UpdateSession(session));
        Ok(())
    }

    async fn append_audio(&mut self, audio: String) -> UpstreamResult<()> {
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(UpstreamError::WebSocketError("write failed".to_string()));
        }
        let _ = self.commands.send(Command::AppendAudio(audio));
        if self.stall_audio.load(Ordering::SeqCst) {
            // A write that never completes and ignores cancellation
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn cancel_response(&mut self) -> UpstreamResult<()> {
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(UpstreamError::WebSocketError("write failed".to_string()));
        }
        let _ = self.commands.send(Command::CancelResponse);
        Ok(())
    }

    async fn close(&mut self) -> UpstreamResult<()> {
        let _ = self.commands.send(Command::Close);
        Ok(())
    }
}

struct FakeUpstreamReceiver {
    events: mpsc::UnboundedReceiver<UpstreamResult<UpstreamEvent>>,
}

#[async_trait]
impl UpstreamReceiver for FakeUpstreamReceiver {
    async fn next_event(&mut self) -> Option<UpstreamResult<UpstreamEvent>> {
        self.events.recv().await
    }
}

struct FakeConnector {
    connection: Mutex<Option<UpstreamConnection>>,
    seen_model: Mutex<Option<String>>,
}

#[async_trait]
impl UpstreamConnector for FakeConnector {
    async fn connect(&self, settings: &UpstreamSettings) -> UpstreamResult<UpstreamConnection> {
        *self.seen_model.lock().unwrap() = Some(settings.model.clone());
        self.connection
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| UpstreamError::ConnectionFailed("connection refused".to_string()))
    }
}

struct Upstream {
    events: Option<mpsc::UnboundedSender<UpstreamResult<UpstreamEvent>>>,
    commands: mpsc::UnboundedReceiver<Command>,
    fail_next_send: Arc<AtomicBool>,
    stall_audio: Arc<AtomicBool>,
}

impl Upstream {
    fn emit(&self, event: UpstreamEvent) {
        self.emit_result(Ok(event));
    }

    fn emit_result(&self, result: UpstreamResult<UpstreamEvent>) {
        if let Some(events) = &self.events {
            events.send(result).unwrap();
        }
    }

    fn hang_up(&mut self) {
        self.events = None;
    }

    /// Make the next audio append or response cancel fail.
    fn fail_next_write(&self) {
        self.fail_next_send.store(true, Ordering::SeqCst);
    }

    /// Make every audio append hang after being recorded.
    fn stall_audio_writes(&self) {
        self.stall_audio.store(true, Ordering::SeqCst);
    }

    async fn next_command(&mut self) -> Command {
        timeout(STEP, self.commands.recv())
            .await
            .expect("timed out waiting for upstream command")
            .expect("bridge dropped the upstream sender")
    }

    /// Commands already recorded, without waiting.
    fn drain(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            commands.push(command);
        }
        commands
    }
}

fn upstream(reject_session: bool) -> (Arc<FakeConnector>, Upstream) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let fail_next_send = Arc::new(AtomicBool::new(false));
    let stall_audio = Arc::new(AtomicBool::new(false));

    let connection = UpstreamConnection::new(
        Box::new(FakeUpstreamSender {
            commands: commands_tx,
            reject_session,
            fail_next_send: fail_next_send.clone(),
            stall_audio: stall_audio.clone(),
        }),
        Box::new(FakeUpstreamReceiver { events: events_rx }),
    );

    (
        Arc::new(FakeConnector {
            connection: Mutex::new(Some(connection)),
            seen_model: Mutex::new(None),
        }),
        Upstream {
            events: Some(events_tx),
            commands: commands_rx,
            fail_next_send,
            stall_audio,
        },
    )
}

fn unreachable_upstream() -> Arc<FakeConnector> {
    Arc::new(FakeConnector {
        connection: Mutex::new(None),
        seen_model: Mutex::new(None),
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn params(voice: &str) -> SessionParams {
    SessionParams {
        endpoint: "https://example.services.ai.azure.com".to_string(),
        credential: Credential::api_key("test-key"),
        model: "gpt-4o-realtime-preview".to_string(),
        voice: voice.to_string(),
        instructions: "Be brief.".to_string(),
        options: ConnectionOptions::default(),
    }
}

fn spawn_session(
    voice: &str,
    client: ClientConnection,
    connector: Arc<FakeConnector>,
) -> JoinHandle<SessionReport> {
    let session = VoiceSession::new(params(voice));
    tokio::spawn(async move { session.run(client, connector.as_ref()).await })
}

async fn finished(handle: JoinHandle<SessionReport>) -> SessionReport {
    timeout(STEP, handle)
        .await
        .expect("session did not finish")
        .expect("session task panicked")
}

/// Start a session and consume the initial `session.update`.
async fn started(voice: &str) -> (JoinHandle<SessionReport>, Browser, Upstream) {
    let (client, browser) = browser();
    let (connector, mut upstream) = upstream(false);
    let handle = spawn_session(voice, client, connector);

    match upstream.next_command().await {
        Command::UpdateSession(_) => {}
        other => panic!("expected session.update first, got {other:?}"),
    }

    (handle, browser, upstream)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_session_configuration_sent_before_relay() {
    let (client, _browser) = browser();
    let (connector, mut upstream) = upstream(false);
    let handle = spawn_session("en-US-AvaNeural", client, connector.clone());

    let Command::UpdateSession(config) = upstream.next_command().await else {
        panic!("expected session.update");
    };
    assert_eq!(
        config.voice,
        VoiceConfig::AzureStandard(AzureStandardVoice::new("en-US-AvaNeural"))
    );
    assert_eq!(config.instructions.as_deref(), Some("Be brief."));
    assert_eq!(
        connector.seen_model.lock().unwrap().as_deref(),
        Some("gpt-4o-realtime-preview")
    );

    handle.abort();
}

#[tokio::test]
async fn test_session_ready_notification() {
    let (handle, mut browser, upstream) = started("alloy").await;

    upstream.emit(UpstreamEvent::SessionUpdated {
        session_id: "sess-42".to_string(),
    });
    assert_eq!(
        browser.next().await,
        json!({"type": "session_ready", "session_id": "sess-42"})
    );

    browser.send(json!({"type": "stop"}));
    let report = finished(handle).await;

    assert!(report.session_ready);
    assert_eq!(report.upstream_session_id.as_deref(), Some("sess-42"));
}

#[tokio::test]
async fn test_audio_forwarded_unchanged() {
    let (handle, browser, mut upstream) = started("alloy").await;

    let payload = BASE64_STANDARD.encode(vec![0x5au8; 1024]);
    browser.send(json!({"type": "audio", "audio": payload}));

    assert_eq!(
        upstream.next_command().await,
        Command::AppendAudio(payload.clone())
    );

    browser.send(json!({"type": "stop"}));
    finished(handle).await;
    assert_eq!(upstream.drain(), vec![Command::Close]);
}

#[tokio::test]
async fn test_interrupt_cancels_response() {
    let (handle, browser, mut upstream) = started("alloy").await;

    browser.send(json!({"type": "interrupt"}));
    assert_eq!(upstream.next_command().await, Command::CancelResponse);

    browser.send(json!({"type": "stop"}));
    finished(handle).await;
}

#[tokio::test]
async fn test_unknown_and_malformed_client_messages_are_ignored() {
    let (handle, browser, mut upstream) = started("alloy").await;

    browser.send(json!({"type": "dance"}));
    browser.send_raw("{not json");
    browser.send(json!({"type": "audio"}));
    browser.send(json!({"type": "audio", "audio": "AAEC"}));

    // Nothing was issued for the first three, and the relay kept going
    assert_eq!(
        upstream.next_command().await,
        Command::AppendAudio("AAEC".to_string())
    );

    browser.send(json!({"type": "stop"}));
    let report = finished(handle).await;
    assert!(matches!(report.outcome, SessionOutcome::Stopped));
}

#[tokio::test]
async fn test_stop_ends_relay_despite_pending_messages() {
    let (client, browser) = browser();
    let (connector, mut upstream) = upstream(false);

    // Everything is queued before the session even starts
    browser.send(json!({"type": "audio", "audio": "Zmlyc3Q="}));
    browser.send(json!({"type": "stop"}));
    browser.send(json!({"type": "audio", "audio": "bGF0ZQ=="}));

    let report = finished(spawn_session("alloy", client, connector)).await;
    assert!(matches!(report.outcome, SessionOutcome::Stopped));

    let commands = upstream.drain();
    assert!(matches!(commands[0], Command::UpdateSession(_)));
    assert_eq!(
        &commands[1..],
        &[Command::AppendAudio("Zmlyc3Q=".to_string()), Command::Close]
    );
    assert!(browser.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_upstream_events_are_translated() {
    let (handle, mut browser, upstream) = started("alloy").await;

    let pcm: Vec<u8> = (0..=255u8).collect();
    upstream.emit(UpstreamEvent::SpeechStarted);
    upstream.emit(UpstreamEvent::SpeechStopped);
    upstream.emit(UpstreamEvent::ResponseCreated);
    upstream.emit(UpstreamEvent::AudioDelta(Bytes::from(pcm.clone())));
    upstream.emit(UpstreamEvent::AudioDone);
    upstream.emit(UpstreamEvent::ResponseDone);

    assert_eq!(browser.next().await, json!({"type": "speech_started"}));
    assert_eq!(browser.next().await, json!({"type": "speech_stopped"}));
    assert_eq!(browser.next().await, json!({"type": "response_started"}));
    assert_eq!(
        browser.next().await,
        json!({"type": "audio", "audio": BASE64_STANDARD.encode(&pcm)})
    );
    assert_eq!(browser.next().await, json!({"type": "response_audio_done"}));
    assert_eq!(browser.next().await, json!({"type": "response_done"}));

    browser.send(json!({"type": "stop"}));
    finished(handle).await;
}

#[tokio::test]
async fn test_unknown_upstream_events_are_dropped() {
    let (handle, mut browser, upstream) = started("alloy").await;

    upstream.emit(UpstreamEvent::Unknown {
        event_type: "response.audio_transcript.delta".to_string(),
    });
    upstream.emit_result(Err(UpstreamError::ProtocolError(
        "invalid audio delta".to_string(),
    )));
    upstream.emit(UpstreamEvent::SpeechStarted);

    // The first notification the browser sees is the known event
    assert_eq!(browser.next().await, json!({"type": "speech_started"}));

    browser.send(json!({"type": "stop"}));
    finished(handle).await;
}

#[tokio::test]
async fn test_upstream_error_event_keeps_session_active() {
    let (handle, mut browser, mut upstream) = started("alloy").await;

    upstream.emit(UpstreamEvent::Error {
        message: "rate limited".to_string(),
    });
    assert_eq!(
        browser.next().await,
        json!({"type": "error", "message": "rate limited"})
    );

    // Still relaying in both directions
    browser.send(json!({"type": "audio", "audio": "AAEC"}));
    assert_eq!(
        upstream.next_command().await,
        Command::AppendAudio("AAEC".to_string())
    );
    upstream.emit(UpstreamEvent::ResponseDone);
    assert_eq!(browser.next().await, json!({"type": "response_done"}));
    assert!(!handle.is_finished());

    browser.send(json!({"type": "stop"}));
    finished(handle).await;
}

#[tokio::test]
async fn test_client_disconnect_closes_upstream() {
    let (handle, mut browser, mut upstream) = started("alloy").await;

    browser.disconnect();

    assert_eq!(upstream.next_command().await, Command::Close);
    let report = finished(handle).await;

    assert!(matches!(report.outcome, SessionOutcome::ClientDisconnected));
    // No error report and no close frame towards a browser that is gone
    assert!(!browser.closed.load(Ordering::SeqCst));
    assert!(browser.outbox.try_recv().is_err());
}

#[tokio::test]
async fn test_upstream_hangup_reported_to_client() {
    let (handle, mut browser, mut upstream) = started("alloy").await;

    upstream.hang_up();

    assert_eq!(
        browser.next().await,
        json!({"type": "error", "message": "upstream connection closed"})
    );
    let report = finished(handle).await;

    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(BridgeError::UpstreamClosed)
    ));
    assert!(browser.closed.load(Ordering::SeqCst));
    assert_eq!(upstream.drain(), vec![Command::Close]);
    assert_eq!(browser.sent_after_close.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fatal_upstream_error_ends_session() {
    let (handle, mut browser, upstream) = started("alloy").await;

    upstream.emit_result(Err(UpstreamError::WebSocketError(
        "connection reset".to_string(),
    )));

    assert_eq!(
        browser.next().await,
        json!({"type": "error", "message": "WebSocket error: connection reset"})
    );
    let report = finished(handle).await;
    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(BridgeError::Upstream(UpstreamError::WebSocketError(_)))
    ));
    assert!(!report.session_ready);
}

#[tokio::test]
async fn test_connect_failure_reported_and_closed() {
    let (client, mut browser) = browser();
    let report = finished(spawn_session("alloy", client, unreachable_upstream())).await;

    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(BridgeError::UpstreamConnect(_))
    ));
    let notification = browser.next().await;
    assert_eq!(notification["type"], "error");
    assert!(
        notification["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to connect to Voice Live")
    );
    assert!(browser.closed.load(Ordering::SeqCst));
    assert!(!report.session_ready);
}

#[tokio::test]
async fn test_session_setup_failure_releases_upstream() {
    let (client, mut browser) = browser();
    let (connector, mut upstream) = upstream(true);

    let report = finished(spawn_session("alloy", client, connector)).await;

    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(BridgeError::SessionSetup(_))
    ));
    assert_eq!(browser.next().await["type"], "error");
    assert_eq!(upstream.drain(), vec![Command::Close]);
}

#[tokio::test]
async fn test_failed_upstream_write_does_not_end_session() {
    let (handle, mut browser, mut upstream) = started("alloy").await;

    upstream.fail_next_write();
    browser.send(json!({"type": "audio", "audio": "bG9zdA=="}));
    browser.send(json!({"type": "audio", "audio": "AAEC"}));

    // The failed chunk is dropped, the next one still goes through
    assert_eq!(
        upstream.next_command().await,
        Command::AppendAudio("AAEC".to_string())
    );

    upstream.fail_next_write();
    browser.send(json!({"type": "interrupt"}));
    browser.send(json!({"type": "interrupt"}));
    assert_eq!(upstream.next_command().await, Command::CancelResponse);

    upstream.emit(UpstreamEvent::ResponseDone);
    assert_eq!(browser.next().await, json!({"type": "response_done"}));
    assert!(!handle.is_finished());

    browser.send(json!({"type": "stop"}));
    let report = finished(handle).await;
    assert!(matches!(report.outcome, SessionOutcome::Stopped));
}

#[tokio::test]
async fn test_failed_client_delivery_does_not_end_session() {
    let (handle, mut browser, mut upstream) = started("alloy").await;

    browser.fail_next_delivery();
    upstream.emit(UpstreamEvent::SpeechStarted);
    upstream.emit(UpstreamEvent::SpeechStopped);

    // The undeliverable notification is skipped
    assert_eq!(browser.next().await, json!({"type": "speech_stopped"}));

    browser.send(json!({"type": "audio", "audio": "AAEC"}));
    assert_eq!(
        upstream.next_command().await,
        Command::AppendAudio("AAEC".to_string())
    );
    assert!(!handle.is_finished());

    browser.send(json!({"type": "stop"}));
    let report = finished(handle).await;
    assert!(matches!(report.outcome, SessionOutcome::Stopped));
    assert!(browser.closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_stuck_relay_is_aborted_after_grace() {
    let (handle, mut browser, mut upstream) = started("alloy").await;

    upstream.stall_audio_writes();
    browser.send(json!({"type": "audio", "audio": "AAEC"}));
    assert_eq!(
        upstream.next_command().await,
        Command::AppendAudio("AAEC".to_string())
    );

    // The client relay is now blocked inside the write and ignores cancellation
    upstream.hang_up();

    let report = timeout(RELAY_SHUTDOWN_GRACE + STEP, handle)
        .await
        .expect("session did not finish after the grace period")
        .expect("session task panicked");

    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(BridgeError::UpstreamClosed)
    ));
    assert_eq!(
        browser.next().await,
        json!({"type": "error", "message": "upstream connection closed"})
    );
    assert_eq!(upstream.drain(), vec![Command::Close]);
    assert!(browser.closed.load(Ordering::SeqCst));
}
