//! One bridged call.
//!
//! A [`VoiceSession`] connects upstream, applies the session configuration and
//! then runs two relay tasks:
//!
//! ```text
//!  browser ──recv_text──▶ client relay ──append/cancel──▶ Voice Live
//!  browser ◀─send_text─── upstream relay ◀──next_event─── Voice Live
//! ```
//!
//! Whichever relay finishes first decides how the session ends. The other is
//! cancelled through a shared [`CancellationToken`] and awaited before either
//! connection is closed, so no task ever touches a released connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::error::{BridgeError, BridgeResult};
use super::messages::Notification;
use super::state::SessionState;
use super::transport::{ClientConnection, ClientReceiver, ClientSender, send_notification};
use super::translator::{
    ClientAction, UpstreamCommand, build_session_config, parse_client_message,
    translate_client_message, translate_upstream_event,
};
use crate::core::voicelive::{
    ConnectionOptions, Credential, UpstreamConnection, UpstreamConnector, UpstreamEvent,
    UpstreamReceiver, UpstreamSender, UpstreamSettings,
};

/// How long the losing relay gets to notice cancellation before it is aborted.
pub const RELAY_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on the final error notification and on each close handshake.
pub const PEER_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type SharedClientSender = Arc<Mutex<Box<dyn ClientSender>>>;
type SharedUpstreamSender = Arc<Mutex<Box<dyn UpstreamSender>>>;

/// Per-call parameters, fixed for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub endpoint: String,
    pub credential: Credential,
    pub model: String,
    pub voice: String,
    pub instructions: String,
    pub options: ConnectionOptions,
}

impl SessionParams {
    fn upstream_settings(&self) -> UpstreamSettings {
        UpstreamSettings {
            endpoint: self.endpoint.clone(),
            credential: self.credential.clone(),
            model: self.model.clone(),
            options: self.options,
        }
    }
}

/// Why a relay task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// Client sent `stop`
    StopRequested,
    /// Client connection ended
    ClientDisconnected,
    /// Cancelled because the other relay finished first
    Cancelled,
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Client asked to stop
    Stopped,
    /// Client went away
    ClientDisconnected,
    /// Session ended on an error (reported to the client when possible)
    Failed(BridgeError),
}

impl SessionOutcome {
    fn client_gone(&self) -> bool {
        match self {
            SessionOutcome::ClientDisconnected => true,
            SessionOutcome::Failed(err) => err.is_client_side(),
            SessionOutcome::Stopped => false,
        }
    }
}

/// Summary returned once both connections are released.
#[derive(Debug)]
pub struct SessionReport {
    pub id: String,
    pub outcome: SessionOutcome,
    pub session_ready: bool,
    pub upstream_session_id: Option<String>,
}

/// Bridge between one browser connection and one Voice Live conversation.
pub struct VoiceSession {
    id: String,
    params: SessionParams,
}

impl VoiceSession {
    pub fn new(params: SessionParams) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            params,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the call to completion.
    ///
    /// Never fails: every error path is folded into the returned report after
    /// both connections have been released.
    pub async fn run(
        self,
        client: ClientConnection,
        connector: &dyn UpstreamConnector,
    ) -> SessionReport {
        let span = info_span!("voice_session", id = %self.id);
        self.run_inner(client, connector).instrument(span).await
    }

    async fn run_inner(
        self,
        client: ClientConnection,
        connector: &dyn UpstreamConnector,
    ) -> SessionReport {
        let ClientConnection {
            sender: client_sender,
            receiver: client_receiver,
        } = client;
        let client_sender: SharedClientSender = Arc::new(Mutex::new(client_sender));

        let state = Arc::new(SessionState::new());
        let _deactivate = DeactivateOnDrop(state.clone());

        info!(
            model = %self.params.model,
            voice = %self.params.voice,
            "Connecting to Voice Live"
        );

        let UpstreamConnection {
            sender: upstream_sender,
            receiver: upstream_receiver,
        } = match connector.connect(&self.params.upstream_settings()).await {
            Ok(connection) => connection,
            Err(e) => {
                let outcome = SessionOutcome::Failed(BridgeError::UpstreamConnect(e));
                return self.finish(&state, outcome, &client_sender, None).await;
            }
        };
        let upstream_sender: SharedUpstreamSender = Arc::new(Mutex::new(upstream_sender));

        let session_config = build_session_config(&self.params.voice, &self.params.instructions);
        if let Err(e) = upstream_sender
            .lock()
            .await
            .update_session(session_config)
            .await
        {
            let outcome = SessionOutcome::Failed(BridgeError::SessionSetup(e));
            return self
                .finish(&state, outcome, &client_sender, Some(&upstream_sender))
                .await;
        }
        info!("Session configuration sent");

        let cancel = CancellationToken::new();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let mut client_relay = AbortOnDropHandle::new(tokio::spawn(
            relay_client_to_upstream(
                client_receiver,
                upstream_sender.clone(),
                state.clone(),
                cancel.child_token(),
            )
            .in_current_span(),
        ));
        let mut upstream_relay = AbortOnDropHandle::new(tokio::spawn(
            relay_upstream_to_client(
                upstream_receiver,
                client_sender.clone(),
                state.clone(),
                cancel.child_token(),
            )
            .in_current_span(),
        ));

        let finished = tokio::select! {
            result = &mut client_relay => Finished::ClientRelay(flatten_join(result)),
            result = &mut upstream_relay => Finished::UpstreamRelay(flatten_join(result)),
        };

        cancel.cancel();

        let (first, loser, loser_name) = match finished {
            Finished::ClientRelay(result) => (result, upstream_relay, "upstream relay"),
            Finished::UpstreamRelay(result) => (result, client_relay, "client relay"),
        };
        let loser_result = await_cancelled(loser, loser_name).await;
        debug!(relay = loser_name, result = ?loser_result, "Relay stopped");

        let outcome = match first {
            Ok(RelayExit::StopRequested) | Ok(RelayExit::Cancelled) => SessionOutcome::Stopped,
            Ok(RelayExit::ClientDisconnected) => SessionOutcome::ClientDisconnected,
            Err(e) => SessionOutcome::Failed(e),
        };

        self.finish(&state, outcome, &client_sender, Some(&upstream_sender))
            .await
    }

    /// Report, deactivate and release. Runs exactly once per session.
    async fn finish(
        self,
        state: &SessionState,
        outcome: SessionOutcome,
        client: &SharedClientSender,
        upstream: Option<&SharedUpstreamSender>,
    ) -> SessionReport {
        let client_gone = outcome.client_gone();

        if let SessionOutcome::Failed(err) = &outcome {
            error!("Session ended with error: {}", err);

            if !client_gone {
                let notification = Notification::error(err.to_string());
                let report = async {
                    let mut sender = client.lock().await;
                    send_notification(sender.as_mut(), &notification).await
                };
                match tokio::time::timeout(PEER_CLOSE_TIMEOUT, report).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!("Could not report error to client: {}", e),
                    Err(_) => debug!("Timed out reporting error to client"),
                }
            }
        }

        if state.deactivate() {
            debug!("Session deactivated");
        }

        if let Some(upstream) = upstream {
            let close = async { upstream.lock().await.close().await };
            match tokio::time::timeout(PEER_CLOSE_TIMEOUT, close).await {
                Ok(Ok(())) => debug!("Voice Live connection closed"),
                Ok(Err(e)) => debug!("Voice Live close failed: {}", e),
                Err(_) => warn!("Timed out closing Voice Live connection"),
            }
        }

        if !client_gone {
            let close = async { client.lock().await.close().await };
            match tokio::time::timeout(PEER_CLOSE_TIMEOUT, close).await {
                Ok(Ok(())) => debug!("Client connection closed"),
                Ok(Err(e)) => debug!("Client close failed: {}", e),
                Err(_) => debug!("Timed out closing client connection"),
            }
        }

        info!(
            outcome = ?outcome,
            ready = state.is_ready(),
            "Session ended"
        );

        SessionReport {
            id: self.id,
            outcome,
            session_ready: state.is_ready(),
            upstream_session_id: state.upstream_session_id().map(str::to_string),
        }
    }
}

enum Finished {
    ClientRelay(BridgeResult<RelayExit>),
    UpstreamRelay(BridgeResult<RelayExit>),
}

struct DeactivateOnDrop(Arc<SessionState>);

impl Drop for DeactivateOnDrop {
    fn drop(&mut self) {
        if self.0.deactivate() {
            debug!("Session deactivated on drop");
        }
    }
}

fn flatten_join(
    result: Result<BridgeResult<RelayExit>, tokio::task::JoinError>,
) -> BridgeResult<RelayExit> {
    result.unwrap_or_else(|e| Err(BridgeError::Task(e.to_string())))
}

/// Wait for a cancelled relay, aborting it if it ignores the token.
async fn await_cancelled(
    mut relay: AbortOnDropHandle<BridgeResult<RelayExit>>,
    name: &str,
) -> BridgeResult<RelayExit> {
    match tokio::time::timeout(RELAY_SHUTDOWN_GRACE, &mut relay).await {
        Ok(result) => flatten_join(result),
        Err(_) => {
            warn!(relay = name, "Relay did not stop in time, aborting");
            relay.abort();
            flatten_join(relay.await)
        }
    }
}

// =============================================================================
// Relay loops
// =============================================================================

/// Browser -> Voice Live.
async fn relay_client_to_upstream(
    mut client: Box<dyn ClientReceiver>,
    upstream: SharedUpstreamSender,
    state: Arc<SessionState>,
    cancel: CancellationToken,
) -> BridgeResult<RelayExit> {
    loop {
        if !state.is_active() {
            return Ok(RelayExit::Cancelled);
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(RelayExit::Cancelled),
            next = client.recv_text() => next,
        };

        let text = match next {
            None => {
                info!("Client disconnected");
                return Ok(RelayExit::ClientDisconnected);
            }
            Some(Err(e)) => {
                warn!("Client read failed: {}", e);
                return Err(e);
            }
            Some(Ok(text)) => text,
        };

        let message = match parse_client_message(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed client message: {}", e);
                continue;
            }
        };

        match translate_client_message(message) {
            ClientAction::Forward(command) => {
                let mut sender = upstream.lock().await;
                let sent = match command {
                    UpstreamCommand::AppendAudio { audio } => {
                        debug!(len = audio.len(), "Forwarding audio");
                        sender.append_audio(audio).await
                    }
                    UpstreamCommand::CancelResponse => {
                        info!("Client interrupt, cancelling response");
                        sender.cancel_response().await
                    }
                };
                if let Err(e) = sent {
                    warn!("Failed to forward client message: {}", e);
                }
            }
            ClientAction::Stop => {
                info!("Client requested stop");
                return Ok(RelayExit::StopRequested);
            }
            ClientAction::Ignore => {
                debug!("Ignoring client message without upstream command");
            }
        }
    }
}

/// Voice Live -> browser.
async fn relay_upstream_to_client(
    mut upstream: Box<dyn UpstreamReceiver>,
    client: SharedClientSender,
    state: Arc<SessionState>,
    cancel: CancellationToken,
) -> BridgeResult<RelayExit> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(RelayExit::Cancelled),
            next = upstream.next_event() => next,
        };

        let event = match next {
            None => {
                info!("Voice Live stream ended");
                return Err(BridgeError::UpstreamClosed);
            }
            Some(Err(e)) if e.is_recoverable() => {
                warn!("Skipping upstream event: {}", e);
                continue;
            }
            Some(Err(e)) => return Err(BridgeError::Upstream(e)),
            Some(Ok(event)) => event,
        };

        match &event {
            UpstreamEvent::SessionUpdated { session_id } => {
                info!(session_id = %session_id, "Session ready");
                state.mark_ready(session_id);
            }
            UpstreamEvent::Error { message } => error!("Voice Live error: {}", message),
            UpstreamEvent::Unknown { event_type } => {
                debug!(event_type = %event_type, "Dropping unhandled upstream event");
            }
            _ => {}
        }

        let Some(notification) = translate_upstream_event(event) else {
            continue;
        };

        if !state.is_active() {
            return Ok(RelayExit::Cancelled);
        }

        let mut sender = client.lock().await;
        if let Err(e) = send_notification(sender.as_mut(), &notification).await {
            warn!("Failed to send notification to client: {}", e);
        }
    }
}
