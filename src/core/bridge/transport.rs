//! Downstream (browser) connection seam.
//!
//! The bridge never touches axum types directly; the WebSocket handler adapts
//! its socket halves to these traits and tests use in-memory channels.

use async_trait::async_trait;

use super::error::{BridgeError, BridgeResult};
use super::messages::Notification;

/// Read half of the browser connection.
#[async_trait]
pub trait ClientReceiver: Send {
    /// Next text message. `None` means the client disconnected.
    async fn recv_text(&mut self) -> Option<BridgeResult<String>>;
}

/// Write half of the browser connection.
#[async_trait]
pub trait ClientSender: Send {
    async fn send_text(&mut self, text: String) -> BridgeResult<()>;

    async fn close(&mut self) -> BridgeResult<()>;
}

/// Serialize and send one notification.
pub async fn send_notification(
    sender: &mut dyn ClientSender,
    notification: &Notification,
) -> BridgeResult<()> {
    let json = notification
        .to_json()
        .map_err(|e| BridgeError::Client(format!("failed to serialize notification: {e}")))?;
    sender.send_text(json).await
}

/// Both halves of an accepted browser connection.
pub struct ClientConnection {
    pub sender: Box<dyn ClientSender>,
    pub receiver: Box<dyn ClientReceiver>,
}

impl ClientConnection {
    pub fn new(sender: Box<dyn ClientSender>, receiver: Box<dyn ClientReceiver>) -> Self {
        Self { sender, receiver }
    }
}
