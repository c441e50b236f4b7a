//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and the reference browser client
//! - `voice` - Voice WebSocket bridged to Voice Live

pub mod api;
pub mod voice;

pub use voice::voice_handler;
