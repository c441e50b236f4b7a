//! Voice Live connection configuration.
//!
//! This module contains everything needed to open the upstream socket:
//! - Endpoint URL construction
//! - Credential handling
//! - Transport limits (message size, heartbeat, idle timeout)

use std::fmt;
use std::time::Duration;

use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::base::{UpstreamError, UpstreamResult};

/// Realtime path appended when the configured endpoint carries no path.
pub const VOICELIVE_REALTIME_PATH: &str = "/voice-live/realtime";

/// API version sent when the endpoint does not pin one itself.
pub const VOICELIVE_API_VERSION: &str = "2025-10-01";

/// Header carrying the API key during the WebSocket handshake.
pub const VOICELIVE_API_KEY_HEADER: &str = "api-key";

/// Audio sample rate expected on both directions (PCM16 mono).
pub const VOICELIVE_SAMPLE_RATE: u32 = 24000;

/// Largest message accepted from the upstream socket (10 MB), sized for audio frames.
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Interval between WebSocket pings sent to the upstream service.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Silence tolerated after a missed heartbeat before the connection is declared dead.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(20);

// =============================================================================
// Credential
// =============================================================================

/// API key for the upstream service.
///
/// The key is wiped from memory when dropped and never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    /// Wrap an API key.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the raw key for the handshake header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is blank.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

// =============================================================================
// Transport options
// =============================================================================

/// Transport limits applied to the upstream WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Maximum size of a single message or frame
    pub max_message_size: usize,
    /// Ping interval
    pub heartbeat_interval: Duration,
    /// Extra silence tolerated on top of the heartbeat interval,
    /// also used as the handshake deadline
    pub idle_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            idle_timeout: IDLE_TIMEOUT,
        }
    }
}

impl ConnectionOptions {
    /// Longest gap between two received frames before the peer is considered gone.
    pub fn liveness_window(&self) -> Duration {
        self.heartbeat_interval + self.idle_timeout
    }
}

/// Everything needed to open one upstream conversation.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Service endpoint (host, `https://` or `wss://` URL)
    pub endpoint: String,
    /// API key
    pub credential: Credential,
    /// Model identifier
    pub model: String,
    /// Transport limits
    pub options: ConnectionOptions,
}

// =============================================================================
// URL construction
// =============================================================================

/// Build the realtime WebSocket URL for an endpoint and model.
///
/// - `https://` becomes `wss://` and `http://` becomes `ws://`
/// - a bare host is treated as `wss://host`
/// - an empty path is replaced by [`VOICELIVE_REALTIME_PATH`]
/// - `api-version` is kept if the endpoint pins one, otherwise
///   [`VOICELIVE_API_VERSION`] is used; `model` always reflects the argument
pub fn build_realtime_url(endpoint: &str, model: &str) -> UpstreamResult<Url> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(UpstreamError::InvalidConfiguration(
            "endpoint is empty".to_string(),
        ));
    }
    if model.trim().is_empty() {
        return Err(UpstreamError::InvalidConfiguration(
            "model is empty".to_string(),
        ));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("wss://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| {
        UpstreamError::InvalidConfiguration(format!("invalid endpoint '{trimmed}': {e}"))
    })?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(UpstreamError::InvalidConfiguration(format!(
                "unsupported endpoint scheme '{other}'"
            )));
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        UpstreamError::InvalidConfiguration(format!("cannot use scheme '{scheme}'"))
    })?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(VOICELIVE_REALTIME_PATH);
    }

    let mut api_version = None;
    let mut extra = Vec::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "api-version" => api_version = Some(value.into_owned()),
            "model" => {}
            _ => extra.push((key.into_owned(), value.into_owned())),
        }
    }

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in &extra {
            query.append_pair(key, value);
        }
        query.append_pair(
            "api-version",
            api_version.as_deref().unwrap_or(VOICELIVE_API_VERSION),
        );
        query.append_pair("model", model.trim());
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_endpoint_becomes_wss_with_default_path() {
        let url = build_realtime_url(
            "https://my-resource.services.ai.azure.com/",
            "gpt-4o-realtime-preview",
        )
        .unwrap();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("my-resource.services.ai.azure.com"));
        assert_eq!(url.path(), VOICELIVE_REALTIME_PATH);
        assert_eq!(
            url.query(),
            Some("api-version=2025-10-01&model=gpt-4o-realtime-preview")
        );
    }

    #[test]
    fn test_bare_host_defaults_to_wss() {
        let url = build_realtime_url("example.cognitiveservices.azure.com", "gpt-4o").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), VOICELIVE_REALTIME_PATH);
    }

    #[test]
    fn test_plain_http_becomes_ws_and_keeps_path() {
        let url = build_realtime_url("http://127.0.0.1:9000/custom", "m").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(9000));
        assert_eq!(url.path(), "/custom");
    }

    #[test]
    fn test_pinned_api_version_is_kept_and_model_replaced() {
        let url = build_realtime_url(
            "wss://host/voice-live/realtime?api-version=2024-02-15&model=old&foo=bar",
            "new-model",
        )
        .unwrap();
        assert_eq!(
            url.query(),
            Some("foo=bar&api-version=2024-02-15&model=new-model")
        );
    }

    #[test]
    fn test_invalid_endpoints_rejected() {
        assert!(matches!(
            build_realtime_url("", "m"),
            Err(UpstreamError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            build_realtime_url("ftp://host", "m"),
            Err(UpstreamError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            build_realtime_url("wss://host", "  "),
            Err(UpstreamError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::api_key("super-secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret"));
        assert_eq!(credential.expose(), "super-secret");
    }

    #[test]
    fn test_default_connection_options() {
        let options = ConnectionOptions::default();
        assert_eq!(options.max_message_size, 10 * 1024 * 1024);
        assert_eq!(options.heartbeat_interval, Duration::from_secs(20));
        assert_eq!(options.idle_timeout, Duration::from_secs(20));
        assert_eq!(options.liveness_window(), Duration::from_secs(40));
    }
}
