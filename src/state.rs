use std::sync::Arc;

use serde::Deserialize;

use crate::config::{ConfigError, ServerConfig};
use crate::core::bridge::SessionParams;
use crate::core::voicelive::{ConnectionOptions, UpstreamConnector, VoiceLiveConnector};

/// Maximum allowed size for per-session instructions (100 KB)
pub const MAX_INSTRUCTIONS_SIZE: usize = 100 * 1024;

/// Optional per-session overrides taken from the `/ws` query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionOverrides {
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub model: Option<String>,
}

/// Reasons a connection is refused before a session starts.
#[derive(Debug, thiserror::Error)]
pub enum SessionRejection {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Instructions too large: {size} bytes (max {max} bytes)")]
    InstructionsTooLarge { size: usize, max: usize },
}

/// Application state shared by all handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub connector: Arc<dyn UpstreamConnector>,
}

impl AppState {
    /// State backed by the real Voice Live connector.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Self::with_connector(config, Arc::new(VoiceLiveConnector::new()))
    }

    pub fn with_connector(
        config: ServerConfig,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Arc<Self> {
        Arc::new(Self { config, connector })
    }

    /// Resolve the parameters for a new session.
    ///
    /// Blank overrides fall back to the configured defaults.
    pub fn session_params(
        &self,
        overrides: &SessionOverrides,
    ) -> Result<SessionParams, SessionRejection> {
        let (endpoint, credential) = self.config.require_upstream()?;

        fn pick(value: &Option<String>, default: &str) -> String {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        }

        let instructions = pick(&overrides.instructions, &self.config.voicelive_instructions);
        if instructions.len() > MAX_INSTRUCTIONS_SIZE {
            return Err(SessionRejection::InstructionsTooLarge {
                size: instructions.len(),
                max: MAX_INSTRUCTIONS_SIZE,
            });
        }

        Ok(SessionParams {
            endpoint,
            credential,
            model: pick(&overrides.model, &self.config.voicelive_model),
            voice: pick(&overrides.voice, &self.config.voicelive_voice),
            instructions,
            options: ConnectionOptions::default(),
        })
    }
}
