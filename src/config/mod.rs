//! Configuration module for the Voice Live bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voicelive_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::core::voicelive::Credential;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Model used when `VOICELIVE_MODEL` is not set
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Voice used when `VOICELIVE_VOICE` is not set
pub const DEFAULT_VOICE: &str = "alloy";

/// Instructions used when `VOICELIVE_INSTRUCTIONS` is not set
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant. Respond naturally and conversationally. Keep your responses concise but engaging.";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("Invalid TLS configuration: {0}")]
    Tls(String),

    #[error("Server not configured. Missing Azure credentials.")]
    MissingCredentials,
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the bridge:
/// - Server settings (host, port, TLS)
/// - Voice Live endpoint and API key
/// - Per-session defaults (model, voice, instructions)
/// - Security settings (CORS)
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Voice Live settings
    pub voicelive_endpoint: Option<String>,
    pub voicelive_api_key: Option<String>,
    pub voicelive_model: String,
    pub voicelive_voice: String,
    pub voicelive_instructions: String,

    /// Comma-separated list of allowed CORS origins, `*` for any.
    /// `None` keeps the server same-origin only.
    pub cors_allowed_origins: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("voicelive_endpoint", &self.voicelive_endpoint)
            .field(
                "voicelive_api_key",
                &self.voicelive_api_key.as_ref().map(|_| "***"),
            )
            .field("voicelive_model", &self.voicelive_model)
            .field("voicelive_voice", &self.voicelive_voice)
            .field("voicelive_instructions", &self.voicelive_instructions)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

/// Zeroize the API key when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.voicelive_api_key {
            key.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
            voicelive_endpoint: None,
            voicelive_api_key: None,
            voicelive_model: DEFAULT_MODEL.to_string(),
            voicelive_voice: DEFAULT_VOICE.to_string(),
            voicelive_instructions: DEFAULT_INSTRUCTIONS.to_string(),
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs at startup, so its values are
    /// already visible as environment variables here.
    pub fn from_env() -> Result<Self, ConfigError> {
        merge::merge_config(None)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - TLS is enabled without certificate and key paths
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        merge::merge_config(Some(yaml_config))
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether both the Voice Live endpoint and API key are present.
    pub fn has_upstream_credentials(&self) -> bool {
        self.require_upstream().is_ok()
    }

    /// Voice Live endpoint and credential, or [`ConfigError::MissingCredentials`].
    pub fn require_upstream(&self) -> Result<(String, Credential), ConfigError> {
        validation::require_upstream(
            self.voicelive_endpoint.as_deref(),
            self.voicelive_api_key.as_deref(),
        )
    }

    /// Full startup validation.
    ///
    /// Loading already rejects malformed values; this additionally requires
    /// the Voice Live credentials, which the binary treats as fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_port(self.port)?;
        self.require_upstream()?;
        Ok(())
    }
}
