use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   tls:
///     enabled: true
///     cert_path: "/etc/ssl/bridge.pem"
///     key_path: "/etc/ssl/bridge.key"
///
/// voicelive:
///   endpoint: "https://my-resource.services.ai.azure.com"
///   api_key: "your-api-key"
///   model: "gpt-4o-realtime-preview"
///   voice: "en-US-AvaNeural"
///   instructions: "You are a helpful AI assistant."
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub voicelive: Option<VoiceLiveYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Voice Live configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VoiceLiveYaml {
    /// Resource endpoint, `https://` or `wss://`
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Flat name ("alloy") or regional voice ("en-US-AvaNeural")
    pub voice: Option<String>,
    pub instructions: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;

        Ok(config)
    }
}
