use std::env;

use super::ConfigError;

/// Configuration values as read from the environment, before defaults apply.
///
/// Empty variables are treated as unset.
#[derive(Debug, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_enabled: Option<bool>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub voicelive_endpoint: Option<String>,
    pub voicelive_api_key: Option<String>,
    pub voicelive_model: Option<String>,
    pub voicelive_voice: Option<String>,
    pub voicelive_instructions: Option<String>,
    pub cors_allowed_origins: Option<String>,
}

impl Drop for EnvConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.voicelive_api_key {
            key.zeroize();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var("HOST"),
            port: var("PORT")
                .map(|v| {
                    v.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                        key: "PORT",
                        message: format!("'{v}' is not a valid port: {e}"),
                    })
                })
                .transpose()?,
            tls_enabled: var("TLS_ENABLED")
                .map(|v| parse_bool("TLS_ENABLED", &v))
                .transpose()?,
            tls_cert_path: var("TLS_CERT_PATH"),
            tls_key_path: var("TLS_KEY_PATH"),
            voicelive_endpoint: var("AZURE_VOICELIVE_ENDPOINT"),
            voicelive_api_key: var("AZURE_VOICELIVE_API_KEY"),
            voicelive_model: var("VOICELIVE_MODEL"),
            voicelive_voice: var("VOICELIVE_VOICE"),
            voicelive_instructions: var("VOICELIVE_INSTRUCTIONS"),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key,
            message: format!("'{other}' is not a boolean"),
        }),
    }
}
