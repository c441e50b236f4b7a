use std::path::PathBuf;

use super::{ConfigError, TlsConfig};
use crate::core::voicelive::Credential;

/// Port 0 would bind an ephemeral port nobody can find.
pub(super) fn validate_port(port: u16) -> Result<(), ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidValue {
            key: "PORT",
            message: "port must be non-zero".to_string(),
        });
    }
    Ok(())
}

/// Build the TLS configuration, rejecting a half-configured one.
pub(super) fn resolve_tls(
    enabled: bool,
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, ConfigError> {
    if !enabled {
        return Ok(None);
    }

    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, _) => Err(ConfigError::Tls(
            "TLS is enabled but TLS_CERT_PATH is not set".to_string(),
        )),
        (_, None) => Err(ConfigError::Tls(
            "TLS is enabled but TLS_KEY_PATH is not set".to_string(),
        )),
    }
}

/// Both the endpoint and the API key must be present and non-blank.
pub(super) fn require_upstream(
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Result<(String, Credential), ConfigError> {
    let endpoint = endpoint.map(str::trim).filter(|e| !e.is_empty());
    let api_key = api_key.map(str::trim).filter(|k| !k.is_empty());

    match (endpoint, api_key) {
        (Some(endpoint), Some(key)) => Ok((endpoint.to_string(), Credential::api_key(key))),
        _ => Err(ConfigError::MissingCredentials),
    }
}
