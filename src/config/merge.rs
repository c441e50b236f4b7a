use super::env::EnvConfig;
use super::validation;
use super::yaml::YamlConfig;
use super::{
    ConfigError, DEFAULT_HOST, DEFAULT_INSTRUCTIONS, DEFAULT_MODEL, DEFAULT_PORT, DEFAULT_VOICE,
    ServerConfig,
};

/// Merge environment variables (base) with optional YAML overrides, then
/// apply defaults.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut env = EnvConfig::load()?;

    if let Some(yaml) = yaml {
        apply_yaml(&mut env, yaml);
    }

    let port = env.port.unwrap_or(DEFAULT_PORT);
    validation::validate_port(port)?;

    let tls = validation::resolve_tls(
        env.tls_enabled.unwrap_or(false),
        env.tls_cert_path.take(),
        env.tls_key_path.take(),
    )?;

    Ok(ServerConfig {
        host: env.host.take().unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port,
        tls,
        voicelive_endpoint: env.voicelive_endpoint.take(),
        voicelive_api_key: env.voicelive_api_key.take(),
        voicelive_model: env
            .voicelive_model
            .take()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        voicelive_voice: env
            .voicelive_voice
            .take()
            .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        voicelive_instructions: env
            .voicelive_instructions
            .take()
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        cors_allowed_origins: env.cors_allowed_origins.take(),
    })
}

/// YAML values win over environment values; blank YAML strings are ignored.
fn apply_yaml(env: &mut EnvConfig, yaml: YamlConfig) {
    fn set(target: &mut Option<String>, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            *target = Some(value);
        }
    }

    if let Some(server) = yaml.server {
        set(&mut env.host, server.host);
        if server.port.is_some() {
            env.port = server.port;
        }
        if let Some(tls) = server.tls {
            if tls.enabled.is_some() {
                env.tls_enabled = tls.enabled;
            }
            set(&mut env.tls_cert_path, tls.cert_path);
            set(&mut env.tls_key_path, tls.key_path);
        }
    }

    if let Some(voicelive) = yaml.voicelive {
        set(&mut env.voicelive_endpoint, voicelive.endpoint);
        set(&mut env.voicelive_api_key, voicelive.api_key);
        set(&mut env.voicelive_model, voicelive.model);
        set(&mut env.voicelive_voice, voicelive.voice);
        set(&mut env.voicelive_instructions, voicelive.instructions);
    }

    if let Some(security) = yaml.security {
        set(&mut env.cors_allowed_origins, security.cors_allowed_origins);
    }
}
