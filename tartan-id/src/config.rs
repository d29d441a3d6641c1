//! Configuration resolution for tartan-id
//!
//! Provider API keys resolve ENV → TOML. A provider with no key is left
//! disabled and its endpoints answer 503.

use std::time::Duration;
use tartan_common::config::{CompiledDefaults, DatabaseConfig, TomlConfig};
use tartan_common::VoicePolicy;
use tracing::{info, warn};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const SHAZAM_API_KEY_ENV: &str = "SHAZAM_API_KEY";
pub const OVERSHOOT_API_KEY_ENV: &str = "OVERSHOOT_API_KEY";

/// Resolve one provider key
///
/// **Priority:** ENV → TOML
pub fn resolve_api_key(provider: &str, env_var: &str, toml_key: Option<&String>) -> Option<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} API key found in both environment and TOML. Using environment (highest priority).",
            provider
        );
    }

    if let Some(key) = env_key {
        info!("{} API key loaded from environment variable", provider);
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("{} API key loaded from TOML config", provider);
        return Some(key.clone());
    }

    warn!(
        "{} API key not configured (set {} or the TOML [providers] section); endpoints using it will answer 503",
        provider, env_var
    );
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolved provider settings
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub voice_model: String,
    pub vision_model: String,
    pub shazam_api_key: Option<String>,
    pub overshoot_api_key: Option<String>,
    pub request_timeout: Duration,
}

/// Everything the service needs after config resolution
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub providers: ProviderSettings,
    pub voice_policy: VoicePolicy,
}

impl ServiceConfig {
    /// Merge CLI overrides, TOML and compiled defaults
    ///
    /// **Priority:** CLI → TOML → compiled default
    pub fn resolve(toml: &TomlConfig, cli_bind: Option<String>, cli_port: Option<u16>) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        let providers = &toml.providers;

        Self {
            bind_address: cli_bind
                .or_else(|| toml.bind_address.clone())
                .unwrap_or(defaults.bind_address),
            port: cli_port.or(toml.port).unwrap_or(defaults.port),
            database: toml.database.clone(),
            providers: ProviderSettings {
                openai_api_key: resolve_api_key(
                    "OpenAI",
                    OPENAI_API_KEY_ENV,
                    providers.openai_api_key.as_ref(),
                ),
                openai_base_url: providers.openai_base_url.clone(),
                voice_model: providers.voice_model.clone(),
                vision_model: providers.vision_model.clone(),
                shazam_api_key: resolve_api_key(
                    "Shazam",
                    SHAZAM_API_KEY_ENV,
                    providers.shazam_api_key.as_ref(),
                ),
                overshoot_api_key: resolve_api_key(
                    "Overshoot",
                    OVERSHOOT_API_KEY_ENV,
                    providers.overshoot_api_key.as_ref(),
                ),
                request_timeout: Duration::from_secs(providers.request_timeout_secs.max(1)),
            },
            voice_policy: toml.fingerprint.clone(),
        }
    }
}
