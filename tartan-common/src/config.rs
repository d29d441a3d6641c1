//! Configuration loading and root folder resolution
//!
//! Missing or unreadable TOML files never stop a service: a warning is logged
//! and compiled defaults are used instead.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `TARTAN_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::fingerprint::VoicePolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TARTAN_ROOT_FOLDER";

/// Database file created inside the root folder
pub const DATABASE_FILE_NAME: &str = "recognition_cache.db";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. "info", "tartan_id=debug"); `RUST_LOG` wins when set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// SQLite section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Pool size
    pub max_connections: u32,
    /// SQLite busy_timeout applied to every pooled connection
    pub busy_timeout_ms: u64,
    /// Total retry budget for "database is locked" errors
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            busy_timeout_ms: 250,
            max_lock_wait_ms: 5000,
        }
    }
}

/// External provider section of the TOML config
///
/// Keys left unset disable the matching provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible base URL (no trailing `/v1`)
    pub openai_base_url: String,
    pub voice_model: String,
    pub vision_model: String,
    pub shazam_api_key: Option<String>,
    pub overshoot_api_key: Option<String>,
    /// Per-request timeout for every provider client
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com".to_string(),
            voice_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            shazam_api_key: None,
            overshoot_api_key: None,
            request_timeout_secs: 30,
        }
    }
}

/// Service TOML configuration (`~/.config/tartan/<module>.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub providers: ProviderConfig,
    /// Voice fingerprint field selection and rounding
    pub fingerprint: VoicePolicy,
}

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub bind_address: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/tartan (or /var/lib/tartan for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("tartan"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/tartan"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("tartan"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tartan"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("tartan"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tartan"))
    } else {
        PathBuf::from("./tartan_data")
    }
}

/// Locate the config file for a module
///
/// Linux checks the user config dir first, then `/etc/tartan/`.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("tartan").join(&file_name));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/tartan").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the module's config file, falling back to defaults
pub fn load_or_default(module_name: &str) -> TomlConfig {
    match config_file_path(module_name) {
        Some(path) => match load_toml_config(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using compiled defaults", e);
                TomlConfig::default()
            }
        },
        None => {
            debug!("No config file for {}; using compiled defaults", module_name);
            TomlConfig::default()
        }
    }
}

/// Resolves the root folder across CLI, environment, TOML and compiled default
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives paths inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.database.max_lock_wait_ms, 5000);
        assert_eq!(config.fingerprint, VoicePolicy::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6100

            [providers]
            shazam_api_key = "rapid-key"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(6100));
        assert_eq!(config.providers.shazam_api_key.as_deref(), Some("rapid-key"));
        assert_eq!(config.providers.voice_model, "gpt-4o-mini");
        assert_eq!(config.providers.request_timeout_secs, 30);
    }

    #[test]
    fn test_fingerprint_policy_override() {
        let config: TomlConfig = toml::from_str(
            r#"
            [[fingerprint.fields]]
            key = "mean_pitch"
            decimals = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.fingerprint.fields.len(), 1);
        assert_eq!(config.fingerprint.fields[0].key, "mean_pitch");
        assert_eq!(config.fingerprint.fields[0].decimals, 0);
    }

    #[test]
    fn test_initializer_database_path() {
        let init = RootFolderInitializer::new(PathBuf::from("/tmp/tartan-root"));
        assert_eq!(
            init.database_path(),
            PathBuf::from("/tmp/tartan-root").join(DATABASE_FILE_NAME)
        );
    }
}
