//! Configuration discovery and resolution

use super::types::{Config, LongRunningConfigError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "HOST_AGENT_DATA_DIR";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Explicitly requested config file does not exist
    #[error("Configuration not found at {0}")]
    NotFound(PathBuf),

    /// Values parsed but violate a constraint
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] LongRunningConfigError),
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Path to config file override
    pub config_path: Option<PathBuf>,
    /// Override data directory
    pub data_dir: Option<PathBuf>,
}

/// Path of the global config file under `home_dir`
pub fn global_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/host-agent/config.toml")
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides (an explicit config path replaces the global file)
/// 2. Environment variables
/// 3. Global config (~/.config/host-agent/config.toml)
/// 4. Defaults
pub fn resolve_config(overrides: &ConfigOverrides, home_dir: &Path) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    match overrides.config_path {
        Some(ref path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.clone()));
            }
            config = load_config_file(path)?;
        }
        None => {
            let global = global_config_path(home_dir);
            if global.exists() {
                match load_config_file(&global) {
                    Ok(file_config) => config = file_config,
                    Err(e) => warn!("Failed to parse global config at {global:?}: {e}"),
                }
            }
        }
    }

    apply_env_overrides(&mut config);

    if let Some(ref dir) = overrides.data_dir {
        config.agent.data_dir = Some(dir.clone());
    }

    config.longrunning.validate()?;

    Ok(config)
}

/// Load config from a TOML file
fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            config.agent.data_dir = Some(PathBuf::from(trimmed));
        }
    }
}
