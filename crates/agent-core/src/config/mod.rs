//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables
//! 3. Global config (~/.config/host-agent/config.toml)
//! 4. Defaults

mod discovery;
mod types;

pub use discovery::{
    global_config_path, resolve_config, ConfigError, ConfigOverrides, DATA_DIR_ENV,
};
pub use types::{
    AgentConfig, Config, LongRunningConfig, LongRunningConfigError, MAX_POLL_INTERVAL_MINUTES,
};
