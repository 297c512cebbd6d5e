//! Canonical home directory resolution for host-agent
//!
//! # Precedence
//!
//! 1. `HOST_AGENT_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default
//!
//! Integration tests MUST use `HOST_AGENT_HOME` to keep config and state out
//! of the real home directory.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "HOST_AGENT_HOME";

/// Get the home directory for host-agent operations
///
/// # Errors
///
/// Returns an error if `HOST_AGENT_HOME` is unset and the platform home
/// directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// Default data directory: `<home>/.host-agent`
pub fn default_data_dir(home: &std::path::Path) -> PathBuf {
    home.join(".host-agent")
}
