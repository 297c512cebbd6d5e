//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted reconciliation interval: one week
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent-wide settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Long-running plugin manager tuning
    #[serde(default)]
    pub longrunning: LongRunningConfig,
    /// Plugin-specific configuration sections: [plugins.<name>]
    #[serde(default)]
    pub plugins: HashMap<String, toml::Table>,
}

/// Agent-wide settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directory holding persisted agent state (default: ~/.host-agent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// A `[longrunning]` section that parsed but cannot be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LongRunningConfigError {
    #[error("start_workers and stop_workers must be greater than zero")]
    ZeroWorkers,

    #[error("poll_interval_minutes must be between 1 and {max}, got {minutes}")]
    PollInterval { minutes: u64, max: u64 },

    #[error("soft_stop_timeout_secs ({soft}) must exceed hard_stop_timeout_secs ({hard})")]
    StopTimeouts { soft: u64, hard: u64 },
}

/// Tuning for the long-running plugin manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongRunningConfig {
    /// Workers in the pool that starts plugins
    #[serde(default = "default_workers")]
    pub start_workers: usize,
    /// Workers in the pool that stops plugins
    #[serde(default = "default_workers")]
    pub stop_workers: usize,
    /// How long a cancelled job is waited on before giving up (milliseconds)
    #[serde(default = "default_cancel_wait_ms")]
    pub cancel_wait_ms: u64,
    /// Reconciliation interval in minutes
    #[serde(default = "default_poll_minutes")]
    pub poll_interval_minutes: u64,
    /// Grace period for a soft stop (seconds)
    #[serde(default = "default_soft_stop_secs")]
    pub soft_stop_timeout_secs: u64,
    /// Grace period for a hard stop (seconds)
    #[serde(default = "default_hard_stop_secs")]
    pub hard_stop_timeout_secs: u64,
}

fn default_workers() -> usize {
    5
}

fn default_cancel_wait_ms() -> u64 {
    10_000
}

fn default_poll_minutes() -> u64 {
    15
}

fn default_soft_stop_secs() -> u64 {
    20
}

fn default_hard_stop_secs() -> u64 {
    4
}

impl Default for LongRunningConfig {
    fn default() -> Self {
        Self {
            start_workers: default_workers(),
            stop_workers: default_workers(),
            cancel_wait_ms: default_cancel_wait_ms(),
            poll_interval_minutes: default_poll_minutes(),
            soft_stop_timeout_secs: default_soft_stop_secs(),
            hard_stop_timeout_secs: default_hard_stop_secs(),
        }
    }
}

impl LongRunningConfig {
    pub fn cancel_wait(&self) -> Duration {
        Duration::from_millis(self.cancel_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }

    pub fn soft_stop_timeout(&self) -> Duration {
        Duration::from_secs(self.soft_stop_timeout_secs)
    }

    pub fn hard_stop_timeout(&self) -> Duration {
        Duration::from_secs(self.hard_stop_timeout_secs)
    }

    /// Check the relative ordering the manager depends on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), LongRunningConfigError> {
        if self.start_workers == 0 || self.stop_workers == 0 {
            return Err(LongRunningConfigError::ZeroWorkers);
        }
        if !(1..=MAX_POLL_INTERVAL_MINUTES).contains(&self.poll_interval_minutes) {
            return Err(LongRunningConfigError::PollInterval {
                minutes: self.poll_interval_minutes,
                max: MAX_POLL_INTERVAL_MINUTES,
            });
        }
        if self.soft_stop_timeout_secs <= self.hard_stop_timeout_secs {
            return Err(LongRunningConfigError::StopTimeouts {
                soft: self.soft_stop_timeout_secs,
                hard: self.hard_stop_timeout_secs,
            });
        }
        Ok(())
    }
}

impl Config {
    /// Get a plugin's configuration section by name.
    /// Returns None if the plugin has no config section.
    pub fn plugin_config(&self, name: &str) -> Option<&toml::Table> {
        self.plugins.get(name)
    }
}
