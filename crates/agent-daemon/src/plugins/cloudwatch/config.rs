//! Configuration for the CloudWatch plugin

use crate::plugin::PluginError;
use host_agent_core::toml;

/// Agent binary launched when no `executable` is configured
pub const DEFAULT_EXECUTABLE: &str = "amazon-cloudwatch-agent";

/// Settings parsed from `[plugins."aws:cloudWatch"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudWatchConfig {
    /// Program to launch
    pub executable: String,
    /// Arguments passed before the generated `-config` flag
    pub args: Vec<String>,
}

impl Default for CloudWatchConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            args: Vec::new(),
        }
    }
}

impl CloudWatchConfig {
    /// Parse configuration from TOML table
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Config` if a field has the wrong type or the
    /// executable is empty
    pub fn from_toml(table: &toml::Table) -> Result<Self, PluginError> {
        let executable = match table.get("executable") {
            None => DEFAULT_EXECUTABLE.to_string(),
            Some(value) => value
                .as_str()
                .ok_or_else(|| PluginError::Config {
                    message: "'executable' must be a string".to_string(),
                })?
                .to_string(),
        };

        if executable.trim().is_empty() {
            return Err(PluginError::Config {
                message: "'executable' cannot be empty".to_string(),
            });
        }

        let args = match table.get("args") {
            None => Vec::new(),
            Some(value) => {
                let items = value.as_array().ok_or_else(|| PluginError::Config {
                    message: "'args' must be an array of strings".to_string(),
                })?;
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| PluginError::Config {
                            message: "'args' must be an array of strings".to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self { executable, args })
    }
}
