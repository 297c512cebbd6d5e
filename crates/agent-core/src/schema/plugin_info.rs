//! Desired/observed state of one long-running plugin

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Plugins the agent believes should currently be running, keyed by name.
pub type RunningPluginSet = HashMap<String, PluginInfo>;

/// Status snapshot a plugin reports about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginState {
    /// Whether the plugin was asked to run
    #[serde(default)]
    pub is_enabled: bool,
    /// Last failure reported by the plugin's start routine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// RFC 3339 timestamp of the last status change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl PluginState {
    /// Enabled state stamped with the current time
    pub fn enabled_now() -> Self {
        Self {
            is_enabled: true,
            last_error: None,
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// One plugin's persisted configuration and status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    /// Unique plugin name, e.g. `aws:cloudWatch`
    pub name: String,
    /// Opaque serialized payload; only the plugin interprets it
    #[serde(default)]
    pub configuration: String,
    #[serde(default)]
    pub state: PluginState,
}

impl PluginInfo {
    /// Template with an empty configuration and default state
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configuration: String::new(),
            state: PluginState::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = configuration.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_info_uses_camel_case_keys() {
        let info = PluginInfo {
            name: "aws:cloudWatch".to_string(),
            configuration: "{\"engine\":\"v2\"}".to_string(),
            state: PluginState {
                is_enabled: true,
                last_error: None,
                updated_at: None,
            },
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "aws:cloudWatch");
        assert_eq!(json["state"]["isEnabled"], true);
        assert!(json["state"].get("lastError").is_none());
    }

    #[test]
    fn test_plugin_info_tolerates_missing_fields() {
        let info: PluginInfo = serde_json::from_str(r#"{"name":"aws:cloudWatch"}"#).unwrap();
        assert_eq!(info.name, "aws:cloudWatch");
        assert!(info.configuration.is_empty());
        assert!(!info.state.is_enabled);
    }

    #[test]
    fn test_enabled_now_is_stamped() {
        let state = PluginState::enabled_now();
        assert!(state.is_enabled);
        let stamp = state.updated_at.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }
}
