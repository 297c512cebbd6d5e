//! Worker-side entry point for every long-running plugin
//!
//! The catalog maps each long-running plugin name to one shared
//! [`LongRunningInvoker`]. It reads the invocation's `enabled` switch and asks
//! the manager to start or stop the named plugin.

use crate::longrunning::ManagerCell;
use crate::plugin::{PluginConfiguration, PluginContext, PluginError, PluginResult, WorkerPlugin};
use crate::task::CancelFlag;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct InvokerProperties {
    enabled: bool,
    #[serde(default)]
    configuration: Option<serde_json::Value>,
}

impl InvokerProperties {
    /// Properties arrive either as an object or as a JSON document in a string
    fn parse(properties: &serde_json::Value) -> Result<Self, PluginError> {
        let parsed = match properties {
            serde_json::Value::String(text) => serde_json::from_str(text),
            other => serde_json::from_value(other.clone()),
        };
        parsed.map_err(|e| PluginError::Config {
            message: format!("invalid long running plugin properties: {e}"),
        })
    }

    /// Configuration handed to the plugin; strings pass through unquoted
    fn configuration(&self) -> String {
        match &self.configuration {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Forwards enable/disable requests to the long-running plugin manager
pub struct LongRunningInvoker {
    cell: Arc<ManagerCell>,
}

impl LongRunningInvoker {
    pub fn new(cell: Arc<ManagerCell>) -> Self {
        Self { cell }
    }
}

#[async_trait]
impl WorkerPlugin for LongRunningInvoker {
    async fn execute(
        &self,
        _ctx: &PluginContext,
        config: &PluginConfiguration,
        cancel: CancelFlag,
    ) -> PluginResult {
        let name = config.plugin_name.as_str();
        if cancel.stopping() {
            return PluginResult::cancelled();
        }

        let properties = match InvokerProperties::parse(&config.properties) {
            Ok(properties) => properties,
            Err(e) => return PluginResult::failed(1, e.to_string()),
        };

        let manager = match self.cell.get_instance() {
            Ok(manager) => manager,
            Err(e) => {
                error!("Cannot invoke {name}: {e}");
                return PluginResult::failed(1, e.to_string());
            }
        };

        let outcome = if properties.enabled {
            info!("Enabling long running plugin {name}");
            manager.start_plugin(name, properties.configuration())
        } else {
            info!("Disabling long running plugin {name}");
            manager.stop_plugin(name)
        };

        match outcome {
            Ok(()) if properties.enabled => PluginResult::success(format!("{name} enabled")),
            Ok(()) => PluginResult::success(format!("{name} disabled")),
            Err(e) => {
                error!("Long running plugin {name} request failed: {e}");
                PluginResult::failed(1, e.to_string())
            }
        }
    }
}
