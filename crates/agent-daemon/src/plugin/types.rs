use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Work handed to a worker plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfiguration {
    /// Name the plugin was invoked under, e.g. `aws:cloudWatch`
    pub plugin_name: String,
    /// Plugin-interpreted payload
    #[serde(default)]
    pub properties: serde_json::Value,
    /// Scratch directory for this invocation (may be empty)
    #[serde(default)]
    pub orchestration_dir: PathBuf,
}

/// Outcome of a worker plugin invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResult {
    pub status: ResultStatus,
    pub code: i32,
    pub output: String,
}

impl PluginResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Success,
            code: 0,
            output: output.into(),
        }
    }

    pub fn failed(code: i32, output: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            code,
            output: output.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: ResultStatus::Cancelled,
            code: 1,
            output: "execution cancelled".to_string(),
        }
    }
}

/// Plugin errors with structured variants
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin init failed: {message}")]
    Init {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("plugin runtime error: {message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("plugin config error: {message}")]
    Config { message: String },
}

impl PluginError {
    pub fn runtime(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
