//! `aws:runShellScript` worker plugin
//!
//! Runs the commands in the invocation's properties through the platform shell
//! and reports the combined output.

use crate::plugin::{
    PluginConfiguration, PluginContext, PluginError, PluginResult, ResultStatus, WorkerPlugin,
};
use crate::task::CancelFlag;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Used when the invocation does not set `timeoutSeconds`
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Exit code reported when the script never produced one
const NO_EXIT_CODE: i32 = -1;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Commands {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunShellScriptProperties {
    commands: Commands,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

impl RunShellScriptProperties {
    fn parse(properties: &serde_json::Value) -> Result<Self, PluginError> {
        let parsed: Self = serde_json::from_value(properties.clone()).map_err(|e| {
            PluginError::Config {
                message: format!("invalid runShellScript properties: {e}"),
            }
        })?;
        if parsed.script().trim().is_empty() {
            return Err(PluginError::Config {
                message: "runShellScript needs at least one command".to_string(),
            });
        }
        Ok(parsed)
    }

    fn script(&self) -> String {
        match &self.commands {
            Commands::One(command) => command.clone(),
            Commands::Many(commands) => commands.join("\n"),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }
}

/// Runs shell scripts
#[derive(Debug, Default)]
pub struct RunShellScript;

impl RunShellScript {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkerPlugin for RunShellScript {
    async fn execute(
        &self,
        ctx: &PluginContext,
        config: &PluginConfiguration,
        cancel: CancelFlag,
    ) -> PluginResult {
        let properties = match RunShellScriptProperties::parse(&config.properties) {
            Ok(properties) => properties,
            Err(e) => return PluginResult::failed(1, e.to_string()),
        };
        if cancel.stopping() {
            return PluginResult::cancelled();
        }

        let (shell, flag) = ctx.system.platform.shell();
        let mut cmd = Command::new(shell);
        cmd.arg(flag)
            .arg(properties.script())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !config.orchestration_dir.as_os_str().is_empty() {
            cmd.current_dir(&config.orchestration_dir);
        }

        let timeout = properties.timeout();
        debug!("{} running script with timeout {timeout:?}", config.plugin_name);

        // Dropping the output future kills the child
        tokio::select! {
            output = cmd.output() => match output {
                Ok(output) => {
                    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if !stderr.is_empty() {
                        text.push_str(&stderr);
                    }
                    let code = output.status.code().unwrap_or(NO_EXIT_CODE);
                    if output.status.success() {
                        PluginResult::success(text)
                    } else {
                        info!("{} script exited with {code}", config.plugin_name);
                        PluginResult::failed(code, text)
                    }
                }
                Err(e) => {
                    warn!("{} failed to launch {shell}: {e}", config.plugin_name);
                    PluginResult::failed(NO_EXIT_CODE, format!("failed to launch {shell}: {e}"))
                }
            },
            _ = tokio::time::sleep(timeout) => {
                warn!("{} script timed out after {timeout:?}", config.plugin_name);
                PluginResult {
                    status: ResultStatus::TimedOut,
                    code: NO_EXIT_CODE,
                    output: format!("script timed out after {timeout:?}"),
                }
            }
            state = cancel.wait() => {
                info!("{} script stopped: {state}", config.plugin_name);
                PluginResult::cancelled()
            }
        }
    }
}
