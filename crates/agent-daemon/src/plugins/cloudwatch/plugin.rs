use super::config::CloudWatchConfig;
use crate::plugin::{LongRunningPlugin, PluginContext, PluginError};
use crate::task::CancelFlag;
use host_agent_core::io::atomic::write_atomic;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Long-running plugin that supervises the CloudWatch agent process
pub struct CloudWatchPlugin {
    config: CloudWatchConfig,
    running: AtomicBool,
}

/// Clears the running flag however `start` returns
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CloudWatchPlugin {
    pub fn new(config: CloudWatchConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Build from the `[plugins."aws:cloudWatch"]` section, or defaults when
    /// the section is absent
    pub fn from_context(ctx: &PluginContext) -> Result<Self, PluginError> {
        let config = match ctx.plugin_config(crate::plugins::CLOUDWATCH) {
            Some(table) => CloudWatchConfig::from_toml(table)?,
            None => CloudWatchConfig::default(),
        };
        Ok(Self::new(config))
    }

    fn config_file(ctx: &PluginContext) -> PathBuf {
        ctx.system.longrunning_dir().join("cloudwatch").join("config.json")
    }

    /// Persist the payload for the agent; an empty payload writes nothing
    fn write_configuration(
        ctx: &PluginContext,
        configuration: &str,
    ) -> Result<Option<PathBuf>, PluginError> {
        if configuration.trim().is_empty() {
            return Ok(None);
        }

        let path = Self::config_file(ctx);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PluginError::runtime(format!("cannot create {}", parent.display()), e)
            })?;
        }
        write_atomic(&path, configuration.as_bytes())
            .map_err(|e| PluginError::runtime("cannot write cloudwatch configuration", e))?;
        Ok(Some(path))
    }
}

impl LongRunningPlugin for CloudWatchPlugin {
    async fn start(
        &self,
        ctx: &PluginContext,
        configuration: &str,
        _orchestration_dir: &Path,
        cancel: CancelFlag,
    ) -> Result<(), PluginError> {
        if cancel.stopping() {
            debug!("CloudWatch start skipped: already {}", cancel.state());
            return Ok(());
        }

        let config_path = Self::write_configuration(ctx, configuration)?;

        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&self.config.args);
        if let Some(ref path) = config_path {
            cmd.arg("-config").arg(path);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            PluginError::runtime(format!("failed to launch {}", self.config.executable), e)
        })?;

        self.running.store(true, Ordering::SeqCst);
        let _running = RunningGuard(&self.running);
        info!("CloudWatch agent started (pid {:?})", child.id());

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| PluginError::runtime("failed to wait for cloudwatch agent", e))?;
                if status.success() {
                    info!("CloudWatch agent exited");
                    Ok(())
                } else {
                    Err(PluginError::Runtime {
                        message: format!("cloudwatch agent exited with {status}"),
                        source: None,
                    })
                }
            }
            state = cancel.wait() => {
                info!("Stopping CloudWatch agent: {state}");
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill CloudWatch agent: {e}");
                }
                Ok(())
            }
        }
    }

    fn is_running(&self, _ctx: &PluginContext) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
