//! Host agent - keeps long-running plugins alive across restarts

use anyhow::{Context, Result};
use clap::Parser;
use host_agent_core::config::ConfigOverrides;
use host_agent_core::context::SystemContext;
use host_agent_core::io::FileStore;
use host_agent_daemon::daemon::{self, StopSignals};
use host_agent_daemon::longrunning::{ManagerCell, ManagerDeps};
use host_agent_daemon::plugin::PluginContext;
use host_agent_daemon::plugins;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Host agent - keeps long-running plugins alive across restarts
#[derive(Parser, Debug)]
#[command(name = "host-agent")]
#[command(about = "Runs and supervises host agent plugins")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for persisted agent state
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    host_agent_core::logging::init(args.verbose);

    info!("Host agent starting...");

    let home_dir =
        host_agent_core::home::get_home_dir().context("Failed to determine home directory")?;

    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        data_dir: args.data_dir.clone(),
    };
    let config = host_agent_core::config::resolve_config(&overrides, &home_dir)
        .context("Failed to resolve configuration")?;

    if let Some(config_path) = args.config {
        info!("Loaded config from: {}", config_path.display());
    } else {
        info!("Using resolved configuration");
    }

    let data_dir = config
        .agent
        .data_dir
        .clone()
        .unwrap_or_else(|| host_agent_core::home::default_data_dir(&home_dir));
    info!("Data directory: {}", data_dir.display());

    let system_ctx = SystemContext::detect(data_dir, env!("CARGO_PKG_VERSION").to_string())
        .context("Failed to detect system context")?;
    let store = FileStore::new(&system_ctx.longrunning_dir());
    info!("Running plugin store: {}", store.path().display());

    let plugin_ctx = PluginContext::new(Arc::new(system_ctx), Arc::new(config));

    let cell = Arc::new(ManagerCell::new(ManagerDeps::new(
        Arc::new(store),
        plugins::long_running_factories(),
    )));
    let catalog = plugins::catalog(Arc::clone(&cell));

    let signals = StopSignals::new();
    let _signal_task = daemon::install_signal_handlers(signals.clone())?;

    let stop_type = daemon::run(&cell, &catalog, &plugin_ctx, signals)
        .await
        .context("Daemon event loop failed")?;

    info!("Host agent shutdown complete ({stop_type})");
    Ok(())
}
