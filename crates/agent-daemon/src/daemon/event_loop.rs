//! Main daemon event loop

use super::shutdown::graceful_shutdown;
use super::signals::StopSignals;
use crate::longrunning::ManagerCell;
use crate::plugin::{PluginCatalog, PluginContext};
use anyhow::{Context, Result};
use host_agent_core::schema::StopType;
use tracing::info;

/// Run the daemon until a stop is requested.
///
/// This function:
/// 1. Initializes the long-running plugin manager
/// 2. Loads the plugin catalog
/// 3. Revives persisted long-running plugins and starts reconciliation
/// 4. Waits for the first stop request
/// 5. Stops the manager, escalating on a second request
///
/// Returns the stop type that completed.
pub async fn run(
    cell: &ManagerCell,
    catalog: &PluginCatalog,
    ctx: &PluginContext,
    signals: StopSignals,
) -> Result<StopType> {
    info!("Initializing daemon event loop");

    let manager = cell
        .ensure_initialized(ctx)
        .context("Failed to initialize long running plugin manager")?;

    let workers = catalog.worker_plugins(ctx);
    let long_running = catalog.long_running_plugins(ctx);
    info!(
        "Catalog ready: {} worker plugin(s), {} long running plugin(s)",
        workers.len(),
        long_running.len()
    );

    manager
        .execute()
        .context("Failed to start long running plugin manager")?;

    info!("Daemon event loop running. Waiting for stop request...");
    signals.stop_token().cancelled().await;
    info!("Stop requested. Beginning shutdown...");

    let stop_type = graceful_shutdown(&manager, signals.escalate_token()).await?;

    info!("Daemon event loop shutdown complete ({stop_type})");
    Ok(stop_type)
}
