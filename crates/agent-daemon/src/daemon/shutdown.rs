//! Graceful shutdown of the long-running plugin manager

use crate::longrunning::Manager;
use anyhow::{Context, Result};
use host_agent_core::schema::StopType;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Soft-stop the manager, switching to a hard stop if `escalate` fires first.
///
/// Returns the stop type that completed.
pub async fn graceful_shutdown(manager: &Manager, escalate: CancellationToken) -> Result<StopType> {
    info!(
        "Beginning graceful shutdown (timeout: {:?})",
        manager.stop_timeout(StopType::SoftStop)
    );

    tokio::select! {
        result = manager.request_stop(StopType::SoftStop) => {
            result.context("Soft stop failed")?;
            Ok(StopType::SoftStop)
        }
        _ = escalate.cancelled() => {
            warn!(
                "Escalating to {} (timeout: {:?})",
                StopType::HardStop,
                manager.stop_timeout(StopType::HardStop)
            );
            manager
                .request_stop(StopType::HardStop)
                .await
                .context("Hard stop failed")?;
            Ok(StopType::HardStop)
        }
    }
}
