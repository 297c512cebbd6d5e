//! Process signal handling
//!
//! The first SIGINT/SIGTERM requests a soft stop. A second one while the soft
//! stop is still in progress escalates to a hard stop.

#[cfg(unix)]
use anyhow::Context;
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Tokens fired by successive stop requests
#[derive(Clone, Default)]
pub struct StopSignals {
    stop: CancellationToken,
    escalate: CancellationToken,
    received: Arc<AtomicUsize>,
}

impl StopSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one stop request. Returns how many have been received.
    pub fn request(&self) -> usize {
        let count = self.received.fetch_add(1, Ordering::SeqCst) + 1;
        if count == 1 {
            self.stop.cancel();
        } else {
            self.escalate.cancel();
        }
        count
    }

    /// Fires on the first request
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Fires on the second request
    pub fn escalate_token(&self) -> CancellationToken {
        self.escalate.clone()
    }
}

/// Forward SIGINT and SIGTERM (Ctrl+C elsewhere) to `signals` until
/// escalation.
///
/// # Errors
///
/// Returns an error if the SIGTERM handler cannot be installed.
pub fn install(signals: StopSignals) -> Result<JoinHandle<()>> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Failed to create SIGTERM handler")?;

    Ok(tokio::spawn(async move {
        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl+C: {e}");
                    return;
                }
                info!("Received Ctrl+C");
            }

            if signals.request() > 1 {
                warn!("Second stop request received; escalating to hard stop");
                return;
            }
        }
    }))
}
