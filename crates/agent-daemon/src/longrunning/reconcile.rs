//! Periodic repair of long-running plugins that stopped on their own

use super::manager::{configuration_for, Manager};
use std::sync::Arc;
use tracing::{debug, info};

impl Manager {
    /// Resubmit a start job for every plugin in the running set that is
    /// registered but reports it is not running.
    ///
    /// Plugins outside the running set are never started here. Overlapping
    /// runs are safe: the start pool rejects a second job for the same name.
    /// Returns the number of start jobs submitted.
    pub fn ensure_plugins_are_running(self: &Arc<Self>) -> usize {
        // Read lock only: submitting to the pool does not touch the set.
        let running = self.running_read();

        if running.is_empty() {
            info!(
                "There are no long running plugins currently getting executed - skipping their healthcheck"
            );
            return 0;
        }

        let mut submitted = 0;
        for (name, info) in running.iter() {
            let Some(plugin) = self.registered.get(name) else {
                debug!("Skipping healthcheck of {name}: not registered");
                continue;
            };
            if plugin.handler.is_running(&self.ctx) {
                continue;
            }

            info!("Starting {name} since it wasn't running");
            if self.submit_start(name, plugin, configuration_for(info, plugin)) {
                submitted += 1;
            }
        }

        submitted
    }
}
