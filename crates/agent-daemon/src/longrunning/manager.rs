//! The long-running plugin manager

use super::cell::{LifecyclePhase, ManagerDeps};
use super::error::ManagerError;
use super::registration::{registered_plugins, RegisteredPlugin};
use crate::plugin::PluginContext;
use crate::scheduler::{self, ScheduledJob};
use crate::task::{Pool, PoolError};
use host_agent_core::config::LongRunningConfig;
use host_agent_core::io::RunningPluginStore;
use host_agent_core::schema::{PluginInfo, PluginState, RunningPluginSet, StopType};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Name the manager logs and schedules under
pub const NAME: &str = "LongRunningPluginsManager";

/// Starts, revives, repairs, and stops long-running plugins.
///
/// Built once per process through [`super::ManagerCell`].
pub struct Manager {
    pub(super) ctx: PluginContext,
    settings: LongRunningConfig,
    pub(super) start_pool: Pool,
    stop_pool: Pool,
    store: Arc<dyn RunningPluginStore>,
    pub(super) registered: HashMap<String, RegisteredPlugin>,
    running: RwLock<RunningPluginSet>,
    lifecycle_job: Mutex<Option<ScheduledJob>>,
    phase: Mutex<LifecyclePhase>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager").finish_non_exhaustive()
    }
}

impl Manager {
    pub(super) fn new(ctx: &PluginContext, deps: &ManagerDeps) -> Self {
        let settings = ctx.config.longrunning.clone();
        let registered = registered_plugins(ctx, &deps.factories);

        // Start and stop work run in separate pools so each can be sized
        let cancel_wait = settings.cancel_wait();
        let start_pool = Pool::new("lrpm-start", settings.start_workers, cancel_wait);
        let stop_pool = Pool::new("lrpm-stop", settings.stop_workers, cancel_wait);

        Self {
            ctx: ctx.clone(),
            settings,
            start_pool,
            stop_pool,
            store: Arc::clone(&deps.store),
            registered,
            running: RwLock::new(RunningPluginSet::new()),
            lifecycle_job: Mutex::new(None),
            phase: Mutex::new(LifecyclePhase::Ready),
        }
    }

    pub fn registered_plugins(&self) -> &HashMap<String, RegisteredPlugin> {
        &self.registered
    }

    /// Snapshot of the plugins believed to be running
    pub fn running_plugins(&self) -> RunningPluginSet {
        self.running_read().clone()
    }

    pub fn start_pool(&self) -> &Pool {
        &self.start_pool
    }

    pub fn stop_pool(&self) -> &Pool {
        &self.stop_pool
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.lock_phase()
    }

    /// Whether the periodic reconciliation job is scheduled and not quit
    pub fn is_reconciliation_scheduled(&self) -> bool {
        self.lock_job().as_ref().is_some_and(|job| !job.is_quit())
    }

    /// Revive persisted plugins and schedule periodic reconciliation.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::Store` if the persisted set cannot be read; no
    /// plugin is started in that case. Returns `ManagerError::Stopped` after
    /// [`Manager::request_stop`].
    pub fn execute(self: &Arc<Self>) -> Result<(), ManagerError> {
        info!("Starting long running plugin manager");
        self.ensure_ready()?;

        let persisted = self.store.read().map_err(|e| {
            error!("{NAME} is exiting - unable to read from data store: {e}");
            ManagerError::Store(e)
        })?;
        *self.running_write() = persisted.clone();

        if persisted.is_empty() {
            info!("There aren't any long running plugins to revive");
        }

        for (name, info) in &persisted {
            let Some(plugin) = self.registered.get(name) else {
                debug!("Skipping {name}: no registered long running plugin by that name");
                continue;
            };
            info!("Detected {name} as a previously executing long running plugin. Starting it again");
            self.submit_start(name, plugin, configuration_for(info, plugin));
        }

        self.schedule_reconciliation();
        Ok(())
    }

    /// Record `name` as running with `configuration`, persist, and start it.
    ///
    /// If a start job for `name` is already in flight, the new configuration
    /// is persisted and takes effect on the next start. If `name` is being
    /// stopped, its stop job starts it again afterwards.
    ///
    /// # Errors
    ///
    /// `UnknownPlugin` for unregistered names, `Stopped` during shutdown,
    /// `Store` if the set cannot be persisted.
    pub fn start_plugin(
        self: &Arc<Self>,
        name: &str,
        configuration: String,
    ) -> Result<(), ManagerError> {
        let plugin = self.registered_plugin(name)?;
        self.ensure_ready()?;

        let snapshot = {
            let mut running = self.running_write();
            running.insert(
                name.to_string(),
                PluginInfo {
                    name: name.to_string(),
                    configuration: configuration.clone(),
                    state: PluginState::enabled_now(),
                },
            );
            running.clone()
        };
        self.store.write(&snapshot)?;

        // A pending stop job restarts the plugin once it has cancelled the
        // old start job, so a rejected submit here is not lost.
        if !self.submit_start(name, plugin, configuration) {
            info!("{name} already has a start job; new configuration applies on its next start");
        }
        Ok(())
    }

    /// Forget `name`, persist, and cancel its start job from the stop pool.
    ///
    /// # Errors
    ///
    /// `UnknownPlugin` for unregistered names, `Stopped` during shutdown,
    /// `Store` if the set cannot be persisted, `Pool` if the stop job cannot
    /// be queued.
    pub fn stop_plugin(self: &Arc<Self>, name: &str) -> Result<(), ManagerError> {
        self.registered_plugin(name)?;
        self.ensure_ready()?;

        let snapshot = {
            let mut running = self.running_write();
            running.remove(name);
            running.clone()
        };
        self.store.write(&snapshot)?;

        let manager = Arc::downgrade(self);
        let job_id = name.to_string();
        let result = self.stop_pool.submit(name, move |_flag| async move {
            let Some(manager) = manager.upgrade() else {
                return;
            };
            if manager.start_pool.cancel(&job_id).await {
                info!("Stopped long running plugin {job_id}");
            } else {
                debug!("Long running plugin {job_id} had no job to stop or did not exit in time");
            }
            manager.restart_if_enabled(&job_id);
        });

        match result {
            Ok(()) | Err(PoolError::DuplicateJob { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stop reconciliation and drain both pools within the stop type's
    /// deadline.
    ///
    /// Always returns `Ok`; pools that did not drain are logged.
    pub async fn request_stop(&self, stop_type: StopType) -> Result<(), ManagerError> {
        let wait = self.stop_timeout(stop_type);
        info!("{NAME} received {stop_type}; waiting up to {wait:?}");
        *self.lock_phase() = LifecyclePhase::Stopping;

        self.stop_lifecycle_job();

        // Plugins are not stopped individually: shutting down the pools
        // signals every in-flight job through its cancel flag.
        let (started, stopped) = tokio::join!(
            self.start_pool.shutdown_and_wait(wait),
            self.stop_pool.shutdown_and_wait(wait),
        );

        if !started.drained || !stopped.drained {
            warn!(
                "{NAME} shut down uncleanly: abandoned start jobs {:?}, abandoned stop jobs {:?}",
                started.abandoned, stopped.abandoned
            );
        }

        *self.lock_phase() = LifecyclePhase::Stopped;
        info!("{NAME} stopped");
        Ok(())
    }

    pub fn stop_timeout(&self, stop_type: StopType) -> Duration {
        match stop_type {
            StopType::SoftStop => self.settings.soft_stop_timeout(),
            StopType::HardStop => self.settings.hard_stop_timeout(),
        }
    }

    /// Queue a start job keyed by plugin name. Returns false if the pool
    /// rejected it (already in flight, or shut down).
    pub(super) fn submit_start(
        self: &Arc<Self>,
        name: &str,
        plugin: &RegisteredPlugin,
        configuration: String,
    ) -> bool {
        let handler = Arc::clone(&plugin.handler);
        let ctx = self.ctx.clone();
        let manager = Arc::downgrade(self);
        let job_name = name.to_string();

        let result = self.start_pool.submit(name, move |flag| async move {
            // TODO: give each long running plugin its own orchestration directory
            if let Err(e) = handler.start(&ctx, &configuration, Path::new(""), flag).await {
                error!("Long running plugin {job_name} failed: {e}");
                if let Some(manager) = manager.upgrade() {
                    manager.record_failure(&job_name, &e.to_string());
                }
            }
        });

        match result {
            Ok(()) => {
                debug!("Submitted start job for {name}");
                true
            }
            Err(PoolError::DuplicateJob { .. }) => {
                debug!("Start job for {name} already in flight");
                false
            }
            Err(e) => {
                warn!("Unable to submit start job for {name}: {e}");
                false
            }
        }
    }

    /// Start `name` again if it was re-enabled while its stop job ran
    fn restart_if_enabled(self: &Arc<Self>, name: &str) {
        if self.ensure_ready().is_err() {
            return;
        }
        let Some(plugin) = self.registered.get(name) else {
            return;
        };
        let configuration = match self.running_read().get(name) {
            Some(info) => configuration_for(info, plugin),
            None => return,
        };
        info!("{name} was enabled again while stopping; starting it with the latest configuration");
        self.submit_start(name, plugin, configuration);
    }

    fn record_failure(&self, name: &str, message: &str) {
        let snapshot = {
            let mut running = self.running_write();
            let Some(info) = running.get_mut(name) else {
                return;
            };
            info.state.last_error = Some(message.to_string());
            info.state.updated_at = Some(chrono::Utc::now().to_rfc3339());
            running.clone()
        };
        if let Err(e) = self.store.write(&snapshot) {
            warn!("Unable to persist failure of {name}: {e}");
        }
    }

    fn schedule_reconciliation(self: &Arc<Self>) {
        let manager = Arc::downgrade(self);
        let scheduled = scheduler::every(self.settings.poll_interval()).run(NAME, move || {
            if let Some(manager) = manager.upgrade() {
                manager.ensure_plugins_are_running();
            }
        });

        match scheduled {
            Ok(job) => {
                if let Some(previous) = self.lock_job().replace(job) {
                    previous.quit();
                }
            }
            Err(e) => error!("Unable to schedule long running plugins manager: {e}"),
        }
    }

    fn stop_lifecycle_job(&self) {
        if let Some(job) = self.lock_job().as_ref() {
            job.quit();
        }
    }

    fn registered_plugin(&self, name: &str) -> Result<&RegisteredPlugin, ManagerError> {
        self.registered
            .get(name)
            .ok_or_else(|| ManagerError::UnknownPlugin {
                name: name.to_string(),
            })
    }

    fn ensure_ready(&self) -> Result<(), ManagerError> {
        match self.phase() {
            LifecyclePhase::Stopping | LifecyclePhase::Stopped => Err(ManagerError::Stopped),
            _ => Ok(()),
        }
    }

    pub(super) fn running_read(&self) -> RwLockReadGuard<'_, RunningPluginSet> {
        self.running.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn running_write(&self) -> RwLockWriteGuard<'_, RunningPluginSet> {
        self.running.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_job(&self) -> MutexGuard<'_, Option<ScheduledJob>> {
        self.lifecycle_job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_phase(&self) -> MutexGuard<'_, LifecyclePhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persisted configuration wins; the registration template is the fallback.
pub(super) fn configuration_for(info: &PluginInfo, plugin: &RegisteredPlugin) -> String {
    if info.configuration.is_empty() {
        plugin.info.configuration.clone()
    } else {
        info.configuration.clone()
    }
}
