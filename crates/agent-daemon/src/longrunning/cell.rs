//! One-time initialization of the long-running plugin manager

use super::error::ManagerError;
use super::manager::Manager;
use super::registration::LongRunningFactory;
use crate::plugin::PluginContext;
use host_agent_core::io::RunningPluginStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, PoisonError, RwLock};
use tracing::info;

/// Where the manager is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninitialized,
    Initializing,
    Ready,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What the manager is built from
pub struct ManagerDeps {
    pub store: Arc<dyn RunningPluginStore>,
    pub factories: Vec<LongRunningFactory>,
}

impl ManagerDeps {
    pub fn new(store: Arc<dyn RunningPluginStore>, factories: Vec<LongRunningFactory>) -> Self {
        Self { store, factories }
    }
}

/// Holds the process's single [`Manager`].
///
/// Built once by `main` and shared by `Arc` with everything that needs the
/// manager, including the invoker plugin. The first call to
/// [`ManagerCell::ensure_initialized`] builds the manager; concurrent callers
/// block until it is built and then see the same instance.
pub struct ManagerCell {
    deps: ManagerDeps,
    init: Once,
    initializing: AtomicBool,
    instance: RwLock<Option<Arc<Manager>>>,
}

impl ManagerCell {
    pub fn new(deps: ManagerDeps) -> Self {
        Self {
            deps,
            init: Once::new(),
            initializing: AtomicBool::new(false),
            instance: RwLock::new(None),
        }
    }

    /// Build the manager on first call; later calls return the same one.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotInitialized` only if a previous attempt
    /// panicked part way through.
    pub fn ensure_initialized(&self, ctx: &PluginContext) -> Result<Arc<Manager>, ManagerError> {
        if !self.init.is_completed() {
            self.init.call_once(|| {
                self.initializing.store(true, Ordering::SeqCst);
                info!("Initializing {}", super::NAME);

                let manager = Arc::new(Manager::new(ctx, &self.deps));
                *self.instance.write().unwrap_or_else(PoisonError::into_inner) = Some(manager);

                self.initializing.store(false, Ordering::SeqCst);
            });
        }
        self.get_instance()
    }

    /// The manager, if it has been built.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::NotInitialized` before
    /// [`ManagerCell::ensure_initialized`] has completed.
    pub fn get_instance(&self) -> Result<Arc<Manager>, ManagerError> {
        self.instance
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
            .ok_or(ManagerError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.init.is_completed()
    }

    pub fn phase(&self) -> LifecyclePhase {
        if let Ok(manager) = self.get_instance() {
            return manager.phase();
        }
        if self.initializing.load(Ordering::SeqCst) {
            LifecyclePhase::Initializing
        } else {
            LifecyclePhase::Uninitialized
        }
    }
}

impl fmt::Debug for ManagerCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerCell")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
