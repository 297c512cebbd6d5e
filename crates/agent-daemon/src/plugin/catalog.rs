//! Process-wide catalog of worker and long-running plugin handlers

use super::{PluginContext, PluginError, WorkerPlugin};
use host_agent_core::context::Platform;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info};

/// Plugin handlers indexed by plugin name
pub type PluginRegistry = HashMap<String, Arc<dyn WorkerPlugin>>;

type BuildWorker = dyn Fn(&PluginContext) -> Result<Arc<dyn WorkerPlugin>, PluginError> + Send + Sync;

/// Constructor for one worker plugin
pub struct WorkerPluginFactory {
    name: String,
    platform: Option<Platform>,
    build: Box<BuildWorker>,
}

impl WorkerPluginFactory {
    /// Plugin available on every platform
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<Arc<dyn WorkerPlugin>, PluginError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            platform: None,
            build: Box::new(build),
        }
    }

    /// Restrict the plugin to one platform
    pub fn only_on(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone)]
struct LoadedCatalog {
    worker: PluginRegistry,
    long_running: PluginRegistry,
}

/// Builds both registries on first access and serves cached copies after.
///
/// Every long-running plugin name maps to the same invoker handler, which
/// forwards the work to the long-running plugin manager.
pub struct PluginCatalog {
    worker_factories: Vec<WorkerPluginFactory>,
    long_running_names: Vec<String>,
    invoker: Box<BuildWorker>,
    loaded: RwLock<Option<LoadedCatalog>>,
    loads: AtomicUsize,
}

impl PluginCatalog {
    pub fn new<F>(
        worker_factories: Vec<WorkerPluginFactory>,
        long_running_names: Vec<String>,
        invoker: F,
    ) -> Self
    where
        F: Fn(&PluginContext) -> Result<Arc<dyn WorkerPlugin>, PluginError> + Send + Sync + 'static,
    {
        Self {
            worker_factories,
            long_running_names,
            invoker: Box::new(invoker),
            loaded: RwLock::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Worker plugins, loading the catalog on first call
    pub fn worker_plugins(&self, ctx: &PluginContext) -> PluginRegistry {
        self.cached(ctx).worker
    }

    /// Long-running plugins, loading the catalog on first call
    pub fn long_running_plugins(&self, ctx: &PluginContext) -> PluginRegistry {
        self.cached(ctx).long_running
    }

    /// Number of times the catalog was actually built
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn cached(&self, ctx: &PluginContext) -> LoadedCatalog {
        {
            let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref catalog) = *loaded {
                return catalog.clone();
            }
        }

        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have loaded while we waited for the write lock
        if let Some(ref catalog) = *loaded {
            return catalog.clone();
        }

        let catalog = LoadedCatalog {
            worker: self.load_worker_plugins(ctx),
            long_running: self.load_long_running_plugins(ctx),
        };
        self.loads.fetch_add(1, Ordering::SeqCst);
        *loaded = Some(catalog.clone());
        catalog
    }

    fn load_worker_plugins(&self, ctx: &PluginContext) -> PluginRegistry {
        let platform = ctx.system.platform;
        let mut registry = PluginRegistry::new();

        for factory in &self.worker_factories {
            if factory.platform.is_some_and(|p| p != platform) {
                continue;
            }
            match (factory.build)(ctx) {
                Ok(handler) => {
                    registry.insert(factory.name.clone(), handler);
                }
                Err(e) => error!("Failed to create plugin {}: {}", factory.name, e),
            }
        }

        info!("Loaded {} worker plugin(s)", registry.len());
        registry
    }

    fn load_long_running_plugins(&self, ctx: &PluginContext) -> PluginRegistry {
        let mut registry = PluginRegistry::new();

        match (self.invoker)(ctx) {
            Ok(handler) => {
                for name in &self.long_running_names {
                    registry.insert(name.clone(), Arc::clone(&handler));
                }
            }
            Err(e) => error!(
                "Failed to load the invoker that handles all long running plugins: {}",
                e
            ),
        }

        info!("Loaded {} long running plugin(s)", registry.len());
        registry
    }
}
