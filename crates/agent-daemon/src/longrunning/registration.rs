use crate::plugin::{PluginContext, PluginError, SharedLongRunningPlugin};
use host_agent_core::schema::PluginInfo;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

type BuildHandler =
    dyn Fn(&PluginContext) -> Result<SharedLongRunningPlugin, PluginError> + Send + Sync;

/// A long-running plugin the manager knows how to start
#[derive(Clone)]
pub struct RegisteredPlugin {
    /// Template info (name and default configuration)
    pub info: PluginInfo,
    pub handler: SharedLongRunningPlugin,
}

impl fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Constructor for one long-running plugin
pub struct LongRunningFactory {
    info: PluginInfo,
    build: Box<BuildHandler>,
}

impl LongRunningFactory {
    pub fn new<F>(info: PluginInfo, build: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<SharedLongRunningPlugin, PluginError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            info,
            build: Box::new(build),
        }
    }

    /// Factory that always hands out the same handler
    pub fn from_handler(info: PluginInfo, handler: SharedLongRunningPlugin) -> Self {
        Self::new(info, move |_ctx| Ok(Arc::clone(&handler)))
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// Build the registration table. Plugins whose constructor fails are logged
/// and left out.
pub fn registered_plugins(
    ctx: &PluginContext,
    factories: &[LongRunningFactory],
) -> HashMap<String, RegisteredPlugin> {
    let mut plugins = HashMap::new();

    for factory in factories {
        match (factory.build)(ctx) {
            Ok(handler) => {
                plugins.insert(
                    factory.info.name.clone(),
                    RegisteredPlugin {
                        info: factory.info.clone(),
                        handler,
                    },
                );
            }
            Err(e) => error!(
                "Failed to register long running plugin {}: {}",
                factory.info.name, e
            ),
        }
    }

    let mut names: Vec<&String> = plugins.keys().collect();
    names.sort();
    info!("Registered long running plugins: {names:?}");
    plugins
}
