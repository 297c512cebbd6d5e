use host_agent_core::config::Config;
use host_agent_core::context::SystemContext;
use std::sync::Arc;

/// Shared services available to plugins and the managers that drive them
#[derive(Clone)]
pub struct PluginContext {
    /// System context (hostname, platform, data directory)
    pub system: Arc<SystemContext>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl PluginContext {
    pub fn new(system: Arc<SystemContext>, config: Arc<Config>) -> Self {
        Self { system, config }
    }

    /// Get a plugin's configuration section by name
    pub fn plugin_config(&self, name: &str) -> Option<&host_agent_core::toml::Table> {
        self.config.plugin_config(name)
    }
}
