//! Plugins shipped with the agent

pub mod cloudwatch;
pub mod invoker;
pub mod runcommand;

use crate::longrunning::{LongRunningFactory, ManagerCell};
use crate::plugin::{PluginCatalog, SharedLongRunningPlugin, WorkerPlugin, WorkerPluginFactory};
use cloudwatch::CloudWatchPlugin;
use host_agent_core::schema::PluginInfo;
use invoker::LongRunningInvoker;
use runcommand::RunShellScript;
use std::sync::Arc;

/// CloudWatch metrics shipper (long-running)
pub const CLOUDWATCH: &str = "aws:cloudWatch";

/// Shell script runner (worker)
pub const RUN_SHELL_SCRIPT: &str = "aws:runShellScript";

/// Long-running plugins the manager can run
pub fn long_running_factories() -> Vec<LongRunningFactory> {
    vec![LongRunningFactory::new(PluginInfo::new(CLOUDWATCH), |ctx| {
        Ok(Arc::new(CloudWatchPlugin::from_context(ctx)?) as SharedLongRunningPlugin)
    })]
}

/// Catalog of the shipped worker plugins plus one invoker shared by every
/// long-running plugin name
pub fn catalog(cell: Arc<ManagerCell>) -> PluginCatalog {
    // No platform-specific worker plugins ship today
    let workers = vec![WorkerPluginFactory::new(RUN_SHELL_SCRIPT, |_ctx| {
        Ok(Arc::new(RunShellScript::new()) as Arc<dyn WorkerPlugin>)
    })];

    let long_running_names = long_running_factories()
        .iter()
        .map(|factory| factory.name().to_string())
        .collect();

    PluginCatalog::new(workers, long_running_names, move |_ctx| {
        Ok(Arc::new(LongRunningInvoker::new(Arc::clone(&cell))) as Arc<dyn WorkerPlugin>)
    })
}
