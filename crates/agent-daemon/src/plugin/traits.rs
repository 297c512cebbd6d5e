use super::{PluginConfiguration, PluginContext, PluginError, PluginResult};
use crate::task::CancelFlag;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

/// Capability contract of a long-running plugin.
///
/// `start` runs for as long as the plugin runs and returns once it stops.
/// Stopping is requested only through `cancel`; implementations must return
/// promptly after the flag fires.
///
/// Uses RPITIT (Return Position Impl Trait in Traits) with explicit Send bounds.
pub trait LongRunningPlugin: Send + Sync {
    fn start(
        &self,
        ctx: &PluginContext,
        configuration: &str,
        orchestration_dir: &Path,
        cancel: CancelFlag,
    ) -> impl Future<Output = Result<(), PluginError>> + Send;

    /// Whether the plugin is currently doing its work.
    fn is_running(&self, ctx: &PluginContext) -> bool;
}

/// Object-safe version of LongRunningPlugin for shared handler tables.
///
/// Implemented automatically for all types that implement LongRunningPlugin.
pub trait ErasedLongRunningPlugin: Send + Sync {
    fn start<'a>(
        &'a self,
        ctx: &'a PluginContext,
        configuration: &'a str,
        orchestration_dir: &'a Path,
        cancel: CancelFlag,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>>;

    fn is_running(&self, ctx: &PluginContext) -> bool;
}

impl<T: LongRunningPlugin> ErasedLongRunningPlugin for T {
    fn start<'a>(
        &'a self,
        ctx: &'a PluginContext,
        configuration: &'a str,
        orchestration_dir: &'a Path,
        cancel: CancelFlag,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(LongRunningPlugin::start(
            self,
            ctx,
            configuration,
            orchestration_dir,
            cancel,
        ))
    }

    fn is_running(&self, ctx: &PluginContext) -> bool {
        LongRunningPlugin::is_running(self, ctx)
    }
}

/// Handler shared between the registration table and in-flight jobs
pub type SharedLongRunningPlugin = Arc<dyn ErasedLongRunningPlugin>;

/// A plugin that runs once per invocation and reports a result.
#[async_trait::async_trait]
pub trait WorkerPlugin: Send + Sync {
    async fn execute(
        &self,
        ctx: &PluginContext,
        config: &PluginConfiguration,
        cancel: CancelFlag,
    ) -> PluginResult;
}
