pub mod catalog;
pub mod context;
pub mod traits;
pub mod types;

pub use catalog::{PluginCatalog, PluginRegistry, WorkerPluginFactory};
pub use context::PluginContext;
pub use traits::{ErasedLongRunningPlugin, LongRunningPlugin, SharedLongRunningPlugin, WorkerPlugin};
pub use types::{PluginConfiguration, PluginError, PluginResult, ResultStatus};
