//! Schema types for persisted long-running plugin state
//!
//! These types are written to the running-plugin store and read back on the
//! next agent start. Unknown fields are tolerated on read.

mod plugin_info;
mod stop_type;

pub use plugin_info::{PluginInfo, PluginState, RunningPluginSet};
pub use stop_type::StopType;
