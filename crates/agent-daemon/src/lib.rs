//! Host agent daemon: long-running plugin lifecycle, worker pools, and the
//! plugins shipped with the agent

pub mod daemon;
pub mod longrunning;
pub mod plugin;
pub mod plugins;
pub mod scheduler;
pub mod task;
