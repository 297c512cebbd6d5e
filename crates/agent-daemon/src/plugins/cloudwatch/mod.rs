//! CloudWatch metrics shipper
//!
//! Runs the CloudWatch agent as a child process for as long as the plugin is
//! wanted. The configuration payload handed to `start` is written next to the
//! manager's state and passed to the agent with `-config`.

pub mod config;
pub mod plugin;

pub use config::CloudWatchConfig;
pub use plugin::CloudWatchPlugin;
