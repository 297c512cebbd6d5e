//! Core types for host-agent
//!
//! This crate provides the pieces shared by the agent binaries:
//! - Configuration resolution (`config`)
//! - Runtime system context (`context`)
//! - Persisted long-running plugin state and its file store (`schema`, `io`)
//! - Logging bootstrap (`logging`)

pub mod config;
pub mod context;
pub mod home;
pub mod io;
pub mod logging;
pub mod schema;

pub use schema::{PluginInfo, PluginState, RunningPluginSet, StopType};

// Re-export toml for plugin config access
pub use toml;
