//! Long-running plugin manager
//!
//! Keeps named background plugins running across agent restarts:
//!
//! - `registration.rs`: table of long-running plugins the agent can run
//! - `manager.rs`: revival at startup, explicit start/stop, graceful shutdown
//! - `reconcile.rs`: periodic repair of plugins that died silently
//! - `cell.rs`: one-time initialization and shared access to the manager

pub mod cell;
pub mod error;
pub mod manager;
pub mod reconcile;
pub mod registration;

pub use cell::{LifecyclePhase, ManagerCell, ManagerDeps};
pub use error::ManagerError;
pub use manager::{Manager, NAME};
pub use registration::{registered_plugins, LongRunningFactory, RegisteredPlugin};
