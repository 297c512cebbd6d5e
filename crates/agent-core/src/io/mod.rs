//! Persistence for the running-plugin set
//!
//! - **Atomic replace**: writes go to a sibling temp file that is renamed over
//!   the target, so readers never observe a half-written file
//! - **File locking**: advisory lock with exponential backoff around
//!   read-modify-write cycles
//! - **Missing is empty**: a store that has never been written reads as an
//!   empty set

pub mod atomic;
pub mod error;
pub mod lock;
pub mod store;

pub use error::StoreError;
pub use store::{FileStore, MemoryStore, RunningPluginStore};
