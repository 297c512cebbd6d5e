//! Job execution primitives shared by the plugin managers
//!
//! - `cancel_flag.rs`: per-job cooperative cancellation flag
//! - `pool.rs`: bounded pool with job-id dedup and deadline-bounded shutdown

pub mod cancel_flag;
pub mod pool;

pub use cancel_flag::{CancelFlag, CancelState};
pub use pool::{Pool, PoolError, ShutdownOutcome};
