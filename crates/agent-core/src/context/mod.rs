//! System context detection
//!
//! Runtime facts about the host the agent runs on. All detection is local.

mod platform;
mod system;

pub use platform::Platform;
pub use system::SystemContext;
