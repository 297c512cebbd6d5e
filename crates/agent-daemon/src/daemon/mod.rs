pub mod event_loop;
pub mod shutdown;
pub mod signals;

pub use event_loop::run;
pub use shutdown::graceful_shutdown;
pub use signals::{install as install_signal_handlers, StopSignals};
