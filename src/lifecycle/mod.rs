//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! signals.rs: SIGINT / SIGTERM → Shutdown::trigger
//! shutdown.rs: broadcast to the control server and the config watcher
//! main: stop the active run, wait for its tasks, exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
