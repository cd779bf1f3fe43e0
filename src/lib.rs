// OKX Monitor Supervisor Library
//
// This library supervises a single declared child process: it spawns the
// process described by a ProcessSpec declaration, captures its output to the
// configured log files, and restarts it on unexpected exit with a fixed
// delay and a consecutive-restart cap.

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod process;
pub mod state;
pub mod supervisor;

// Re-export main types for easy use
pub use config::{ProcessSpec, SupervisorConfig, SupervisorOptions};
pub use errors::{ProcessError, SupervisorError};
pub use state::ProcessState;
pub use supervisor::{ProcessStatus, Supervisor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
