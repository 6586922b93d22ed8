//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Build state objects → Spawn maintenance → Bind listener
//!
//! Shutdown:
//!     signals.rs (SIGINT/SIGTERM) → shutdown.rs broadcast
//!     → HTTP server drains → maintenance flushes the cache → exit
//! ```

pub mod maintenance;
pub mod shutdown;
pub mod signals;

pub use maintenance::Maintenance;
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
