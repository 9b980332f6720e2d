//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated settings → Build transport → Start exporter → Build client
//!
//! Shutdown (shutdown.rs):
//!     trigger() → flush task leaves its loop → in-flight upload completes
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller stops the session
//! ```
//!
//! # Design Decisions
//! - Ordered startup: settings first, then exporter, then client
//! - Stopping never flushes: buffered samples are discarded
//! - The session is owned by the host, not a process-wide singleton

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
pub use startup::{Session, StartupError};
