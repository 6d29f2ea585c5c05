//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_termination() returns
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscriber wakes → server stops accepting
//!     → in-flight requests finish → process exits
//! ```
//!
//! # Design Decisions
//! - Ordered startup in main: config, logging, metrics, store, listener
//! - Shutdown is a broadcast so the server and any background task can observe it
//! - A subscriber that joins after trigger() still sees the shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_termination;
