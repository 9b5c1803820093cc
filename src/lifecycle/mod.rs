//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → route watcher stops → locator stops → servers drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task holds a receiver
//! - A second signal while draining is not special-cased

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
