//! Resilience subsystem.
//!
//! # Design Decisions
//! - Config store polling backs off exponentially on errors
//! - Jitter spreads retries from many gateway instances
//! - A successful poll resets the delay to the regular interval

pub mod backoff;

pub use backoff::poll_backoff;
