//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a source:
//!     → timeouts.rs (enforce per-attempt deadline)
//!     → On failure: retries.rs (check if retryable, retry with backoff)
//!     → backoff.rs (delay = initial * factor^n, capped, jittered)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Only transient failures are retried
//! - Rate-limit errors are surfaced unchanged so callers can back off

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{execute, RetryPolicy};
