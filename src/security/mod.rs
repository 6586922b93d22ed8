//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming check:
//!     → rate_limit.rs (per-client fixed window)
//!     → query.rs (URL validation, bounded length)
//!     → gateway
//! ```
//!
//! # Design Decisions
//! - Reject before any upstream work: cheap failures first
//! - Rejections carry enough data for client backoff
//! - No trust in client input

pub mod rate_limit;

pub use rate_limit::{IngressRateLimiter, RateLimitDecision};
