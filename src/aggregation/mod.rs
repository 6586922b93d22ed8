//! Aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! ReputationQuery
//!     → aggregator.rs (spawn one task per source, wait for all)
//!     → resilience::execute (timeout + retry per source)
//!     → scoring.rs (mean of successes, risk band)
//!     → AggregateResult | AggregateError
//! ```
//!
//! # Design Decisions
//! - Wait-all barrier; one slow or failing source never blocks the others
//! - Failed sources stay in the result as placeholders without a score
//! - Rate-limit escalation is a configurable policy, not a special case

pub mod aggregator;
pub mod scoring;

pub use aggregator::{AggregateError, AggregateResult, Aggregator};
pub use scoring::{combined_score, RiskLevel};
