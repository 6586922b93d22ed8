//! Result cache subsystem.
//!
//! # Data Flow
//! ```text
//! lookup(domain) → live entry? → AggregateResult
//! put(domain, result) → replace entry → snapshot file (temp + rename)
//! maintenance tick → purge_expired → flush
//! ```
//!
//! # Design Decisions
//! - One entry per domain; writes replace, never patch
//! - Expired entries are invisible immediately, removed lazily by the sweep
//! - Persistence failures are logged, never returned to callers

pub mod store;

pub use store::{CacheEntry, CacheError, CacheStore};
