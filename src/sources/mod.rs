//! Threat-intelligence source adapters.
//!
//! # Data Flow
//! ```text
//! Aggregator
//!     → resilience::retries (timeout + retry per source)
//!     → ReputationSource::check_domain
//!     → SourceResult | SourceError
//! ```
//!
//! # Design Decisions
//! - Adapters report failures through the closed `SourceError` sum type
//! - `detail` is opaque; the core never inspects it
//! - Vendor wire formats stay inside the adapter

pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

pub use http::HttpJsonSource;
pub use types::{SourceError, SourceErrorKind, SourceResult};

/// A single upstream reputation provider.
#[async_trait]
pub trait ReputationSource: Send + Sync {
    /// Stable name used for logging, metrics and result ordering.
    fn name(&self) -> &str;

    /// Ask the provider for its opinion of `domain`.
    async fn check_domain(&self, domain: &str) -> Result<SourceResult, SourceError>;
}
