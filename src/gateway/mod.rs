//! Check orchestration.
//!
//! # State Flow
//! ```text
//! RATE_CHECK ──reject──▶ IngressRateLimited
//!     │
//!     ▼
//! VALIDATE ──reject──▶ Validation
//!     │
//!     ▼
//! CACHE_LOOKUP ──hit──▶ DONE (cached)
//!     │ miss / read error
//!     ▼
//! AGGREGATE ──fail──▶ UpstreamRateLimited | UpstreamUnavailable
//!     │
//!     ▼
//! CACHE_WRITE (failure logged) ──▶ DONE
//! ```

pub mod error;
pub mod service;

pub use error::{BuildError, CheckError};
pub use service::{CheckOutcome, ReputationService};
