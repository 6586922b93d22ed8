//! Errors returned to callers of the check entrypoint.

use std::time::Duration;
use thiserror::Error;

use crate::aggregation::AggregateError;
use crate::query::UrlError;

/// Everything a caller of [`crate::gateway::ReputationService::check`] can get back instead of a result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckError {
    /// The candidate URL was refused before any work was done.
    #[error("invalid url: {0}")]
    Validation(#[from] UrlError),

    /// This service's own limiter rejected the caller.
    #[error("too many requests, retry in {retry_after:?}")]
    IngressRateLimited {
        limit: u32,
        remaining: u32,
        retry_after: Duration,
    },

    /// An upstream source ran out of quota.
    #[error("upstream source '{source_name}' is rate limited")]
    UpstreamRateLimited {
        source_name: String,
        retry_after: Option<Duration>,
    },

    /// No upstream source answered.
    #[error("all {attempted} upstream sources unavailable")]
    UpstreamUnavailable { attempted: usize },
}

impl CheckError {
    /// Short machine-readable tag.
    pub fn code(&self) -> &'static str {
        match self {
            CheckError::Validation(_) => "invalid_url",
            CheckError::IngressRateLimited { .. } => "rate_limited",
            CheckError::UpstreamRateLimited { .. } => "upstream_rate_limited",
            CheckError::UpstreamUnavailable { .. } => "upstream_unavailable",
        }
    }

    /// How long the caller should wait before trying again, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CheckError::IngressRateLimited { retry_after, .. } => Some(*retry_after),
            CheckError::UpstreamRateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<AggregateError> for CheckError {
    fn from(e: AggregateError) -> Self {
        match e {
            AggregateError::RateLimited {
                source_name,
                retry_after,
            } => CheckError::UpstreamRateLimited {
                source_name,
                retry_after,
            },
            AggregateError::AllSourcesUnavailable { attempted } => {
                CheckError::UpstreamUnavailable { attempted }
            }
        }
    }
}

/// Startup failures while assembling the service from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid endpoint for source '{name}': {error}")]
    InvalidEndpoint {
        name: String,
        #[source]
        error: url::ParseError,
    },
}
