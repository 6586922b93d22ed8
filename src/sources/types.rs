//! Source result and error types shared by every adapter.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// The normalized opinion of one source about one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    /// Name of the source that produced this result.
    pub source: String,
    /// Risk score in `[0, 100]`; absent for failed placeholders.
    pub risk_score: Option<f64>,
    /// Opaque provider payload, passed through untouched.
    #[serde(default)]
    pub detail: serde_json::Value,
    /// Whether the source answered.
    pub succeeded: bool,
    /// Failure description for placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResult {
    /// A successful result. The score is clamped into `[0, 100]`.
    pub fn success(source: impl Into<String>, risk_score: f64, detail: serde_json::Value) -> Self {
        let score = if risk_score.is_finite() {
            risk_score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            source: source.into(),
            risk_score: Some(score),
            detail,
            succeeded: true,
            error: None,
        }
    }

    /// A placeholder for a source that failed to answer.
    pub fn failed(source: impl Into<String>, error: &SourceError) -> Self {
        Self {
            source: source.into(),
            risk_score: None,
            detail: serde_json::Value::Null,
            succeeded: false,
            error: Some(error.to_string()),
        }
    }
}

/// The closed set of failure kinds a source may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    RateLimited,
    Network,
    Timeout,
    Unauthorized,
    Fatal,
}

impl SourceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceErrorKind::RateLimited => "rate_limited",
            SourceErrorKind::Network => "network",
            SourceErrorKind::Timeout => "timeout",
            SourceErrorKind::Unauthorized => "unauthorized",
            SourceErrorKind::Fatal => "fatal",
        }
    }
}

/// Errors a source adapter can produce.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// The provider's quota is exhausted.
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// Connection failure or a 5xx answer.
    #[error("network error: {0}")]
    Network(String),

    /// The attempt exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Anything else: bad request, unparseable response.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl SourceError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::RateLimited { .. } => SourceErrorKind::RateLimited,
            SourceError::Network(_) => SourceErrorKind::Network,
            SourceError::Timeout(_) => SourceErrorKind::Timeout,
            SourceError::Unauthorized(_) => SourceErrorKind::Unauthorized,
            SourceError::Fatal(_) => SourceErrorKind::Fatal,
        }
    }

    /// Transient failures are worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            SourceErrorKind::Network | SourceErrorKind::Timeout => true,
            SourceErrorKind::RateLimited | SourceErrorKind::Unauthorized | SourceErrorKind::Fatal => {
                false
            }
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SourceError::Network("reset".into()).is_retryable());
        assert!(SourceError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!SourceError::RateLimited { retry_after: None }.is_retryable());
        assert!(!SourceError::Unauthorized("bad key".into()).is_retryable());
        assert!(!SourceError::Fatal("400".into()).is_retryable());
    }

    #[test]
    fn test_success_clamps_score() {
        let high = SourceResult::success("a", 140.0, serde_json::Value::Null);
        assert_eq!(high.risk_score, Some(100.0));
        let low = SourceResult::success("a", -3.0, serde_json::Value::Null);
        assert_eq!(low.risk_score, Some(0.0));
        let nan = SourceResult::success("a", f64::NAN, serde_json::Value::Null);
        assert_eq!(nan.risk_score, Some(0.0));
    }

    #[test]
    fn test_failed_placeholder_has_no_score() {
        let r = SourceResult::failed("b", &SourceError::Network("down".into()));
        assert!(!r.succeeded);
        assert!(r.risk_score.is_none());
        assert_eq!(r.error.as_deref(), Some("network error: down"));
    }
}
