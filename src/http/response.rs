//! Error-to-response mapping.

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

use crate::gateway::CheckError;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// JSON body returned for every failed check.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Whole seconds, rounded up so clients never retry early.
fn ceil_secs(d: Duration) -> u64 {
    d.as_millis().div_ceil(1000) as u64
}

impl IntoResponse for CheckError {
    fn into_response(self) -> Response {
        let status = match &self {
            CheckError::Validation(_) => StatusCode::BAD_REQUEST,
            CheckError::IngressRateLimited { .. } | CheckError::UpstreamRateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            CheckError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        };

        let retry_after_secs = self.retry_after().map(ceil_secs);
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
            retry_after_secs,
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();

        if let Some(secs) = retry_after_secs {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if let CheckError::IngressRateLimited { limit, remaining, .. } = self {
            headers.insert(HeaderName::from_static(X_RATELIMIT_LIMIT), HeaderValue::from(limit));
            headers.insert(
                HeaderName::from_static(X_RATELIMIT_REMAINING),
                HeaderValue::from(remaining),
            );
        }

        response
    }
}
