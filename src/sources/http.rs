//! Generic JSON-over-HTTP source adapter.
//!
//! Queries `GET {endpoint}?domain=<domain>` and expects
//! `{ "risk_score": <number>, "detail": <any> }`. Status codes are folded
//! into the `SourceError` kinds; after a 429 carrying `Retry-After` the
//! adapter refuses further calls locally until the advertised instant.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::SourceConfig;
use crate::sources::{ReputationSource, SourceError, SourceResult};
use crate::time::{as_millis, SharedClock};

#[derive(Debug, Deserialize)]
struct LookupResponse {
    risk_score: f64,
    #[serde(default)]
    detail: serde_json::Value,
}

/// A provider reachable through a simple JSON lookup endpoint.
pub struct HttpJsonSource {
    name: String,
    endpoint: url::Url,
    api_key: Option<String>,
    client: Client,
    clock: SharedClock,
    /// Epoch millis before which the provider asked us not to call.
    blocked_until: AtomicU64,
}

impl HttpJsonSource {
    /// Build an adapter from its configuration.
    ///
    /// The API key is read from the configured environment variable; a missing
    /// variable is logged and requests go out unauthenticated.
    pub fn from_config(config: &SourceConfig, client: Client, clock: SharedClock) -> Result<Self, url::ParseError> {
        let endpoint = url::Url::parse(&config.endpoint)?;

        let api_key = config.api_key_env.as_ref().and_then(|var| match std::env::var(var) {
            Ok(key) => Some(key),
            Err(_) => {
                tracing::warn!(source = %config.name, env = %var, "API key variable not set");
                None
            }
        });

        Ok(Self {
            name: config.name.clone(),
            endpoint,
            api_key,
            client,
            clock,
            blocked_until: AtomicU64::new(0),
        })
    }

    fn lookup_url(&self, domain: &str) -> url::Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("domain", domain);
        url
    }

    fn remaining_block(&self) -> Option<Duration> {
        let until = self.blocked_until.load(Ordering::Relaxed);
        let now = self.clock.now_millis();
        (until > now).then(|| Duration::from_millis(until - now))
    }

    fn block_for(&self, retry_after: Duration) {
        let until = self.clock.now_millis().saturating_add(as_millis(retry_after));
        self.blocked_until.fetch_max(until, Ordering::Relaxed);
    }
}

fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Fold a non-success status into a source error.
fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SourceError::Unauthorized(format!("upstream returned {}", status))
        }
        s if s.is_server_error() => SourceError::Network(format!("upstream returned {}", s)),
        s => SourceError::Fatal(format!("upstream returned {}", s)),
    }
}

#[async_trait]
impl ReputationSource for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_domain(&self, domain: &str) -> Result<SourceResult, SourceError> {
        if let Some(remaining) = self.remaining_block() {
            return Err(SourceError::RateLimited {
                retry_after: Some(remaining),
            });
        }

        let mut request = self.client.get(self.lookup_url(domain));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            if let (StatusCode::TOO_MANY_REQUESTS, Some(after)) = (status, retry_after) {
                self.block_for(after);
            }
            return Err(classify_status(status, retry_after));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Fatal(format!("unparseable response: {}", e)))?;

        Ok(SourceResult::success(&self.name, body.risk_score, body.detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::Arc;

    fn source(clock: Arc<ManualClock>) -> HttpJsonSource {
        let config = SourceConfig {
            name: "alpha".into(),
            endpoint: "http://127.0.0.1:1/v1/lookup?format=json".into(),
            api_key_env: None,
            enabled: true,
            retries: None,
        };
        HttpJsonSource::from_config(&config, Client::new(), clock).unwrap()
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(9))),
            SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(9))
            }
        );
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None),
            SourceError::Unauthorized(_)
        ));
        assert!(classify_status(StatusCode::BAD_GATEWAY, None).is_retryable());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None),
            SourceError::Fatal(_)
        ));
    }

    #[test]
    fn test_lookup_url_keeps_existing_query() {
        let s = source(Arc::new(ManualClock::new(0)));
        let url = s.lookup_url("example.com");
        assert_eq!(url.as_str(), "http://127.0.0.1:1/v1/lookup?format=json&domain=example.com");
    }

    #[tokio::test]
    async fn test_blocked_source_short_circuits() {
        let clock = Arc::new(ManualClock::new(1_000));
        let s = source(clock.clone());
        s.block_for(Duration::from_secs(30));

        let err = s.check_domain("example.com").await.unwrap_err();
        assert_eq!(
            err,
            SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(30))
            }
        );

        clock.advance(Duration::from_secs(31));
        assert!(s.remaining_block().is_none());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = SourceConfig {
            name: "bad".into(),
            endpoint: "not a url".into(),
            api_key_env: None,
            enabled: true,
            retries: None,
        };
        let result = HttpJsonSource::from_config(&config, Client::new(), Arc::new(ManualClock::new(0)));
        assert!(matches!(result, Err(url::ParseError::RelativeUrlWithoutBase)));
    }
}
