//! The check entrypoint: limiter, cache and aggregation wired together.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::aggregation::{AggregateResult, Aggregator};
use crate::cache::CacheStore;
use crate::config::GatewayConfig;
use crate::gateway::error::{BuildError, CheckError};
use crate::observability::metrics;
use crate::query::ReputationQuery;
use crate::resilience::RetryPolicy;
use crate::security::rate_limit::IngressRateLimiter;
use crate::sources::HttpJsonSource;
use crate::time::SharedClock;

/// A served check: the aggregate plus how it was served.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    #[serde(flatten)]
    pub result: AggregateResult,
    /// True when answered from the cache without contacting any source.
    pub cached: bool,
    pub latency_ms: u64,
}

/// Orchestrates a single reputation check.
pub struct ReputationService {
    aggregator: Aggregator,
    cache: Arc<CacheStore>,
    limiter: Option<Arc<IngressRateLimiter>>,
    max_url_length: usize,
}

impl ReputationService {
    pub fn new(
        aggregator: Aggregator,
        cache: Arc<CacheStore>,
        limiter: Option<Arc<IngressRateLimiter>>,
        max_url_length: usize,
    ) -> Self {
        Self {
            aggregator,
            cache,
            limiter,
            max_url_length,
        }
    }

    /// Build the service and its state objects from configuration.
    pub fn from_config(config: &GatewayConfig, clock: SharedClock) -> Result<Self, BuildError> {
        let client = reqwest::Client::builder().build()?;

        let mut aggregator = Aggregator::new(config.aggregation.rate_limit_policy, clock.clone());
        for source_config in config.sources.iter().filter(|s| s.enabled) {
            let source = HttpJsonSource::from_config(source_config, client.clone(), clock.clone())
                .map_err(|error| BuildError::InvalidEndpoint {
                    name: source_config.name.clone(),
                    error,
                })?;
            let retries = source_config.retries.as_ref().unwrap_or(&config.retries);
            aggregator = aggregator.with_source(Arc::new(source), RetryPolicy::from(retries));
            tracing::info!(source = %source_config.name, endpoint = %source_config.endpoint, "Source registered");
        }

        let cache = Arc::new(match &config.cache.persistence_path {
            Some(path) => CacheStore::open(path, config.cache.ttl(), clock.clone()),
            None => CacheStore::new(config.cache.ttl(), clock.clone()),
        });

        let limiter = config.ingress.enabled.then(|| {
            Arc::new(IngressRateLimiter::new(
                config.ingress.limit,
                config.ingress.window(),
                clock.clone(),
            ))
        });

        Ok(Self::new(aggregator, cache, limiter, config.security.max_url_length))
    }

    /// Check `raw_url` on behalf of `client_key`.
    ///
    /// Rate check, then cache lookup, then aggregation and cache write on a
    /// miss. Cache problems never fail a check.
    pub async fn check(&self, client_key: &str, raw_url: &str) -> Result<CheckOutcome, CheckError> {
        let start = Instant::now();
        let outcome = self.check_inner(client_key, raw_url, start).await;

        let label = match &outcome {
            Ok(o) if o.cached => "hit",
            Ok(_) => "miss",
            Err(e) => e.code(),
        };
        metrics::record_check(label, start);
        outcome
    }

    async fn check_inner(
        &self,
        client_key: &str,
        raw_url: &str,
        start: Instant,
    ) -> Result<CheckOutcome, CheckError> {
        if let Some(limiter) = &self.limiter {
            let decision = limiter.allow(client_key);
            if !decision.allowed {
                metrics::record_ingress_rejected();
                return Err(CheckError::IngressRateLimited {
                    limit: decision.limit,
                    remaining: decision.remaining,
                    retry_after: decision.retry_after,
                });
            }
        }

        let query = ReputationQuery::from_url(raw_url, self.max_url_length)?;
        let domain = query.domain();

        match self.cache.lookup(domain) {
            Ok(Some(result)) => {
                metrics::record_cache_lookup("hit");
                tracing::debug!(domain = %domain, "Cache hit");
                return Ok(CheckOutcome {
                    result,
                    cached: true,
                    latency_ms: elapsed_ms(start),
                });
            }
            Ok(None) => metrics::record_cache_lookup("miss"),
            Err(e) => {
                metrics::record_cache_lookup("error");
                tracing::warn!(domain = %domain, error = %e, "Cache read failed, treating as miss");
            }
        }

        let result = match self.aggregator.aggregate(&query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "Aggregation failed");
                return Err(e.into());
            }
        };

        self.cache.put(domain, &result);

        Ok(CheckOutcome {
            result,
            cached: false,
            latency_ms: elapsed_ms(start),
        })
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn limiter(&self) -> Option<&Arc<IngressRateLimiter>> {
        self.limiter.as_ref()
    }

    pub fn source_count(&self) -> usize {
        self.aggregator.source_count()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
