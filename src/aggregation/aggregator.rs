//! Concurrent fan-out over all configured sources.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::aggregation::scoring::{combined_score, RiskLevel};
use crate::config::RateLimitPolicy;
use crate::observability::metrics;
use crate::query::ReputationQuery;
use crate::resilience::{self, RetryPolicy};
use crate::sources::{ReputationSource, SourceError, SourceResult};
use crate::time::{Millis, SharedClock};

/// The combined opinion of all sources about one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub domain: String,
    /// Mean over the sources that answered.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// One entry per configured source, in configuration order.
    pub sources: Vec<SourceResult>,
    /// Epoch millis at which the sources were consulted.
    pub computed_at: Millis,
}

/// Ways an aggregation can fail as a whole.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregateError {
    /// A source ran out of quota; the caller should back off.
    #[error("source '{source_name}' is rate limited")]
    RateLimited {
        source_name: String,
        retry_after: Option<Duration>,
    },

    /// No source produced an answer.
    #[error("all {attempted} sources unavailable")]
    AllSourcesUnavailable { attempted: usize },
}

struct RegisteredSource {
    source: Arc<dyn ReputationSource>,
    policy: RetryPolicy,
}

/// Fans a query out to every source and combines what comes back.
pub struct Aggregator {
    sources: Vec<RegisteredSource>,
    rate_limit_policy: RateLimitPolicy,
    clock: SharedClock,
}

impl Aggregator {
    pub fn new(rate_limit_policy: RateLimitPolicy, clock: SharedClock) -> Self {
        Self {
            sources: Vec::new(),
            rate_limit_policy,
            clock,
        }
    }

    /// Register a source with its own retry policy.
    pub fn with_source(mut self, source: Arc<dyn ReputationSource>, policy: RetryPolicy) -> Self {
        self.sources.push(RegisteredSource { source, policy });
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Query every source concurrently and wait for all of them to settle.
    ///
    /// Each call runs in its own task so that an abandoned request does not
    /// cancel a source mid-retry; results nobody awaits are dropped.
    pub async fn aggregate(&self, query: &ReputationQuery) -> Result<AggregateResult, AggregateError> {
        let tasks = self.sources.iter().map(|registered| {
            let source = registered.source.clone();
            let policy = registered.policy.clone();
            let domain = query.domain().to_string();
            tokio::spawn(async move {
                let name = source.name().to_string();
                resilience::execute(&name, &policy, || source.check_domain(&domain)).await
            })
        });

        let outcomes = join_all(tasks).await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut rate_limited: Option<(String, Option<Duration>)> = None;

        for (registered, outcome) in self.sources.iter().zip(outcomes) {
            let name = registered.source.name();
            let outcome = outcome
                .unwrap_or_else(|e| Err(SourceError::Fatal(format!("source task failed: {}", e))))
                .and_then(|result| normalize(name, result));

            match outcome {
                Ok(result) => {
                    metrics::record_source_call(name, "ok");
                    results.push(result);
                }
                Err(error) => {
                    metrics::record_source_call(name, error.kind().as_str());
                    if let SourceError::RateLimited { retry_after } = &error {
                        if self.rate_limit_policy == RateLimitPolicy::Propagate {
                            rate_limited = Some(match rate_limited.take() {
                                None => (name.to_string(), *retry_after),
                                Some((first, previous)) => (first, previous.max(*retry_after)),
                            });
                        }
                    }
                    tracing::warn!(
                        domain = %query,
                        source = %name,
                        error = %error,
                        "Source degraded"
                    );
                    results.push(SourceResult::failed(name, &error));
                }
            }
        }

        if let Some((source_name, retry_after)) = rate_limited {
            return Err(AggregateError::RateLimited {
                source_name,
                retry_after,
            });
        }

        let risk_score = combined_score(&results).ok_or(AggregateError::AllSourcesUnavailable {
            attempted: self.sources.len(),
        })?;

        let result = AggregateResult {
            domain: query.domain().to_string(),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            sources: results,
            computed_at: self.clock.now_millis(),
        };

        tracing::debug!(
            domain = %result.domain,
            score = result.risk_score,
            level = %result.risk_level,
            "Aggregation complete"
        );

        Ok(result)
    }
}

/// Re-key an adapter's answer under the registered name and clamp its score.
/// An answer without a usable score counts as a fatal source failure.
fn normalize(name: &str, result: SourceResult) -> Result<SourceResult, SourceError> {
    match (result.succeeded, result.risk_score) {
        (true, Some(score)) => Ok(SourceResult::success(name, score, result.detail)),
        _ => Err(SourceError::Fatal("answer carried no usable score".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{Behavior, MockSource};
    use crate::time::SystemClock;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(100),
            jitter_ratio: 0.0,
            attempt_timeout: Duration::from_secs(1),
            is_retryable: SourceError::is_retryable,
        }
    }

    fn aggregator(policy: RateLimitPolicy, sources: &[Arc<MockSource>]) -> Aggregator {
        sources.iter().fold(Aggregator::new(policy, Arc::new(SystemClock)), |agg, s| {
            agg.with_source(s.clone(), fast_policy())
        })
    }

    fn query() -> ReputationQuery {
        ReputationQuery::from_domain("example.com")
    }

    #[tokio::test]
    async fn test_combines_all_successes() {
        let a = MockSource::new("a", Behavior::Score(10.0));
        let b = MockSource::new("b", Behavior::Score(20.0));
        let result = aggregator(RateLimitPolicy::Propagate, &[a, b])
            .aggregate(&query())
            .await
            .unwrap();

        assert_eq!(result.risk_score, 15.0);
        assert_eq!(result.risk_level, RiskLevel::Safe);
        assert_eq!(result.domain, "example.com");
        let names: Vec<_> = result.sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let down = MockSource::new("down", Behavior::Fail(SourceError::Network("refused".into())));
        let up = MockSource::new("up", Behavior::Score(70.0));
        let result = aggregator(RateLimitPolicy::Propagate, &[down.clone(), up])
            .aggregate(&query())
            .await
            .unwrap();

        assert_eq!(result.risk_score, 70.0);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(down.calls(), 3);
        assert!(!result.sources[0].succeeded);
        assert!(result.sources[0].risk_score.is_none());
        assert!(result.sources[1].succeeded);
    }

    #[tokio::test]
    async fn test_total_failure() {
        let a = MockSource::new("a", Behavior::Fail(SourceError::Network("refused".into())));
        let b = MockSource::new("b", Behavior::Fail(SourceError::Network("refused".into())));
        let err = aggregator(RateLimitPolicy::Propagate, &[a, b])
            .aggregate(&query())
            .await
            .unwrap_err();

        assert_eq!(err, AggregateError::AllSourcesUnavailable { attempted: 2 });
    }

    #[tokio::test]
    async fn test_rate_limit_propagates_over_success() {
        let limited = MockSource::new(
            "limited",
            Behavior::Fail(SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(60)),
            }),
        );
        let healthy = MockSource::new("healthy", Behavior::Score(5.0));
        let err = aggregator(RateLimitPolicy::Propagate, &[limited.clone(), healthy.clone()])
            .aggregate(&query())
            .await
            .unwrap_err();

        assert_eq!(limited.calls(), 1);
        assert_eq!(healthy.calls(), 1);
        assert_eq!(
            err,
            AggregateError::RateLimited {
                source_name: "limited".into(),
                retry_after: Some(Duration::from_secs(60)),
            }
        );
    }

    #[tokio::test]
    async fn test_rate_limit_degrades_when_configured() {
        let limited = MockSource::new("limited", Behavior::Fail(SourceError::RateLimited { retry_after: None }));
        let healthy = MockSource::new("healthy", Behavior::Score(45.0));
        let result = aggregator(RateLimitPolicy::Degrade, &[limited, healthy])
            .aggregate(&query())
            .await
            .unwrap();

        assert_eq!(result.risk_score, 45.0);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(!result.sources[0].succeeded);
    }

    #[tokio::test]
    async fn test_auth_failure_degrades_without_retry() {
        let bad_key = MockSource::new("bad_key", Behavior::Fail(SourceError::Unauthorized("401".into())));
        let ok = MockSource::new("ok", Behavior::Score(90.0));
        let result = aggregator(RateLimitPolicy::Propagate, &[bad_key.clone(), ok])
            .aggregate(&query())
            .await
            .unwrap();

        assert_eq!(bad_key.calls(), 1);
        assert_eq!(result.risk_level, RiskLevel::Dangerous);
    }

    #[tokio::test]
    async fn test_no_sources_is_unavailable() {
        let err = aggregator(RateLimitPolicy::Propagate, &[])
            .aggregate(&query())
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::AllSourcesUnavailable { attempted: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_run_concurrently() {
        let a = MockSource::new("a", Behavior::Slow(Duration::from_millis(800), 30.0));
        let b = MockSource::new("b", Behavior::Slow(Duration::from_millis(800), 50.0));
        let agg = aggregator(RateLimitPolicy::Propagate, &[a, b]);

        let start = tokio::time::Instant::now();
        let result = agg.aggregate(&query()).await.unwrap();

        assert_eq!(result.risk_score, 40.0);
        assert!(start.elapsed() < Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn test_adapter_answers_are_normalized() {
        let loud = MockSource::new(
            "loud",
            Behavior::Raw(SourceResult {
                source: "renamed".into(),
                risk_score: Some(250.0),
                detail: serde_json::Value::Null,
                succeeded: true,
                error: None,
            }),
        );
        let confused = MockSource::new(
            "confused",
            Behavior::Raw(SourceResult {
                source: "confused".into(),
                risk_score: Some(90.0),
                detail: serde_json::Value::Null,
                succeeded: false,
                error: None,
            }),
        );

        let result = aggregator(RateLimitPolicy::Propagate, &[loud, confused.clone()])
            .aggregate(&query())
            .await
            .unwrap();

        assert_eq!(result.risk_score, 100.0);
        assert_eq!(result.risk_level, RiskLevel::Dangerous);
        assert_eq!(result.sources[0].source, "loud");
        assert_eq!(result.sources[0].risk_score, Some(100.0));
        assert!(!result.sources[1].succeeded);
        assert!(result.sources[1].risk_score.is_none());
        assert_eq!(confused.calls(), 1, "fatal answers are not retried");
    }
}
