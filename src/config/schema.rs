//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the reputation gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Result cache settings.
    pub cache: CacheConfig,

    /// Ingress rate limiting.
    pub ingress: IngressConfig,

    /// Default retry policy applied to every source.
    pub retries: RetryConfig,

    /// Aggregation failure policy.
    pub aggregation: AggregationConfig,

    /// Upstream reputation sources.
    pub sources: Vec<SourceConfig>,

    /// Input hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request deadline in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 16 * 1024,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live of an entry in seconds.
    pub ttl_secs: u64,

    /// JSON snapshot file; `None` keeps the cache in memory only.
    pub persistence_path: Option<String>,

    /// Interval between expired-entry sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// Interval between snapshot writes in seconds, when anything changed.
    pub flush_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            persistence_path: None,
            sweep_interval_secs: 60 * 60,
            flush_interval_secs: 30,
        }
    }
}

/// Ingress rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Enable the ingress limiter.
    pub enabled: bool,

    /// Requests allowed per client per window.
    pub limit: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Interval between stale-window sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// Header identifying the caller. Only honoured behind a front end that
    /// sets it; callers are keyed by peer IP when unset.
    pub client_header: Option<String>,
}

impl IngressConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 60,
            window_secs: 60,
            sweep_interval_secs: 300,
            client_header: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,

    /// Upper bound for a single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Random extra delay as a fraction of the computed delay (0.0 - 1.0).
    pub jitter_ratio: f64,

    /// Deadline for a single attempt in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
            jitter_ratio: 0.1,
            attempt_timeout_ms: 5000,
        }
    }
}

/// What to do when a source reports it is rate limited.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Fail the whole aggregation so the caller backs off.
    #[default]
    Propagate,
    /// Treat it like any other source failure.
    Degrade,
}

/// Aggregation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AggregationConfig {
    pub rate_limit_policy: RateLimitPolicy,
}

/// Upstream source definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Unique source identifier.
    pub name: String,

    /// Lookup endpoint; queried as `{endpoint}?domain=<domain>`.
    pub endpoint: String,

    /// Environment variable holding the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-source override of the default retry policy.
    #[serde(default)]
    pub retries: Option<RetryConfig>,
}

fn default_enabled() -> bool {
    true
}

/// Input hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Longest URL accepted by the check endpoint.
    pub max_url_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_url_length: 2048,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
