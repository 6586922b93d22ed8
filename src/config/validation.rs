//! Configuration validation.
//!
//! Serde handles syntax; these checks cover value ranges and cross-field
//! consistency. All problems are collected rather than stopping at the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, RetryConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be positive"));
    }

    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be positive"));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("cache.sweep_interval_secs", "must be positive"));
    }
    if config.cache.flush_interval_secs == 0 {
        errors.push(ValidationError::new("cache.flush_interval_secs", "must be positive"));
    }

    if config.ingress.enabled {
        if config.ingress.limit == 0 {
            errors.push(ValidationError::new("ingress.limit", "must be positive"));
        }
        if config.ingress.window_secs == 0 {
            errors.push(ValidationError::new("ingress.window_secs", "must be positive"));
        }
        if config.ingress.sweep_interval_secs == 0 {
            errors.push(ValidationError::new("ingress.sweep_interval_secs", "must be positive"));
        }
        if let Some(header) = &config.ingress.client_header {
            let valid = !header.is_empty()
                && header.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
            if !valid {
                errors.push(ValidationError::new("ingress.client_header", "must be a valid header name"));
            }
        }
    }

    validate_retries("retries", &config.retries, &mut errors);

    if config.security.max_url_length == 0 {
        errors.push(ValidationError::new("security.max_url_length", "must be positive"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    let mut names = HashSet::new();
    for (i, source) in config.sources.iter().enumerate() {
        let prefix = format!("sources[{}]", i);
        if source.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.name", prefix), "must not be empty"));
        } else if !names.insert(source.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", prefix),
                format!("duplicate source name '{}'", source.name),
            ));
        }

        match url::Url::parse(&source.endpoint) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            _ => errors.push(ValidationError::new(
                format!("{}.endpoint", prefix),
                "must be an absolute http(s) URL",
            )),
        }

        if let Some(retries) = &source.retries {
            validate_retries(&format!("{}.retries", prefix), retries, &mut errors);
        }
    }

    if !config.sources.iter().any(|s| s.enabled) {
        errors.push(ValidationError::new("sources", "at least one enabled source is required"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_retries(prefix: &str, retries: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new(format!("{}.max_attempts", prefix), "must be at least 1"));
    }
    if !(retries.backoff_factor >= 1.0) {
        errors.push(ValidationError::new(
            format!("{}.backoff_factor", prefix),
            "must be at least 1.0",
        ));
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new(
            format!("{}.jitter_ratio", prefix),
            "must be between 0.0 and 1.0",
        ));
    }
    if retries.attempt_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{}.attempt_timeout_ms", prefix),
            "must be positive",
        ));
    }
}
