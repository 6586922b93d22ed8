//! Candidate URL validation and domain extraction.

use std::fmt;
use thiserror::Error;

/// Why a candidate URL was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("url is empty")]
    Empty,

    #[error("url exceeds {max} characters")]
    TooLong { max: usize },

    #[error("malformed url: {0}")]
    Malformed(String),

    #[error("unsupported scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("url has no host")]
    MissingHost,
}

/// A normalized lowercase hostname; the cache and lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReputationQuery {
    domain: String,
}

impl ReputationQuery {
    /// Extract the domain from an absolute http(s) URL of at most `max_len` bytes.
    pub fn from_url(raw: &str, max_len: usize) -> Result<Self, UrlError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(UrlError::Empty);
        }
        if raw.len() > max_len {
            return Err(UrlError::TooLong { max: max_len });
        }

        let parsed = url::Url::parse(raw).map_err(|e| UrlError::Malformed(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::UnsupportedScheme(other.to_string())),
        }

        let host = parsed.host_str().ok_or(UrlError::MissingHost)?;
        let domain = host.trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return Err(UrlError::MissingHost);
        }

        Ok(Self { domain })
    }

    /// Wrap an already-normalized domain.
    pub fn from_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().to_ascii_lowercase(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for ReputationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.domain)
    }
}
