//! Reputation result cache with TTL expiry and snapshot persistence.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::aggregation::{AggregateResult, RiskLevel};
use crate::observability::metrics;
use crate::sources::SourceResult;
use crate::time::{as_millis, Millis, SharedClock};

/// Cache failures. Always handled locally, never surfaced to callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt cache entry for '{domain}': {reason}")]
    Corrupt { domain: String, reason: String },
}

/// One cached aggregation for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub domain: String,
    /// Per-source results serialized as a JSON array.
    pub payload: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// When the sources were consulted (epoch millis).
    pub computed_at: Millis,
    pub created_at: Millis,
    pub expires_at: Millis,
}

impl CacheEntry {
    /// Logically expired once `now` is past `expires_at`.
    pub fn is_expired(&self, now: Millis) -> bool {
        now > self.expires_at
    }

    /// Rebuild the aggregate this entry was created from.
    pub fn to_result(&self) -> Result<AggregateResult, CacheError> {
        let sources: Vec<SourceResult> =
            serde_json::from_str(&self.payload).map_err(|e| CacheError::Corrupt {
                domain: self.domain.clone(),
                reason: e.to_string(),
            })?;

        Ok(AggregateResult {
            domain: self.domain.clone(),
            risk_score: self.risk_score,
            risk_level: self.risk_level,
            sources,
            computed_at: self.computed_at,
        })
    }
}

/// A thread-safe, optionally persistent cache keyed by domain.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: SharedClock,
    persistence_path: Option<PathBuf>,
    /// Set by writes since the last successful snapshot.
    dirty: AtomicBool,
    /// Serializes snapshot writers so renames never interleave.
    flush_lock: Mutex<()>,
}

impl CacheStore {
    /// Create an empty in-memory cache.
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            persistence_path: None,
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    /// Create a cache persisted to `path`, loading any existing snapshot.
    ///
    /// An unreadable snapshot is logged and the cache starts empty; the next
    /// write replaces the file.
    pub fn open(path: impl AsRef<Path>, ttl: Duration, clock: SharedClock) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::new(ttl, clock);
        if let Err(e) = store.load_snapshot(&path) {
            tracing::error!(path = %path.display(), error = %e, "Failed to load cache snapshot, starting empty");
            store.entries.clear();
        }
        store.persistence_path = Some(path);
        metrics::record_cache_size(store.entries.len());
        store
    }

    fn load_snapshot(&self, path: &Path) -> Result<(), CacheError> {
        if !path.exists() {
            return Ok(());
        }
        let content = std::fs::read(path)?;
        let map: HashMap<String, CacheEntry> = serde_json::from_slice(&content)?;

        let now = self.clock.now_millis();
        let mut skipped = 0usize;
        for (domain, entry) in map {
            if entry.is_expired(now) {
                skipped += 1;
                continue;
            }
            self.entries.insert(domain, entry);
        }
        tracing::info!(
            loaded = self.entries.len(),
            expired = skipped,
            "Loaded cache snapshot"
        );
        Ok(())
    }

    /// The live entry for `domain`, or `None` when absent or expired.
    pub fn get(&self, domain: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();
        self.entries
            .get(domain)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value().clone())
    }

    /// The cached aggregate for `domain`, if one is live and decodable.
    pub fn lookup(&self, domain: &str) -> Result<Option<AggregateResult>, CacheError> {
        self.get(domain).map(|entry| entry.to_result()).transpose()
    }

    /// Replace whatever is cached for `domain` with `result`.
    ///
    /// Only memory is touched; the snapshot is written later by
    /// [`CacheStore::flush_if_dirty`]. Failures are logged and swallowed.
    pub fn put(&self, domain: &str, result: &AggregateResult) {
        if let Err(e) = self.try_put(domain, result) {
            tracing::warn!(domain = %domain, error = %e, "Cache write failed");
        }
    }

    fn try_put(&self, domain: &str, result: &AggregateResult) -> Result<(), CacheError> {
        let now = self.clock.now_millis();
        let entry = CacheEntry {
            domain: domain.to_string(),
            payload: serde_json::to_string(&result.sources)?,
            risk_score: result.risk_score,
            risk_level: result.risk_level,
            computed_at: result.computed_at,
            created_at: now,
            expires_at: now.saturating_add(as_millis(self.ttl)),
        };

        // Whole-entry replacement under the shard lock; the old entry is dropped.
        self.entries.insert(domain.to_string(), entry);
        self.dirty.store(true, Ordering::Release);
        metrics::record_cache_size(self.entries.len());
        Ok(())
    }

    /// Physically remove expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.dirty.store(true, Ordering::Release);
        }
        metrics::record_cache_size(self.entries.len());
        removed
    }

    /// Whether the snapshot lags behind memory.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write the snapshot only if something changed since the last one.
    /// Returns whether a write happened.
    pub async fn flush_if_dirty(&self) -> Result<bool, CacheError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.flush().await.map(|()| true)
    }

    /// Write the current contents to the snapshot file, if one is configured.
    pub async fn flush(&self) -> Result<(), CacheError> {
        let Some(path) = &self.persistence_path else {
            self.dirty.store(false, Ordering::Release);
            return Ok(());
        };

        let _guard = self.flush_lock.lock().await;
        // Cleared before copying so writes racing the copy mark it again.
        self.dirty.store(false, Ordering::Release);
        let result = self.write_snapshot(path).await;
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    async fn write_snapshot(&self, path: &Path) -> Result<(), CacheError> {
        let snapshot: HashMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        let bytes = serde_json::to_vec(&snapshot)?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!(entries = snapshot.len(), path = %path.display(), "Cache snapshot written");
        Ok(())
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
