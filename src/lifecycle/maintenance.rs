//! Periodic housekeeping for the cache and the ingress limiter.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::cache::CacheStore;
use crate::security::rate_limit::IngressRateLimiter;

/// Sweeps expired cache entries and stale limiter windows, and writes the
/// cache snapshot when it changed, until shutdown.
pub struct Maintenance {
    cache: Arc<CacheStore>,
    sweep_interval: Duration,
    flush_interval: Duration,
    limiter: Option<(Arc<IngressRateLimiter>, Duration)>,
}

impl Maintenance {
    pub fn new(cache: Arc<CacheStore>, sweep_interval: Duration, flush_interval: Duration) -> Self {
        Self {
            cache,
            sweep_interval,
            flush_interval,
            limiter: None,
        }
    }

    pub fn with_limiter(mut self, limiter: Arc<IngressRateLimiter>, interval: Duration) -> Self {
        self.limiter = Some((limiter, interval));
        self
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            sweep_interval = ?self.sweep_interval,
            flush_interval = ?self.flush_interval,
            limiter_interval = ?self.limiter.as_ref().map(|(_, i)| *i),
            "Maintenance loop starting"
        );

        let mut sweep_ticker = time::interval(self.sweep_interval);
        sweep_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut flush_ticker = time::interval(self.flush_interval);
        flush_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Without a limiter this ticker is never polled.
        let limiter_period = self
            .limiter
            .as_ref()
            .map(|(_, i)| *i)
            .unwrap_or(self.sweep_interval);
        let mut limiter_ticker = time::interval(limiter_period);
        limiter_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = sweep_ticker.tick() => {
                    self.sweep_cache();
                }
                _ = flush_ticker.tick() => {
                    self.flush_cache().await;
                }
                _ = limiter_ticker.tick(), if self.limiter.is_some() => {
                    self.sweep_limiter();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Maintenance loop received shutdown signal, exiting");
                    break;
                }
            }
        }

        if let Err(e) = self.cache.flush().await {
            tracing::warn!(error = %e, "Final cache flush failed");
        }
    }

    fn sweep_cache(&self) {
        let removed = self.cache.purge_expired();
        if removed > 0 {
            tracing::info!(removed, remaining = self.cache.len(), "Swept expired cache entries");
        }
    }

    async fn flush_cache(&self) {
        match self.cache.flush_if_dirty().await {
            Ok(true) => tracing::debug!(entries = self.cache.len(), "Cache snapshot flushed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "Cache snapshot flush failed"),
        }
    }

    fn sweep_limiter(&self) {
        if let Some((limiter, _)) = &self.limiter {
            let removed = limiter.sweep();
            if removed > 0 {
                tracing::debug!(removed, tracked = limiter.tracked_clients(), "Swept stale rate-limit windows");
            }
        }
    }
}
