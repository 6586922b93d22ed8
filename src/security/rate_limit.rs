//! Fixed-window ingress rate limiting.

use dashmap::DashMap;
use std::time::Duration;

use crate::time::{as_millis, Millis, SharedClock};

/// Counter for one caller within the current window.
#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: Millis,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch millis at which the caller's window resets.
    pub reset_at: Millis,
    /// Time until `reset_at`, measured when the decision was made.
    pub retry_after: Duration,
}

/// Per-client fixed-window limiter guarding the entrypoint.
pub struct IngressRateLimiter {
    windows: DashMap<String, RateLimitWindow>,
    limit: u32,
    window: Duration,
    clock: SharedClock,
}

impl IngressRateLimiter {
    pub fn new(limit: u32, window: Duration, clock: SharedClock) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
            clock,
        }
    }

    /// Count one request from `client_key` and decide whether to admit it.
    pub fn allow(&self, client_key: &str) -> RateLimitDecision {
        let now = self.clock.now_millis();

        let window_end = now.saturating_add(as_millis(self.window));

        // The entry guard scopes the lock to this read-modify-write.
        let window = {
            let mut entry = self
                .windows
                .entry(client_key.to_string())
                .or_insert_with(|| RateLimitWindow {
                    count: 0,
                    reset_at: window_end,
                });
            if now > entry.reset_at {
                entry.count = 0;
                entry.reset_at = window_end;
            }
            entry.count = entry.count.saturating_add(1);
            *entry
        };

        let allowed = window.count <= self.limit;
        if !allowed {
            tracing::warn!(client = %client_key, count = window.count, "Ingress rate limit exceeded");
        }

        RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(window.count),
            reset_at: window.reset_at,
            retry_after: Duration::from_millis(window.reset_at.saturating_sub(now)),
        }
    }

    /// Drop windows that have already reset. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.windows.len();
        self.windows.retain(|_, w| now <= w.reset_at);
        before.saturating_sub(self.windows.len())
    }

    /// Number of callers currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::Arc;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_window_boundary() {
        let clock = Arc::new(ManualClock::new(10_000));
        let limiter = IngressRateLimiter::new(60, MINUTE, clock.clone());

        for i in 1..=59 {
            let d = limiter.allow("client");
            assert!(d.allowed);
            assert_eq!(d.remaining, 60 - i);
        }

        let sixtieth = limiter.allow("client");
        assert!(sixtieth.allowed);
        assert_eq!(sixtieth.remaining, 0);

        let sixty_first = limiter.allow("client");
        assert!(!sixty_first.allowed);
        assert_eq!(sixty_first.remaining, 0);
        assert_eq!(sixty_first.reset_at, 70_000);
        assert_eq!(sixty_first.retry_after, MINUTE);

        clock.advance(MINUTE + Duration::from_millis(1));
        let fresh = limiter.allow("client");
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 59);
    }

    #[test]
    fn test_retry_after_shrinks_within_window() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = IngressRateLimiter::new(1, MINUTE, clock.clone());
        limiter.allow("c");
        clock.advance(Duration::from_secs(45));

        let d = limiter.allow("c");
        assert!(!d.allowed);
        assert_eq!(d.retry_after, Duration::from_secs(15));
    }

    #[test]
    fn test_first_window_opens_at_epoch_zero() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = IngressRateLimiter::new(1, MINUTE, clock.clone());

        let first = limiter.allow("c");
        assert!(first.allowed);
        assert_eq!(first.reset_at, 60_000);

        clock.advance(Duration::from_secs(45));
        let second = limiter.allow("c");
        assert!(!second.allowed);
        assert_eq!(second.reset_at, 60_000);

        clock.advance(Duration::from_secs(16));
        assert!(limiter.allow("c").allowed);
    }

    #[test]
    fn test_clients_are_independent() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = IngressRateLimiter::new(1, MINUTE, clock);

        assert!(limiter.allow("a").allowed);
        assert!(!limiter.allow("a").allowed);
        assert!(limiter.allow("b").allowed);
    }

    #[test]
    fn test_sweep_drops_stale_windows() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = IngressRateLimiter::new(5, MINUTE, clock.clone());
        limiter.allow("a");
        clock.advance(Duration::from_secs(30));
        limiter.allow("b");
        clock.advance(Duration::from_secs(31));

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
