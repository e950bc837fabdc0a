use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

use crate::metrics::RATE_LIMIT_ENTRIES;

// Rate limit entry - tracks requests per client key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// Fixed-window request counter keyed by client.
///
/// Each key's read-modify-write runs under the DashMap shard lock for that
/// key, so concurrent requests from one client cannot lose an increment.
/// The map holds at most `capacity` keys (soft bound under concurrent
/// inserts of distinct keys): expired windows are evicted first, then the
/// key whose window started earliest.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
    capacity: usize,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
            capacity: capacity.max(1),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        // must run before entry(): evicting while holding a shard guard deadlocks
        if self.entries.len() >= self.capacity && !self.entries.contains_key(key) {
            self.make_room(now);
        }

        let decision = match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(RateLimitEntry {
                    count: 1,
                    window_start: now,
                });
                RateDecision::Allowed
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let elapsed = now.saturating_duration_since(entry.window_start);

                // window expired..? reset it
                if elapsed >= self.window {
                    entry.count = 1;
                    entry.window_start = now;
                    RateDecision::Allowed
                } else if entry.count < self.max_requests {
                    entry.count += 1;
                    RateDecision::Allowed
                } else {
                    RateDecision::Denied {
                        retry_after: self.window - elapsed,
                    }
                }
            }
        };

        RATE_LIMIT_ENTRIES.set(self.entries.len() as f64);
        decision
    }

    /// Current request count for `key` in its open window. `None` when the
    /// key is untracked or its window has elapsed but not yet been swept.
    pub fn usage(&self, key: &str) -> Option<u32> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| now.saturating_duration_since(e.window_start) < self.window)
            .map(|e| e.count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry whose window has elapsed. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.window_start) < self.window);
        let removed = before.saturating_sub(self.entries.len());
        RATE_LIMIT_ENTRIES.set(self.entries.len() as f64);
        removed
    }

    fn make_room(&self, now: Instant) {
        self.sweep_expired(now);
        if self.entries.len() < self.capacity {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().window_start)
            .map(|e| e.key().clone());

        if let Some(key) = oldest {
            tracing::debug!("Rate limiter full, evicting {}", key);
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

    #[test]
    fn allows_up_to_max_then_denies() {
        let limiter = RateLimiter::new(3, WINDOW, 100);
        let t0 = Instant::now();

        for i in 0..3 {
            let now = t0 + Duration::from_secs(i);
            assert!(limiter.check_at("1.2.3.4", now).is_allowed());
        }
        assert_eq!(limiter.usage("1.2.3.4"), Some(3));

        let denied = limiter.check_at("1.2.3.4", t0 + Duration::from_secs(10));
        assert_eq!(
            denied,
            RateDecision::Denied {
                retry_after: WINDOW - Duration::from_secs(10)
            }
        );
        // a denial does not bump the count
        assert_eq!(limiter.usage("1.2.3.4"), Some(3));
    }

    #[test]
    fn window_elapsing_resets_to_one() {
        let limiter = RateLimiter::new(2, WINDOW, 100);
        let t0 = Instant::now();

        assert!(limiter.check_at("client", t0).is_allowed());
        assert!(limiter.check_at("client", t0).is_allowed());
        assert!(!limiter.check_at("client", t0 + Duration::from_secs(1)).is_allowed());

        // boundary is inclusive: exactly one window later is a new window
        assert!(limiter.check_at("client", t0 + WINDOW).is_allowed());
        assert_eq!(limiter.usage("client"), Some(1));
    }

    #[test]
    fn clients_are_counted_independently() {
        let limiter = RateLimiter::new(1, WINDOW, 100);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
        assert!(!limiter.check_at("a", now).is_allowed());
        assert!(!limiter.check_at("b", now).is_allowed());
    }

    #[test]
    fn capacity_evicts_expired_entries_first() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10), 2);
        let t0 = Instant::now();

        limiter.check_at("old", t0);
        limiter.check_at("fresh", t0 + Duration::from_secs(9));
        limiter.check_at("new", t0 + Duration::from_secs(11));

        assert_eq!(limiter.len(), 2);
        assert!(limiter.usage("old").is_none());
        assert_eq!(limiter.usage("fresh"), Some(1));
        assert_eq!(limiter.usage("new"), Some(1));
    }

    #[test]
    fn capacity_evicts_oldest_window_when_nothing_expired() {
        let limiter = RateLimiter::new(5, WINDOW, 2);
        let t0 = Instant::now();

        limiter.check_at("first", t0);
        limiter.check_at("second", t0 + Duration::from_secs(1));
        limiter.check_at("third", t0 + Duration::from_secs(2));

        assert_eq!(limiter.len(), 2);
        assert!(limiter.usage("first").is_none());
        assert!(limiter.usage("second").is_some());
        assert!(limiter.usage("third").is_some());
    }

    #[test]
    fn sweep_removes_only_elapsed_windows() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10), 100);
        let t0 = Instant::now();

        limiter.check_at("stale", t0);
        limiter.check_at("live", t0 + Duration::from_secs(5));

        assert_eq!(limiter.sweep_expired(t0 + Duration::from_secs(12)), 1);
        assert!(limiter.usage("stale").is_none());
        assert_eq!(limiter.usage("live"), Some(1));
    }

    #[test]
    fn usage_ignores_an_elapsed_window_awaiting_sweep() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10), 100);
        limiter.check("client");
        limiter.check("client");
        assert_eq!(limiter.usage("client"), Some(2));

        std::thread::sleep(Duration::from_millis(20));

        // still stored, but no longer counted
        assert_eq!(limiter.len(), 1);
        assert!(limiter.usage("client").is_none());
    }

    #[test]
    fn concurrent_requests_from_one_client_do_not_lose_updates() {
        let limiter = Arc::new(RateLimiter::new(1_000, WINDOW, 100));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        limiter.check_at("same-client", now);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(limiter.usage("same-client"), Some(800));
    }
}
