use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE};
use crate::models::SummaryResponse;

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub response: SummaryResponse,
    pub created_at: Instant,
}

// Cache key: hash of the case-folded, whitespace-normalized topic
pub fn make_cache_key(topic: &str) -> String {
    let normalized = topic.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Successful summaries kept for `ttl`. A zero TTL disables caching.
pub struct SummaryCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, topic: &str) -> Option<SummaryResponse> {
        if !self.is_enabled() {
            return None;
        }
        let key = make_cache_key(topic);
        if let Some(entry) = self.entries.get(&key) {
            if entry.created_at.elapsed() < self.ttl {
                CACHE_HITS.inc();
                return Some(entry.response.clone());
            }
        }
        CACHE_MISSES.inc();
        None
    }

    pub fn insert(&self, topic: &str, response: SummaryResponse) {
        if !self.is_enabled() {
            return;
        }
        self.entries.insert(
            make_cache_key(topic),
            CacheEntry {
                response,
                created_at: Instant::now(),
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.created_at.elapsed() < self.ttl);
        CACHE_SIZE.set(self.entries.len() as f64);
        before.saturating_sub(self.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> SummaryResponse {
        SummaryResponse {
            summary: text.to_string(),
            photo_url: None,
            photo_uncertain: None,
        }
    }

    #[test]
    fn key_ignores_case_and_spacing() {
        assert_eq!(make_cache_key("Ada Lovelace"), make_cache_key("  ada   LOVELACE "));
        assert_ne!(make_cache_key("Ada Lovelace"), make_cache_key("Ada King"));
        assert_eq!(make_cache_key("x").len(), 64);
    }

    #[test]
    fn returns_fresh_entries() {
        let cache = SummaryCache::new(Duration::from_secs(60));
        cache.insert("Ada Lovelace", response("summary"));
        assert_eq!(cache.get("ada lovelace"), Some(response("summary")));
        assert!(cache.get("Grace Hopper").is_none());
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let cache = SummaryCache::new(Duration::ZERO);
        cache.insert("Ada Lovelace", response("summary"));
        assert!(cache.is_empty());
        assert!(cache.get("Ada Lovelace").is_none());
    }

    #[test]
    fn purge_drops_expired_entries() {
        let cache = SummaryCache::new(Duration::from_millis(10));
        cache.insert("Ada Lovelace", response("summary"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("Ada Lovelace").is_none());
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }
}
