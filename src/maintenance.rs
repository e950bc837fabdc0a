use std::sync::Arc;
use std::time::Instant;
use tokio::time::{Duration, interval};
use tracing::{debug, info};

use crate::cache::SummaryCache;
use crate::rate_limit::RateLimiter;

// Sweeper - drops expired rate-limit windows and cache entries on a fixed interval
pub async fn sweeper(limiter: Arc<RateLimiter>, cache: Arc<SummaryCache>, every: Duration) {
    let mut interval = interval(every);

    info!("Sweeper started (interval: {:?})", every);

    loop {
        interval.tick().await;
        sweep_once(&limiter, &cache, Instant::now());
    }
}

pub fn sweep_once(limiter: &RateLimiter, cache: &SummaryCache, now: Instant) -> (usize, usize) {
    let windows = limiter.sweep_expired(now);
    let entries = cache.purge_expired();
    if windows > 0 || entries > 0 {
        debug!(
            "Swept {} rate-limit windows and {} cache entries ({} clients tracked)",
            windows,
            entries,
            limiter.len()
        );
    }
    (windows, entries)
}
