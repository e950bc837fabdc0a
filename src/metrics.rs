use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("summarizer_requests_total", "Total number of summarize requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("summarizer_rate_limited_total", "Requests denied by the rate limiter").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("summarizer_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("summarizer_cache_misses_total", "Total cache misses").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "summarizer_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("summarizer_cache_size", "Current number of items in cache").unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge =
        register_gauge!("summarizer_rate_limit_entries", "Clients tracked by the rate limiter").unwrap();
    pub static ref PHOTO_SOURCE: CounterVec = register_counter_vec!(
        "summarizer_photo_source_total",
        "Resolved photos by the fallback step that produced them",
        &["source"]
    )
    .unwrap();
    pub static ref SUMMARY_DEGRADED: Counter = register_counter!(
        "summarizer_summary_degraded_total",
        "Responses served with the placeholder summary"
    )
    .unwrap();
}
