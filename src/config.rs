use clap::Parser;
use std::time::Duration;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "profile-summarizer")]
#[command(about = "Summarizes a person from web search results, with a best-effort photo")]
pub struct Args {
    /// Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Search provider API key
    #[arg(long, env = "SERPAPI_API_KEY", hide_env_values = true)]
    pub serpapi_key: String,

    /// Language-model API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_key: String,

    /// Rate limit max requests per window (at least 1)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    /// Rate limit window in seconds
    #[arg(long, default_value_t = 7200)]
    pub rate_window: u64,

    /// Max number of clients tracked by the rate limiter
    #[arg(long, default_value_t = 10_000)]
    pub rate_capacity: usize,

    /// Key the rate limiter on X-Forwarded-For / X-Real-IP instead of the peer address
    #[arg(long, default_value_t = false)]
    pub trust_proxy: bool,

    /// Summary cache TTL in seconds (0 disables the cache)
    #[arg(short, long, default_value_t = 600)]
    pub cache_ttl: u64,

    /// Interval in seconds between sweeps of expired limiter/cache entries
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    /// Number of results requested from the search provider
    #[arg(long, default_value_t = 20)]
    pub search_results: u32,

    /// Max number of links handed to the summarizer
    #[arg(long, default_value_t = 20)]
    pub max_links: usize,

    /// Chat-completion model name
    #[arg(long, default_value = "gpt-3.5-turbo")]
    pub model: String,

    #[arg(long, default_value = "https://serpapi.com/search.json")]
    pub search_url: String,

    #[arg(long, default_value = "https://api.openai.com/v1/chat/completions")]
    pub completion_url: String,

    /// Encyclopedia page-summary endpoint; the page title is appended as a path segment
    #[arg(long, default_value = "https://en.wikipedia.org/api/rest_v1/page/summary")]
    pub encyclopedia_url: String,

    /// Timeout in seconds for encyclopedia lookups and page fetches
    #[arg(long, default_value_t = 5)]
    pub photo_timeout: u64,

    /// Timeout in seconds for search and completion calls
    #[arg(long, default_value_t = 30)]
    pub upstream_timeout: u64,

    /// Accept photos of any aspect ratio
    #[arg(long, default_value_t = false)]
    pub no_portrait_filter: bool,
}

impl Args {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        // interval() panics on a zero period
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn photo_timeout(&self) -> Duration {
        Duration::from_secs(self.photo_timeout)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let args = Args::parse_from([
            "profile-summarizer",
            "--serpapi-key",
            "s",
            "--openai-key",
            "o",
        ]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.rate_limit, 10);
        assert_eq!(args.rate_window(), Duration::from_secs(2 * 60 * 60));
        assert_eq!(args.max_links, 20);
        assert!(!args.trust_proxy);
        assert!(!args.no_portrait_filter);
    }

    #[test]
    fn zero_sweep_interval_is_clamped() {
        let args = Args::parse_from([
            "profile-summarizer",
            "--serpapi-key",
            "s",
            "--openai-key",
            "o",
            "--sweep-interval",
            "0",
        ]);
        assert_eq!(args.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let base = ["profile-summarizer", "--serpapi-key", "s", "--openai-key", "o"];
        let zero = Args::try_parse_from(base.iter().copied().chain(["--rate-limit", "0"]));
        assert!(zero.is_err());

        let one = Args::try_parse_from(base.iter().copied().chain(["--rate-limit", "1"])).unwrap();
        assert_eq!(one.rate_limit, 1);
    }
}
