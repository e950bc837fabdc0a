use std::sync::Arc;
use tracing::info;

use crate::cache::SummaryCache;
use crate::error::ApiError;
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::models::SummaryResponse;
use crate::photo::{Photo, PhotoResolver};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::search::{SearchOutcome, SearchProvider};
use crate::summarize::Summarizer;
use crate::validate::{is_valid_topic, normalize_topic};

/// Result of one pipeline stage.
#[derive(Debug)]
pub enum Outcome<T> {
    Ready(T),
    /// The stage failed but produced a stand-in value the response can carry.
    Degraded { value: T, reason: String },
    Fatal(ApiError),
}

impl<T> Outcome<T> {
    /// Collapse to the value, or stop on a fatal error. Stages log their own
    /// degradation where the cause is known.
    pub fn proceed(self) -> Result<T, ApiError> {
        match self {
            Outcome::Ready(value) | Outcome::Degraded { value, .. } => Ok(value),
            Outcome::Fatal(err) => Err(err),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }
}

/// validate -> rate limit -> cache -> search -> (photo || summary)
///
/// Only validation, the rate limit and search may end the request early;
/// photo and summary failures degrade into the 200 response.
pub struct SummaryPipeline {
    search: Arc<dyn SearchProvider>,
    photos: PhotoResolver,
    summarizer: Summarizer,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<SummaryCache>,
}

impl SummaryPipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        photos: PhotoResolver,
        summarizer: Summarizer,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<SummaryCache>,
    ) -> Self {
        Self {
            search,
            photos,
            summarizer,
            rate_limiter,
            cache,
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    pub async fn run(&self, client_key: &str, topic: Option<&str>) -> Result<SummaryResponse, ApiError> {
        let topic = self.validate_stage(topic).proceed()?;
        self.rate_stage(client_key).proceed()?;

        if let Some(cached) = self.cache.get(&topic) {
            info!("Serving cached summary for {}", topic);
            return Ok(cached);
        }

        let search = self.search_stage(&topic).await.proceed()?;
        let links = search.links();

        let (photo, summary) = tokio::join!(
            self.photos.resolve(&topic, &search),
            self.summarizer.summarize(&topic, &links),
        );

        let cacheable = summary.is_ready();
        let response = into_response(summary.proceed()?, photo);

        if cacheable {
            self.cache.insert(&topic, response.clone());
        }
        Ok(response)
    }

    fn validate_stage(&self, topic: Option<&str>) -> Outcome<String> {
        match topic {
            None => Outcome::Fatal(ApiError::MissingTopic),
            Some(raw) if raw.trim().is_empty() => Outcome::Fatal(ApiError::MissingTopic),
            Some(raw) if !is_valid_topic(raw) => Outcome::Fatal(ApiError::InvalidTopic),
            Some(raw) => Outcome::Ready(normalize_topic(raw)),
        }
    }

    fn rate_stage(&self, client_key: &str) -> Outcome<()> {
        match self.rate_limiter.check(client_key) {
            RateDecision::Allowed => Outcome::Ready(()),
            RateDecision::Denied { retry_after } => {
                RATE_LIMITED_TOTAL.inc();
                info!("Rate limit hit for {}", client_key);
                Outcome::Fatal(ApiError::RateLimited { retry_after })
            }
        }
    }

    async fn search_stage(&self, topic: &str) -> Outcome<SearchOutcome> {
        match self.search.search(topic).await {
            Ok(outcome) if outcome.results.is_empty() => Outcome::Fatal(ApiError::NoResults),
            Ok(outcome) => Outcome::Ready(outcome),
            Err(e) => Outcome::Fatal(ApiError::SearchUnavailable(e)),
        }
    }
}

fn into_response(summary: String, photo: Option<Photo>) -> SummaryResponse {
    match photo {
        Some(p) => SummaryResponse {
            summary,
            photo_url: Some(p.url),
            photo_uncertain: Some(p.uncertain),
        },
        None => SummaryResponse {
            summary,
            photo_url: None,
            photo_uncertain: None,
        },
    }
}
