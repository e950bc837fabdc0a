use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::UpstreamError;

const SERVICE: &str = "search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub link: String,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCandidate {
    pub original: Option<String>,
    pub thumbnail: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageCandidate {
    /// Full-resolution URL, else the thumbnail.
    pub fn best_url(&self) -> Option<&str> {
        self.original
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.thumbnail.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub images: Vec<ImageCandidate>,
}

impl SearchOutcome {
    pub fn links(&self) -> Vec<String> {
        self.results.iter().map(|r| r.link.clone()).collect()
    }

    pub fn first_result(&self) -> Option<&SearchResult> {
        self.results.first()
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, topic: &str) -> Result<SearchOutcome, UpstreamError>;
}

// SerpAPI response format (only the fields we read)
#[derive(Deserialize, Default)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpOrganic>,
    #[serde(default)]
    inline_images: Vec<SerpImage>,
    #[serde(default)]
    images_results: Vec<SerpImage>,
}

#[derive(Deserialize)]
struct SerpOrganic {
    link: Option<String>,
    thumbnail: Option<String>,
}

#[derive(Deserialize)]
struct SerpImage {
    original: Option<String>,
    thumbnail: Option<String>,
    original_width: Option<u32>,
    original_height: Option<u32>,
}

/// SerpAPI-backed search.
pub struct SerpApiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    num_results: u32,
    max_links: usize,
    timeout: Duration,
}

impl SerpApiClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        num_results: u32,
        max_links: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            num_results,
            max_links,
            timeout,
        }
    }

    fn request_url(&self, topic: &str) -> Result<Url, UpstreamError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", topic),
                ("num", self.num_results.to_string().as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        )
        .map_err(|e| UpstreamError::InvalidUrl {
            service: SERVICE,
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    async fn search(&self, topic: &str) -> Result<SearchOutcome, UpstreamError> {
        info!("Searching for: {}", topic);
        let url = self.request_url(topic)?;

        let res = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            // the url carries the api key
            .map_err(|e| UpstreamError::Transport {
                service: SERVICE,
                source: e.without_url(),
            })?;

        if !res.status().is_success() {
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: res.status().as_u16(),
            });
        }

        let body: SerpResponse = res
            .json()
            .await
            .map_err(|e| UpstreamError::Decode {
                service: SERVICE,
                source: e.without_url(),
            })?;

        let outcome = into_outcome(body, self.max_links);
        debug!(
            "Search returned {} links and {} images",
            outcome.results.len(),
            outcome.images.len()
        );
        Ok(outcome)
    }
}

fn into_outcome(body: SerpResponse, max_links: usize) -> SearchOutcome {
    let results = body
        .organic_results
        .into_iter()
        .filter_map(|r| {
            let link = r.link.filter(|l| !l.trim().is_empty())?;
            Some(SearchResult {
                link,
                thumbnail: r.thumbnail.filter(|t| !t.is_empty()),
            })
        })
        .take(max_links)
        .collect();

    let images = body
        .inline_images
        .into_iter()
        .chain(body.images_results)
        .map(|i| ImageCandidate {
            original: i.original,
            thumbnail: i.thumbnail,
            width: i.original_width,
            height: i.original_height,
        })
        .collect();

    SearchOutcome { results, images }
}
