use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::UpstreamError;
use crate::metrics::PHOTO_SOURCE;
use crate::search::{ImageCandidate, SearchOutcome};

const ENCYCLOPEDIA: &str = "encyclopedia";
const PAGE: &str = "page";

// Only the head of a page is downloaded and scanned for preview tags
const MAX_SCAN_BYTES: usize = 512 * 1024;
const HEAD_END: &[u8] = b"</head>";

// In order of preference
const PREVIEW_SELECTORS: &[&str] = &[
    "meta[property=\"og:image\"]",
    "meta[property=\"og:image:url\"]",
    "meta[property=\"og:image:secure_url\"]",
    "meta[name=\"twitter:image\"]",
    "meta[property=\"twitter:image\"]",
];

const MIN_PORTRAIT_RATIO: f64 = 0.6;
const MAX_PORTRAIT_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    Encyclopedia,
    SearchImage,
    ResultThumbnail,
    PagePreview,
}

impl PhotoSource {
    pub fn label(&self) -> &'static str {
        match self {
            PhotoSource::Encyclopedia => "encyclopedia",
            PhotoSource::SearchImage => "search_image",
            PhotoSource::ResultThumbnail => "result_thumbnail",
            PhotoSource::PagePreview => "page_preview",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub url: String,
    pub uncertain: bool,
    pub source: PhotoSource,
}

/// Outbound lookups the resolver depends on.
#[async_trait]
pub trait PhotoSources: Send + Sync {
    /// Canonical image of the topic's encyclopedia page, if the page exists and has one.
    async fn encyclopedia_image(&self, topic: &str) -> Result<Option<ImageCandidate>, UpstreamError>;

    /// Raw HTML of `url`.
    async fn fetch_page(&self, url: &str) -> Result<String, UpstreamError>;
}

// Wikipedia REST page summary (only the fields we read)
#[derive(Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    originalimage: Option<PageImage>,
    thumbnail: Option<PageImage>,
}

#[derive(Deserialize)]
struct PageImage {
    source: String,
    width: Option<u32>,
    height: Option<u32>,
}

pub struct HttpPhotoSources {
    client: reqwest::Client,
    encyclopedia_url: String,
    timeout: Duration,
}

impl HttpPhotoSources {
    pub fn new(client: reqwest::Client, encyclopedia_url: String, timeout: Duration) -> Self {
        Self {
            client,
            encyclopedia_url,
            timeout,
        }
    }

    fn page_url(&self, topic: &str) -> Result<Url, UpstreamError> {
        let invalid = |detail: String| UpstreamError::InvalidUrl {
            service: ENCYCLOPEDIA,
            detail,
        };
        let mut url = Url::parse(&self.encyclopedia_url).map_err(|e| invalid(e.to_string()))?;
        let title = topic.split_whitespace().collect::<Vec<_>>().join("_");
        url.path_segments_mut()
            .map_err(|_| invalid("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(&title);
        Ok(url)
    }
}

#[async_trait]
impl PhotoSources for HttpPhotoSources {
    async fn encyclopedia_image(&self, topic: &str) -> Result<Option<ImageCandidate>, UpstreamError> {
        let url = self.page_url(topic)?;
        let res = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { service: ENCYCLOPEDIA, source })?;

        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            return Err(UpstreamError::Status {
                service: ENCYCLOPEDIA,
                status: res.status().as_u16(),
            });
        }

        let page: PageSummary = res
            .json()
            .await
            .map_err(|source| UpstreamError::Decode { service: ENCYCLOPEDIA, source })?;
        Ok(page_image(page))
    }

    async fn fetch_page(&self, url: &str) -> Result<String, UpstreamError> {
        let mut res = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { service: PAGE, source })?;

        if !res.status().is_success() {
            return Err(UpstreamError::Status {
                service: PAGE,
                status: res.status().as_u16(),
            });
        }

        // stream the body and stop at the end of <head> or the scan limit
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .map_err(|source| UpstreamError::Transport { service: PAGE, source })?
        {
            let searched_from = buf.len().saturating_sub(HEAD_END.len() - 1);
            buf.extend_from_slice(&chunk);
            if buf.len() >= MAX_SCAN_BYTES {
                buf.truncate(MAX_SCAN_BYTES);
                break;
            }
            if contains_head_end(&buf[searched_from..]) {
                break;
            }
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn page_image(page: PageSummary) -> Option<ImageCandidate> {
    // a disambiguation page's image does not belong to the person
    if page.kind.as_deref() == Some("disambiguation") {
        return None;
    }
    page.originalimage.or(page.thumbnail).map(|img| ImageCandidate {
        original: Some(img.source),
        thumbnail: None,
        width: img.width,
        height: img.height,
    })
}

/// True when the candidate's shape is plausible for a portrait, or unknown.
pub fn is_portrait_like(width: Option<u32>, height: Option<u32>) -> bool {
    match (width, height) {
        (Some(w), Some(h)) if w > 0 => {
            let ratio = f64::from(h) / f64::from(w);
            (MIN_PORTRAIT_RATIO..=MAX_PORTRAIT_RATIO).contains(&ratio)
        }
        _ => true,
    }
}

fn contains_head_end(bytes: &[u8]) -> bool {
    bytes
        .windows(HEAD_END.len())
        .any(|w| w.eq_ignore_ascii_case(HEAD_END))
}

/// First `og:image`-style preview URL in `html`, resolved against `page_url`.
pub fn extract_preview_image(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let raw = PREVIEW_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .filter_map(|e| e.value().attr("content"))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(String::from)
        })?;

    let resolved = match Url::parse(page_url) {
        Ok(base) => base.join(&raw).ok()?,
        Err(_) => Url::parse(&raw).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Ordered fallback chain; stops at the first candidate found.
pub struct PhotoResolver {
    sources: Arc<dyn PhotoSources>,
    portrait_filter: bool,
}

impl PhotoResolver {
    pub fn new(sources: Arc<dyn PhotoSources>, portrait_filter: bool) -> Self {
        Self {
            sources,
            portrait_filter,
        }
    }

    pub async fn resolve(&self, topic: &str, search: &SearchOutcome) -> Option<Photo> {
        let photo = self.find(topic, search).await;
        match &photo {
            Some(p) => {
                PHOTO_SOURCE.with_label_values(&[p.source.label()]).inc();
                debug!("Photo for {} from {}: {}", topic, p.source.label(), p.url);
            }
            None => debug!("No photo found for {}", topic),
        }
        photo
    }

    async fn find(&self, topic: &str, search: &SearchOutcome) -> Option<Photo> {
        match self.sources.encyclopedia_image(topic).await {
            Ok(Some(img)) if self.accepts(&img) => {
                if let Some(url) = img.best_url() {
                    return Some(photo(url, false, PhotoSource::Encyclopedia));
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Encyclopedia lookup failed for {}: {}", topic, e),
        }

        if let Some(url) = search
            .images
            .iter()
            .filter(|img| self.accepts(img))
            .find_map(|img| img.best_url())
        {
            return Some(photo(url, true, PhotoSource::SearchImage));
        }

        let first = search.first_result()?;

        if let Some(thumb) = first.thumbnail.as_deref() {
            return Some(photo(thumb, true, PhotoSource::ResultThumbnail));
        }

        match self.sources.fetch_page(&first.link).await {
            Ok(html) => extract_preview_image(&html, &first.link)
                .map(|url| photo(&url, true, PhotoSource::PagePreview)),
            Err(e) => {
                warn!("Preview fetch failed for {}: {}", first.link, e);
                None
            }
        }
    }

    fn accepts(&self, img: &ImageCandidate) -> bool {
        !self.portrait_filter || is_portrait_like(img.width, img.height)
    }
}

fn photo(url: &str, uncertain: bool, source: PhotoSource) -> Photo {
    Photo {
        url: url.to_string(),
        uncertain,
        source,
    }
}
