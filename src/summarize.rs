use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::UpstreamError;
use crate::metrics::SUMMARY_DEGRADED;
use crate::pipeline::Outcome;

const SERVICE: &str = "completion";

pub const NO_SUMMARY: &str = "No summary returned.";
pub const TEMPERATURE: f32 = 0.7;
pub const SUMMARY_WORDS: u32 = 200;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that writes short factual summaries of real people from the source links you are given.";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Text of the first choice.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError>;
}

// Chat-completion API request format
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

// Chat-completion API response format
#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            model,
            timeout,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: TEMPERATURE,
            })
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { service: SERVICE, source })?;

        let status = res.status();
        // error bodies still carry a useful message, so decode before checking status
        let body: CompletionResponse = res
            .json()
            .await
            .map_err(|source| UpstreamError::Decode { service: SERVICE, source })?;

        first_choice_text(body, status.as_u16())
    }
}

fn first_choice_text(body: CompletionResponse, status: u16) -> Result<String, UpstreamError> {
    if let Some(err) = body.error {
        return Err(UpstreamError::Api {
            service: SERVICE,
            message: err.message.unwrap_or_else(|| format!("status {}", status)),
        });
    }
    if !(200..300).contains(&status) {
        return Err(UpstreamError::Status { service: SERVICE, status });
    }

    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or(UpstreamError::EmptyCompletion { service: SERVICE })
}

/// Instruction sent as the user message.
///
/// Ambiguous names are resolved silently: the model picks the single most
/// notable person and is told not to remark on the ambiguity.
pub fn build_prompt(topic: &str, links: &[String]) -> String {
    format!(
        r#"Someone searched for "{topic}".

First decide whether this names a real person or a widely recognized character. If it does not, reply only with: "Not a real person."

If several notable people share this name, choose just one of them, preferring:
- the person most prominent in the sources below,
- their country of origin or association,
- the most distinctive profession or achievement.

Write one summary of about {words} words about that single person. Base it only on these sources:

{sources}

Do not mention that other people share the name and do not discuss the choice you made; write only about the person you chose."#,
        topic = topic,
        words = SUMMARY_WORDS,
        sources = links.join("\n"),
    )
}

pub struct Summarizer {
    provider: Arc<dyn CompletionProvider>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Summary text, or the placeholder when the model fails or says nothing.
    pub async fn summarize(&self, topic: &str, links: &[String]) -> Outcome<String> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(topic, links)),
        ];

        let reason = match self.provider.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => return Outcome::Ready(text.trim().to_string()),
            Ok(_) => UpstreamError::EmptyCompletion { service: SERVICE }.to_string(),
            Err(e) => e.to_string(),
        };

        warn!("Summary for {} degraded: {}", topic, reason);
        SUMMARY_DEGRADED.inc();
        Outcome::Degraded {
            value: NO_SUMMARY.to_string(),
            reason,
        }
    }
}
