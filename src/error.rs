use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Failure talking to one of the outbound services.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} returned an unreadable body: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} reported an error: {message}")]
    Api { service: &'static str, message: String },

    #[error("invalid {service} url: {detail}")]
    InvalidUrl { service: &'static str, detail: String },

    #[error("{service} returned no content")]
    EmptyCompletion { service: &'static str },
}

/// Errors that end a summarize request with a non-200 response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing topic")]
    MissingTopic,

    #[error("Please enter a valid name (letters, spaces, apostrophes, periods and hyphens only)")]
    InvalidTopic,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("No search results found")]
    NoResults,

    #[error("Failed to fetch search results")]
    SearchUnavailable(#[source] UpstreamError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingTopic | ApiError::InvalidTopic => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NoResults => StatusCode::NOT_FOUND,
            ApiError::SearchUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Never carries upstream or internal detail.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::RateLimited { retry_after } => format!(
                "Rate limit exceeded. Please try again in about {}.",
                describe_wait(*retry_after)
            ),
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::SearchUnavailable(source) => error!("Search provider failure: {}", source),
            ApiError::Internal(detail) => error!("Internal error: {}", detail),
            _ => {}
        }

        let mut response = (
            self.status(),
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response();

        if let ApiError::RateLimited { retry_after } = &self {
            // Retry-After is whole seconds, rounded up
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, secs.into());
        }

        response
    }
}

fn describe_wait(wait: Duration) -> String {
    let minutes = wait.as_secs().div_ceil(60).max(1);
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}
