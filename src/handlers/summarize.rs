use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::ClientKey;
use crate::error::ApiError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{SummaryRequest, SummaryResponse};
use crate::state::AppState;

pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    payload: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let topic = match payload {
        Ok(Json(body)) => body.topic,
        Err(rejection) => {
            warn!("Unreadable request body from {}: {}", client, rejection.body_text());
            None
        }
    };
    info!("Received topic {:?} from {}", topic, client);

    let result = state.pipeline.run(&client, topic.as_deref()).await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(Json)
}

// Panics anywhere in a request become a generic 500
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Internal(format!("request handler panicked: {}", detail)).into_response()
}
