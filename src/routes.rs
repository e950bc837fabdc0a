use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    handle_panic, health_handler, index_handler, metrics_handler, summarize_handler,
};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/summarize-person", post(summarize_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);
    with_layers(app)
}

fn with_layers(app: Router) -> Router {
    app.layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
