mod cache;
mod config;
mod error;
mod handlers;
mod maintenance;
mod metrics;
mod models;
mod photo;
mod pipeline;
mod rate_limit;
mod routes;
mod search;
mod state;
mod summarize;
#[cfg(test)]
mod test_support;
mod validate;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cache::SummaryCache;
use crate::config::Args;
use crate::maintenance::sweeper;
use crate::photo::{HttpPhotoSources, PhotoResolver};
use crate::pipeline::SummaryPipeline;
use crate::rate_limit::RateLimiter;
use crate::search::SerpApiClient;
use crate::state::AppState;
use crate::summarize::{OpenAiClient, Summarizer};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();

    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

    let search = Arc::new(SerpApiClient::new(
        client.clone(),
        args.search_url.clone(),
        args.serpapi_key.clone(),
        args.search_results,
        args.max_links,
        args.upstream_timeout(),
    ));
    let photos = PhotoResolver::new(
        Arc::new(HttpPhotoSources::new(
            client.clone(),
            args.encyclopedia_url.clone(),
            args.photo_timeout(),
        )),
        !args.no_portrait_filter,
    );
    let summarizer = Summarizer::new(Arc::new(OpenAiClient::new(
        client,
        args.completion_url.clone(),
        args.openai_key.clone(),
        args.model.clone(),
        args.upstream_timeout(),
    )));

    let rate_limiter = Arc::new(RateLimiter::new(
        args.rate_limit,
        args.rate_window(),
        args.rate_capacity,
    ));
    let cache = Arc::new(SummaryCache::new(args.cache_ttl()));

    // creating shared state
    let state = Arc::new(AppState {
        pipeline: SummaryPipeline::new(
            search,
            photos,
            summarizer,
            rate_limiter,
            cache,
        ),
        trust_proxy: args.trust_proxy,
    });

    // spawn the background sweeper
    tokio::spawn(sweeper(
        state.pipeline.rate_limiter().clone(),
        state.pipeline.cache().clone(),
        args.sweep_interval(),
    ));

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Summarizer running on http://localhost:{}", args.port);
    info!("Search endpoint: {}", args.search_url);
    info!("Completion endpoint: {} (model {})", args.completion_url, args.model);
    info!(
        "Rate limit: {} requests per {} seconds (tracking up to {} clients, trust proxy: {})",
        args.rate_limit, args.rate_window, args.rate_capacity, args.trust_proxy
    );
    info!("Cache TTL: {} seconds", args.cache_ttl);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Summarizer stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
