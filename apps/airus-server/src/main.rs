//! AiRus Server
//!
//! Backend for the AiRus student assistant. Provides REST API endpoints for:
//!
//! - Chat with tone and assignment-helper modes
//! - Presentation outline generation
//! - Writing analysis (AI signature score, spelling, grammar, readability)
//! - Document conversion (PDF, Word, Excel, CSV, text)
//!
//! ## Architecture
//!
//! - Text generation is delegated to a completion service (Gemini)
//! - Conversions run through a registry of pipelines backed by `airus-convert`
//! - Rate limiting via tower-governor

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod assistant;
mod config;
mod dispatcher;
mod error;
mod state;
mod store;
#[cfg(test)]
mod tests;

use api::{
    handle_analyze, handle_chat, handle_convert, handle_generate_ppt, handle_health,
    handle_list_tools, handle_root,
};
use config::ServerConfig;
use state::AppState;

/// Routes without middleware
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health check
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        // Assistant
        .route("/api/chat", post(handle_chat))
        .route("/api/generate-ppt", post(handle_generate_ppt))
        .route("/api/analyze", post(handle_analyze))
        // Conversion
        .route("/api/tools", get(handle_list_tools))
        .route("/api/convert", post(handle_convert))
}

/// Full application minus rate limiting, which needs the peer address
fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::load();

    // Initialize logging
    let log_level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;
    let config = Arc::new(config);

    info!("Starting AiRus server on {}:{}", config.host, config.port);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit.into())
            .burst_size(config.rate_limit * 2)
            .finish()
            .context("Failed to create rate limiter config")?,
    );

    let state = Arc::new(AppState::new(config.clone())?);

    let app = build_app(state).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", config.rate_limit);
    info!("Model: {}", config.model);
    match config.font_url() {
        Some(url) => info!("Word to PDF font: {}", url),
        None => info!("Word to PDF font: built-in Helvetica"),
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
