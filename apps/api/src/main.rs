mod config;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;
mod tailoring;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::ClaudeResumeModel;
use crate::routes::build_router;
use crate::state::AppState;
use crate::tailoring::store::SessionStore;

/// Upper bound between two idle-session sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Arbiter API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client and the model pipeline on top of it
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!(
        "Models: structuring={} arbitrage={} judge={} (judge enabled: {})",
        config.structuring_model, config.arbitrage_model, config.judge_model, config.judge_enabled
    );
    let model = Arc::new(ClaudeResumeModel::new(
        llm,
        config.structuring_model.clone(),
        config.arbitrage_model.clone(),
        config.judge_model.clone(),
        config.pricing.clone(),
    ));

    let sessions = SessionStore::new();
    match config.session_ttl {
        Some(ttl) => {
            sessions.spawn_sweeper(ttl, ttl.min(MAX_SWEEP_INTERVAL));
            info!("Idle sessions expire after {}s", ttl.as_secs());
        }
        None => info!("Session expiry disabled"),
    }

    let state = AppState {
        config: config.clone(),
        model,
        sessions,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
