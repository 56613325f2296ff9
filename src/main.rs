mod codec;
mod config;
mod error;
mod gemini;
mod interpret;
mod mask;
mod models;
mod orchestrator;
mod presenter;
mod prompts;
mod routes;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::orchestrator::Orchestrator;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env().inspect_err(|err| tracing::error!("❌ {}", err))?;
    tracing::info!(
        edit_model = %config.edit_model,
        generate_model = %config.generate_model,
        max_dimension = config.max_dimension,
        "API key loaded ({} chars)",
        config.api_key.chars().count()
    );

    let gemini = Arc::new(GeminiClient::new(&config));
    let state = AppState::new(Orchestrator::new(gemini, config.max_dimension));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("👋 Shutting down");
    }
}
