use std::sync::Arc;

use codemyway::config::AppConfig;
use codemyway::error::ErrorCode;
use codemyway::llm::LlmClient;
use codemyway::pipeline::Upstream;
use codemyway::pipeline::upstream::LlmUpstream;
use codemyway::{routes, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let upstream: Option<Arc<dyn Upstream>> = match LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(LlmUpstream::new(Arc::new(client))))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client unavailable; generation endpoints will fail");
            None
        }
    };

    let port = config.port;
    let state = state::AppState::new(config, upstream);
    let _sweeper = state::spawn_session_sweeper(state.clone());
    let app = routes::app(state);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %port, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%port, "codemyway listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
