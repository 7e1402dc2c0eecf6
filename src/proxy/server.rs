//! Relay server setup

use axum::{
    extract::State,
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::ProxyHandler;
use super::upstream::UpstreamClient;
use crate::config::{AppConfig, Environment, ProcessEnv};

/// Shared, immutable state for the relay. Nothing here changes per request.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub upstream: UpstreamClient,
    pub env: Arc<dyn Environment>,
}

impl ProxyState {
    pub fn new(config: AppConfig, env: Arc<dyn Environment>) -> Result<Self, Box<dyn std::error::Error>> {
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        Ok(Self {
            config: Arc::new(config),
            upstream,
            env,
        })
    }
}

/// Build the router. Proxy routes accept any method so the handlers own the
/// 405 response body.
pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/messages", any(messages_handler))
        .route("/api/messages/stream", any(stream_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay server until Ctrl-C
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = ProxyState::new(config, Arc::new(ProcessEnv))?;

    if state
        .config
        .credentials
        .api_key(state.env.as_ref())
        .is_none()
    {
        tracing::warn!(
            variable = %state.config.credentials.api_key_env,
            "Upstream credential not set; proxy requests will fail until it is"
        );
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("llm-relay listening on {}", addr);
    tracing::info!("Relaying to {}", state.upstream.messages_url());
    tracing::info!(
        deadline_ms = state.config.streaming.deadline_ms,
        ceiling_seconds = state.config.upstream.timeout_seconds,
        "Streaming deadline configured"
    );

    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("llm-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn messages_handler(State(state): State<ProxyState>, req: axum::extract::Request) -> axum::response::Response {
    ProxyHandler::new(state).handle_messages(req).await
}

async fn stream_handler(State(state): State<ProxyState>, req: axum::extract::Request) -> axum::response::Response {
    ProxyHandler::new(state).handle_stream(req).await
}
