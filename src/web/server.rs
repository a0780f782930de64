use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

use crate::logging::SharedLogBuffer;
use crate::onboarding::SharedSessionStore;

/// Entries returned by `/logs` when no limit is given
const DEFAULT_LOG_LIMIT: usize = 100;

pub struct WebServerConfig {
    pub port: u16,
}

impl WebServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SharedSessionStore,
    pub log_buffer: SharedLogBuffer,
    pub started_at: Instant,
}

#[derive(Deserialize)]
pub struct LogsParams {
    limit: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .with_state(state)
}

/// Serve the liveness endpoints until the process exits
pub async fn start_web_server(config: WebServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Liveness server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn alive() -> &'static str {
    "I'm alive"
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "pending_signups": state.sessions.len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> Json<Vec<serde_json::Value>> {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Json(
        state
            .log_buffer
            .get_recent(limit)
            .iter()
            .map(|entry| entry.to_value())
            .collect(),
    )
}
