//! Liveness endpoint served next to the bot.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};

pub const SERVICE_NAME: &str = "agriculture-digest-bot";

/// Configuration facts reported by `/health`. Fixed at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthInfo {
    pub token_configured: bool,
    pub channel_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub bot_token_configured: bool,
    pub channel_configured: bool,
}

pub fn router(info: HealthInfo) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(info)
}

/// GET /health
async fn health(State(info): State<HealthInfo>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bot_token_configured: info.token_configured,
        channel_configured: info.channel_configured,
    })
}

async fn index() -> &'static str {
    "Agriculture digest bot. Liveness at /health."
}

/// Serves the health router on `0.0.0.0:port` until `shutdown` is notified.
pub async fn serve(port: u16, info: HealthInfo, shutdown: Arc<Notify>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(port, error = %e, "Failed to bind health server");
        e
    })?;
    info!(port, "Health server listening");

    axum::serve(listener, router(info))
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;

    info!("Health server stopped");
    Ok(())
}
