//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::services::QueueStats;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("icoach-ai")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git commit the binary was built from
    pub git_hash: String,
    /// Cargo build profile (debug/release)
    pub build_profile: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Depth of the shared provider call queue
    pub queue: QueueStats,
    /// Connected SSE clients
    pub event_subscribers: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "icoach-ai".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        uptime_seconds,
        queue: state.queue.stats(),
        event_subscribers: state.event_bus.subscriber_count(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
