//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" once the router is serving)
    pub status: String,
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short git hash the binary was built from
    pub build: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub providers: ProviderStatus,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    /// Recognizer names; unconfigured ones answer 503
    pub voice: String,
    pub face: String,
    pub music: bool,
    pub scene: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();

    let providers = ProviderStatus {
        voice: state.voice_recognizer.name().to_string(),
        face: state.face_recognizer.name().to_string(),
        music: state.shazam.is_some(),
        scene: state.overshoot.is_some(),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tartan-id".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("GIT_HASH").to_string(),
        uptime_seconds,
        providers,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
