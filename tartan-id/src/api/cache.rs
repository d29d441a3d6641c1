//! Cache maintenance endpoints

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::track_error;
use crate::cache::CacheStats;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> ApiResult<Json<CacheStats>> {
    let result = state.store().stats().await.map_err(Into::into);
    track_error(&state, result).await.map(Json)
}

/// POST /api/cache/clear
///
/// Empties both namespaces in one transaction.
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<ClearResponse>> {
    let result = state.store().clear_all().await.map_err(Into::into);
    track_error(&state, result).await?;

    tracing::info!("Recognition cache cleared");

    Ok(Json(ClearResponse {
        success: true,
        message: "Cache cleared".to_string(),
    }))
}

/// Build cache maintenance routes
pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/clear", post(clear_cache))
}
