//! HTTP API handlers for tartan-id

pub mod cache;
pub mod health;
pub mod media;
pub mod recognition;

pub use cache::cache_routes;
pub use health::health_routes;
pub use media::media_routes;
pub use recognition::recognition_routes;

use crate::{ApiError, ApiResult, AppState};
use axum::http::Uri;

/// Record server-side failures for `/health` and pass the result through
pub(crate) async fn track_error<T>(state: &AppState, result: ApiResult<T>) -> ApiResult<T> {
    if let Err(err) = &result {
        if err.status_and_code().0.is_server_error() {
            state.record_error(err).await;
        }
    }
    result
}

/// JSON 404 for paths no route matches
pub(crate) async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
