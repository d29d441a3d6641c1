//! tartan-id library interface
//!
//! Exposes the cache, services and router for the binary and for integration
//! testing.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use crate::cache::CacheStore;
use crate::services::{
    CacheAside, FaceDetector, FullFrameDetector, OvershootClient, Recognizer, ShazamClient,
    UnconfiguredRecognizer,
};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Cache-aside policy over the shared store
    pub cache: CacheAside,
    pub voice_recognizer: Arc<dyn Recognizer>,
    pub face_recognizer: Arc<dyn Recognizer>,
    /// Used by the scene endpoint to count faces
    pub face_detector: Arc<dyn FaceDetector>,
    /// Music identification; `None` when no key is configured
    pub shazam: Option<Arc<ShazamClient>>,
    /// Scene interpretation; `None` when no key is configured
    pub overshoot: Option<Arc<OvershootClient>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// State with no providers configured
    ///
    /// Recognition endpoints answer 503 until recognizers are attached.
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            cache: CacheAside::new(store),
            voice_recognizer: Arc::new(UnconfiguredRecognizer::new("Voice recognizer")),
            face_recognizer: Arc::new(UnconfiguredRecognizer::new("Face recognizer")),
            face_detector: Arc::new(FullFrameDetector::default()),
            shazam: None,
            overshoot: None,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_voice_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.voice_recognizer = recognizer;
        self
    }

    pub fn with_face_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.face_recognizer = recognizer;
        self
    }

    pub fn with_face_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.face_detector = detector;
        self
    }

    pub fn with_shazam(mut self, client: ShazamClient) -> Self {
        self.shazam = Some(Arc::new(client));
        self
    }

    pub fn with_overshoot(mut self, client: OvershootClient) -> Self {
        self.overshoot = Some(Arc::new(client));
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        self.cache.store()
    }

    /// Remember a failure for `/health`
    pub async fn record_error(&self, error: &ApiError) {
        *self.last_error.write().await = Some(error.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::recognition_routes())
        .merge(api::media_routes())
        .merge(api::cache_routes())
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
