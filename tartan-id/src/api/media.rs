//! Music identification and scene analysis endpoints
//!
//! Thin pass-throughs to the Shazam and Overshoot clients. Nothing here is
//! cached.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::track_error;
use crate::services::{
    decode_base64_payload, decode_image, MusicMatch, OvershootClient, SceneAnalysis,
    SceneInterpretation, ShazamClient, TrackInfo, TrackSummary,
};
use crate::{ApiError, ApiResult, AppState};
use std::sync::Arc;

const DEFAULT_SEARCH_LIMIT: u32 = 5;
const MAX_SEARCH_LIMIT: u32 = 50;

/// POST /api/identify-music body
#[derive(Debug, Deserialize)]
pub struct MusicRequest {
    /// Base64 audio or data URI
    pub audio: String,
}

#[derive(Debug, Serialize)]
pub struct MusicResponse {
    pub success: bool,
    pub track_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub tracks: Vec<TrackSummary>,
}

/// POST /api/analyze-scene body
#[derive(Debug, Deserialize)]
pub struct SceneRequest {
    pub image: String,
    #[serde(default)]
    pub context: Option<String>,
    /// Ask for a face-aware interpretation
    #[serde(default)]
    pub with_faces: bool,
    /// Names already identified in the frame
    #[serde(default)]
    pub identified_people: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SceneResult {
    Scene(SceneAnalysis),
    WithFaces(SceneInterpretation),
}

#[derive(Debug, Serialize)]
pub struct SceneResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: SceneResult,
}

fn shazam(state: &AppState) -> ApiResult<Arc<ShazamClient>> {
    state
        .shazam
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Shazam API not configured".to_string()))
}

fn overshoot(state: &AppState) -> ApiResult<Arc<OvershootClient>> {
    state
        .overshoot
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Overshoot API not configured".to_string()))
}

/// POST /api/identify-music
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn identify_music(
    State(state): State<AppState>,
    Json(body): Json<MusicRequest>,
) -> ApiResult<Json<MusicResponse>> {
    let result = identify(&state, body).await;
    track_error(&state, result).await.map(Json)
}

async fn identify(state: &AppState, body: MusicRequest) -> ApiResult<MusicResponse> {
    let client = shazam(state)?;
    let audio = decode_base64_payload(&body.audio)?;

    let response = match client.identify(audio).await? {
        MusicMatch::Found(track) => MusicResponse {
            success: true,
            track_found: true,
            track: Some(track),
            message: None,
        },
        MusicMatch::NotFound => MusicResponse {
            success: true,
            track_found: false,
            track: None,
            message: Some("No music match found".to_string()),
        },
    };

    Ok(response)
}

/// GET /api/search-music?q=&limit=
pub async fn search_music(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let result = search(&state, query).await;
    track_error(&state, result).await.map(Json)
}

async fn search(state: &AppState, query: SearchQuery) -> ApiResult<SearchResponse> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'q' is required".to_string()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let client = shazam(state)?;
    let tracks = client.search(term, limit).await?;

    Ok(SearchResponse {
        success: true,
        count: tracks.len(),
        tracks,
    })
}

/// POST /api/analyze-scene
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn analyze_scene(
    State(state): State<AppState>,
    Json(body): Json<SceneRequest>,
) -> ApiResult<Json<SceneResponse>> {
    let result = scene(&state, body).await;
    track_error(&state, result).await.map(Json)
}

async fn scene(state: &AppState, body: SceneRequest) -> ApiResult<SceneResponse> {
    let client = overshoot(state)?;
    let context = body.context.as_deref().unwrap_or("");

    if !body.with_faces {
        // Only validate; the provider takes the base64 as-is
        decode_base64_payload(&body.image)?;
        let analysis = client.analyze_scene(&body.image, context).await?;
        return Ok(SceneResponse {
            success: true,
            result: SceneResult::Scene(analysis),
        });
    }

    let bytes = decode_base64_payload(&body.image)?;
    let detector = Arc::clone(&state.face_detector);
    let face_count = tokio::task::spawn_blocking(move || {
        decode_image(&bytes).map(|image| detector.detect(&image).len())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Face detection task failed: {}", e)))?
    .map_err(|e| ApiError::BadRequest(format!("Invalid image: {}", e)))?;

    let interpretation = client
        .interpret_with_faces(&body.image, face_count, &body.identified_people, context)
        .await?;

    Ok(SceneResponse {
        success: true,
        result: SceneResult::WithFaces(interpretation),
    })
}

/// Build music and scene routes
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/api/identify-music", post(identify_music))
        .route("/api/search-music", get(search_music))
        .route("/api/analyze-scene", post(analyze_scene))
}
