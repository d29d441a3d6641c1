//! Voice and face recognition endpoints
//!
//! Both run the cache-aside flow: a cached identity comes back with
//! `cached: true` and the provider is never called.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tartan_common::FeatureSet;
use uuid::Uuid;

use crate::api::track_error;
use crate::services::{
    analyze_image, decode_base64_payload, decode_image, RecognitionOutcome, RecognitionRequest,
};
use crate::{ApiError, ApiResult, AppState};

/// POST /api/analyze-voice body
#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    /// Features extracted from the clip
    pub features: FeatureSet,
    #[serde(default)]
    pub context: Option<String>,
}

/// POST /api/analyze-face body
#[derive(Debug, Deserialize)]
pub struct FaceRequest {
    /// Base64 image or data URI
    pub image: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub name: String,
    pub notable_works: Vec<String>,
    pub confidence: f64,
    /// Access count after this request
    pub cache_hits: i64,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecognitionResponse {
    pub success: bool,
    pub cached: bool,
    pub no_result: bool,
    pub results: Vec<IdentityView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Features the lookup was keyed on
    pub features: FeatureSet,
}

impl RecognitionResponse {
    fn from_outcome(outcome: RecognitionOutcome, features: FeatureSet) -> Self {
        let cached = outcome.is_cached();
        let results: Vec<IdentityView> = match outcome {
            RecognitionOutcome::Cached(entry) => vec![IdentityView {
                name: entry.result.name,
                notable_works: entry.result.notable_works,
                confidence: entry.result.confidence,
                cache_hits: entry.access_count,
                fingerprint: entry.fingerprint.into_string(),
                reasoning: None,
            }],
            RecognitionOutcome::Resolved(identities) => identities
                .into_iter()
                .map(|identity| IdentityView {
                    name: identity.result.name,
                    notable_works: identity.result.notable_works,
                    confidence: identity.result.confidence,
                    cache_hits: identity.cache_hits,
                    fingerprint: identity.fingerprint.into_string(),
                    reasoning: identity.reasoning,
                })
                .collect(),
            RecognitionOutcome::NoResult => Vec::new(),
        };

        let no_result = results.is_empty();
        Self {
            success: true,
            cached,
            no_result,
            results,
            message: no_result.then(|| "no identity found".to_string()),
            features,
        }
    }
}

/// POST /api/analyze-voice
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn analyze_voice(
    State(state): State<AppState>,
    Json(body): Json<VoiceRequest>,
) -> ApiResult<Json<RecognitionResponse>> {
    let result = recognize_voice(&state, body).await;
    track_error(&state, result).await.map(Json)
}

async fn recognize_voice(state: &AppState, body: VoiceRequest) -> ApiResult<RecognitionResponse> {
    if body.features.is_empty() {
        return Err(ApiError::BadRequest("No voice features provided".to_string()));
    }

    tracing::info!(
        features = body.features.len(),
        has_context = body.context.is_some(),
        "Voice recognition request"
    );

    let features = body.features.clone();
    let request = RecognitionRequest::voice(body.features, non_blank(body.context));
    let outcome = state
        .cache
        .recognize(&request, state.voice_recognizer.as_ref())
        .await?;

    Ok(RecognitionResponse::from_outcome(outcome, features))
}

/// POST /api/analyze-face
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn analyze_face(
    State(state): State<AppState>,
    Json(body): Json<FaceRequest>,
) -> ApiResult<Json<RecognitionResponse>> {
    let result = recognize_face(&state, body).await;
    track_error(&state, result).await.map(Json)
}

async fn recognize_face(state: &AppState, body: FaceRequest) -> ApiResult<RecognitionResponse> {
    let bytes = decode_base64_payload(&body.image)?;

    let (image, features) = tokio::task::spawn_blocking(move || {
        decode_image(&bytes).map(|image| {
            let features = analyze_image(&image);
            (image, features)
        })
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Image analysis task failed: {}", e)))?
    .map_err(|e| ApiError::BadRequest(format!("Invalid image: {}", e)))?;

    tracing::info!(
        width = image.width(),
        height = image.height(),
        has_context = body.context.is_some(),
        "Face recognition request"
    );

    let request = RecognitionRequest::face(
        features.clone(),
        Arc::new(image),
        non_blank(body.context),
    );
    let outcome = state
        .cache
        .recognize(&request, state.face_recognizer.as_ref())
        .await?;

    Ok(RecognitionResponse::from_outcome(outcome, features))
}

fn non_blank(context: Option<String>) -> Option<String> {
    context.filter(|c| !c.trim().is_empty())
}

/// Build recognition routes
pub fn recognition_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze-voice", post(analyze_voice))
        .route("/api/analyze-face", post(analyze_face))
}
