//! HTTP routing and response shape tests

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use helpers::{memory_store, FakeRecognizer};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use tartan_id::{build_router, AppState};
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn voice_body() -> Value {
    json!({
        "features": {
            "mean_pitch": 182.04,
            "pitch_std": 20.11,
            "spectral_centroid_mean": 1650.4,
            "energy": 0.004211,
            "tempo": 110.0
        },
        "context": "ShowA"
    })
}

fn png_data_uri() -> String {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(32, 32, |x, y| {
        image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
    }));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(buffer.into_inner())
    )
}

async fn app_with(voice: Arc<FakeRecognizer>, face: Arc<FakeRecognizer>) -> Router {
    let state = AppState::new(memory_store().await)
        .with_voice_recognizer(voice)
        .with_face_recognizer(face);
    build_router(state)
}

#[tokio::test]
async fn test_health_reports_module_and_providers() {
    let app = build_router(AppState::new(memory_store().await));

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tartan-id");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["providers"]["music"], false);
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_voice_miss_then_hit() {
    let voice = Arc::new(FakeRecognizer::answering("Alice", &["ShowA"], 0.9));
    let app = app_with(voice.clone(), Arc::new(FakeRecognizer::empty())).await;

    let (status, first) = send(&app, post_json("/api/analyze-voice", voice_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["cached"], false);
    assert_eq!(first["no_result"], false);
    assert_eq!(first["results"][0]["name"], "Alice");
    assert_eq!(first["results"][0]["notable_works"], json!(["ShowA"]));
    assert_eq!(first["results"][0]["cache_hits"], 1);

    let (status, second) = send(&app, post_json("/api/analyze-voice", voice_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["results"][0]["name"], "Alice");
    assert_eq!(second["results"][0]["confidence"], 0.9);
    assert_eq!(second["results"][0]["cache_hits"], 2);
    assert_eq!(
        second["results"][0]["fingerprint"],
        first["results"][0]["fingerprint"]
    );

    assert_eq!(voice.calls(), 1);
}

#[tokio::test]
async fn test_voice_no_result_is_not_an_error() {
    let app = app_with(
        Arc::new(FakeRecognizer::empty()),
        Arc::new(FakeRecognizer::empty()),
    )
    .await;

    let (status, body) = send(&app, post_json("/api/analyze-voice", voice_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["cached"], false);
    assert_eq!(body["no_result"], true);
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["message"], "no identity found");
}

#[tokio::test]
async fn test_unconfigured_recognizer_is_503() {
    let app = build_router(AppState::new(memory_store().await));

    let (status, body) = send(&app, post_json("/api/analyze-voice", voice_body())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAVAILABLE");
}

#[tokio::test]
async fn test_empty_features_rejected() {
    let app = app_with(
        Arc::new(FakeRecognizer::empty()),
        Arc::new(FakeRecognizer::empty()),
    )
    .await;

    let (status, body) = send(
        &app,
        post_json("/api/analyze-voice", json!({"features": {}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_provider_failure_is_502_and_reported_by_health() {
    let app = app_with(
        Arc::new(FakeRecognizer::failing()),
        Arc::new(FakeRecognizer::empty()),
    )
    .await;

    let (status, body) = send(&app, post_json("/api/analyze-voice", voice_body())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "PROVIDER_ERROR");

    let (_, health) = send(&app, get("/health")).await;
    assert!(health["last_error"]
        .as_str()
        .unwrap()
        .contains("provider exploded"));

    let (_, stats) = send(&app, get("/api/cache/stats")).await;
    assert_eq!(stats["voice"]["entries"], 0);
}

#[tokio::test]
async fn test_face_miss_then_hit() {
    let face = Arc::new(FakeRecognizer::answering("Bob", &["FilmB"], 0.8));
    let app = app_with(Arc::new(FakeRecognizer::empty()), face.clone()).await;
    let body = json!({ "image": png_data_uri(), "context": "premiere" });

    let (status, first) = send(&app, post_json("/api/analyze-face", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["results"][0]["name"], "Bob");
    assert_eq!(first["features"]["width"], 32.0);

    let (status, second) = send(&app, post_json("/api/analyze-face", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["results"][0]["cache_hits"], 2);

    assert_eq!(face.calls(), 1);
}

#[tokio::test]
async fn test_face_rejects_bad_image() {
    let app = app_with(
        Arc::new(FakeRecognizer::empty()),
        Arc::new(FakeRecognizer::empty()),
    )
    .await;

    let not_base64 = json!({ "image": "%%%" });
    let (status, _) = send(&app, post_json("/api/analyze-face", not_base64)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Valid base64, not an image
    let not_image = json!({ "image": "aGVsbG8gd29ybGQ=" });
    let (status, body) = send(&app, post_json("/api/analyze-face", not_image)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Invalid image"));
}

#[tokio::test]
async fn test_stats_and_clear() {
    let voice = Arc::new(FakeRecognizer::answering("Alice", &[], 0.9));
    let app = app_with(voice, Arc::new(FakeRecognizer::empty())).await;

    send(&app, post_json("/api/analyze-voice", voice_body())).await;
    send(&app, post_json("/api/analyze-voice", voice_body())).await;

    let (status, stats) = send(&app, get("/api/cache/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["voice"]["entries"], 1);
    assert_eq!(stats["voice"]["total_hits"], 2);
    assert_eq!(stats["face"]["entries"], 0);

    let (status, cleared) = send(&app, post_json("/api/cache/clear", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["success"], true);

    let (_, stats) = send(&app, get("/api/cache/stats")).await;
    assert_eq!(
        stats,
        json!({
            "voice": {"entries": 0, "total_hits": 0},
            "face": {"entries": 0, "total_hits": 0}
        })
    );
}

#[tokio::test]
async fn test_media_endpoints_without_keys() {
    let app = build_router(AppState::new(memory_store().await));

    let (status, _) = send(
        &app,
        post_json("/api/identify-music", json!({"audio": "aGVsbG8="})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&app, get("/api/search-music?q=hello")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(
        &app,
        post_json("/api/analyze-scene", json!({"image": png_data_uri()})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = build_router(AppState::new(memory_store().await));

    let (status, body) = send(&app, get("/api/search-music")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_path_is_json_404() {
    let app = build_router(AppState::new(memory_store().await));

    let (status, body) = send(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].as_str().unwrap().contains("/api/nope"));
}
