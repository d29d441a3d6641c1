//! Cache-aside orchestration with a fake recognizer

mod helpers;

use helpers::{memory_store, voice_features, FakeRecognizer};
use tartan_common::{FeatureKind, FeatureSet};
use tartan_id::cache::RecognitionResult;
use tartan_id::services::{
    CacheAside, Identity, OrchestratorError, RecognitionOutcome, RecognitionRequest,
    RecognizerError,
};

#[tokio::test]
async fn test_miss_then_hit_skips_recognizer() {
    let cache = CacheAside::new(memory_store().await);
    let recognizer = FakeRecognizer::answering("Alice", &["ShowA"], 0.9);
    let request = RecognitionRequest::voice(voice_features(180.0), Some("ShowA".to_string()));

    let identities = match cache.recognize(&request, &recognizer).await.unwrap() {
        RecognitionOutcome::Resolved(identities) => identities,
        other => panic!("expected a fresh result, got {:?}", other),
    };
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].result.name, "Alice");
    assert_eq!(identities[0].cache_hits, 1);

    let entry = match cache.recognize(&request, &recognizer).await.unwrap() {
        RecognitionOutcome::Cached(entry) => entry,
        other => panic!("expected a cache hit, got {:?}", other),
    };
    assert_eq!(entry.result.name, "Alice");
    assert_eq!(entry.result.notable_works, vec!["ShowA".to_string()]);
    assert_eq!(entry.access_count, 2);
    assert_eq!(entry.context.as_deref(), Some("ShowA"));

    assert_eq!(recognizer.calls(), 1);
}

#[tokio::test]
async fn test_no_identity_writes_nothing() {
    let store = memory_store().await;
    let cache = CacheAside::new(store.clone());
    let recognizer = FakeRecognizer::empty();
    let request = RecognitionRequest::voice(voice_features(120.0), None);

    let outcome = cache.recognize(&request, &recognizer).await.unwrap();
    assert!(matches!(outcome, RecognitionOutcome::NoResult));

    // Nothing cached, so the recognizer is asked again
    cache.recognize(&request, &recognizer).await.unwrap();
    assert_eq!(recognizer.calls(), 2);
    assert_eq!(store.stats().await.unwrap().voice.entries, 0);
}

#[tokio::test]
async fn test_recognizer_failure_writes_nothing() {
    let store = memory_store().await;
    let cache = CacheAside::new(store.clone());
    let recognizer = FakeRecognizer::failing();
    let request = RecognitionRequest::voice(voice_features(130.0), None);

    let err = cache.recognize(&request, &recognizer).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Recognizer(RecognizerError::Api(500, _))
    ));

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.voice.entries, 0);
    assert_eq!(stats.face.entries, 0);
}

#[tokio::test]
async fn test_each_identity_cached_under_own_features() {
    let store = memory_store().await;
    let cache = CacheAside::new(store.clone());

    let frame = FeatureSet::new().with("mean_brightness", 90.0).with("width", 640u32);
    let face_a = FeatureSet::new().with("mean_brightness", 80.0).with("bbox_x", 10u32);
    let face_b = FeatureSet::new().with("mean_brightness", 70.0).with("bbox_x", 300u32);

    let recognizer = FakeRecognizer::with_identities(vec![
        Identity::new(RecognitionResult::new("Alice", vec![], 0.8), face_a.clone()),
        Identity::new(RecognitionResult::new("Bob", vec![], 0.7), face_b.clone()),
    ]);

    let image = std::sync::Arc::new(image::DynamicImage::new_rgb8(1, 1));
    let request = RecognitionRequest::face(frame.clone(), image, Some("red carpet".to_string()));

    let outcome = cache.recognize(&request, &recognizer).await.unwrap();
    let RecognitionOutcome::Resolved(identities) = outcome else {
        panic!("expected fresh identities");
    };
    assert_eq!(identities.len(), 2);
    assert_ne!(identities[0].fingerprint, identities[1].fingerprint);

    assert_eq!(store.stats().await.unwrap().face.entries, 2);

    let a = store.lookup(FeatureKind::Face, &face_a).await.unwrap().expect("face a");
    let b = store.lookup(FeatureKind::Face, &face_b).await.unwrap().expect("face b");
    assert_eq!(a.result.name, "Alice");
    assert_eq!(b.result.name, "Bob");
    assert_eq!(a.context, None);

    // The whole frame itself was never stored
    assert!(store.lookup(FeatureKind::Face, &frame).await.unwrap().is_none());
}

#[tokio::test]
async fn test_identities_sharing_features_merge_to_most_confident() {
    let alice = Identity::new(RecognitionResult::new("Alice", vec![], 0.9), FeatureSet::new());
    let bob = Identity::new(RecognitionResult::new("Bob", vec![], 0.3), FeatureSet::new());

    for answers in [vec![alice.clone(), bob.clone()], vec![bob, alice]] {
        let store = memory_store().await;
        let cache = CacheAside::new(store.clone());
        // Both identities fall back to the request features
        let recognizer = FakeRecognizer::with_identities(answers);
        let request = RecognitionRequest::voice(voice_features(165.0), None);

        let identities = match cache.recognize(&request, &recognizer).await.unwrap() {
            RecognitionOutcome::Resolved(identities) => identities,
            other => panic!("expected a fresh result, got {:?}", other),
        };
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].result.name, "Alice");
        assert_eq!(identities[0].cache_hits, 1);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.voice.entries, 1);
        assert_eq!(stats.voice.total_hits, 1);

        let entry = match cache.recognize(&request, &recognizer).await.unwrap() {
            RecognitionOutcome::Cached(entry) => entry,
            other => panic!("expected a cache hit, got {:?}", other),
        };
        assert_eq!(entry.result.name, "Alice");
        assert_eq!(entry.result.confidence, 0.9);
        assert_eq!(entry.access_count, 2);
    }
}

#[tokio::test]
async fn test_bad_identity_features_write_nothing() {
    let store = memory_store().await;
    let cache = CacheAside::new(store.clone());

    let good = FeatureSet::new().with("mean_brightness", 80.0).with("bbox_x", 10u32);
    let bad = FeatureSet::new().with("detector_confidence", f64::NAN).with("bbox_x", 300u32);
    let recognizer = FakeRecognizer::with_identities(vec![
        Identity::new(RecognitionResult::new("Alice", vec![], 0.8), good),
        Identity::new(RecognitionResult::new("Bob", vec![], 0.7), bad),
    ]);

    let image = std::sync::Arc::new(image::DynamicImage::new_rgb8(1, 1));
    let frame = FeatureSet::new().with("mean_brightness", 90.0);
    let request = RecognitionRequest::face(frame, image, None);

    let err = cache.recognize(&request, &recognizer).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Cache(tartan_id::cache::CacheError::FingerprintInput(_))
    ));
    assert_eq!(store.stats().await.unwrap().face.entries, 0);
}
