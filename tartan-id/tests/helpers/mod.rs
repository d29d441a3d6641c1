//! Shared fixtures for tartan-id integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tartan_common::FeatureSet;
use tartan_id::cache::{CacheStore, RecognitionResult};
use tartan_id::services::{Identity, RecognitionRequest, Recognizer, RecognizerError};

/// Recognizer with canned answers and a call counter
pub struct FakeRecognizer {
    identities: Vec<Identity>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeRecognizer {
    /// Answers with one identity cached under the request's own features
    pub fn answering(name: &str, works: &[&str], confidence: f64) -> Self {
        Self {
            identities: vec![Identity::new(
                RecognitionResult::new(name, works.iter().map(|w| w.to_string()).collect(), confidence),
                FeatureSet::new(),
            )],
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers with fixed identities, each under its own features
    pub fn with_identities(identities: Vec<Identity>) -> Self {
        Self {
            identities,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::with_identities(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            identities: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Identity>, RecognizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(RecognizerError::Api(500, "provider exploded".to_string()));
        }

        Ok(self
            .identities
            .iter()
            .cloned()
            .map(|mut identity| {
                if identity.features.is_empty() {
                    identity.features = request.features.clone();
                }
                identity
            })
            .collect())
    }
}

pub async fn memory_store() -> Arc<CacheStore> {
    Arc::new(CacheStore::in_memory().await.expect("in-memory store"))
}

/// Voice features with the four fingerprinted fields plus noise fields
pub fn voice_features(pitch: f64) -> FeatureSet {
    FeatureSet::new()
        .with("mean_pitch", pitch)
        .with("pitch_std", 12.3)
        .with("spectral_centroid_mean", 1500.0)
        .with("energy", 0.01234)
        .with("tempo", 118.0)
        .with("zcr_mean", 0.08)
}
