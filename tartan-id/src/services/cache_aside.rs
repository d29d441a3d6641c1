//! Cache-aside recognition
//!
//! Per request: look the features up; on a hit return the cached result
//! without calling any provider. On a miss call the recognizer (no store lock
//! is held while it runs), write every identity it returns under that
//! identity's own features, and return them uncached. Identities that map to
//! the same fingerprint are merged first so one entry gets one write.

use crate::cache::{CacheEntry, CacheError, CacheStore, RecognitionResult};
use crate::services::recognizer::{Identity, RecognitionRequest, Recognizer, RecognizerError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tartan_common::{FeatureKind, Fingerprint};
use thiserror::Error;

/// Identity resolved on a cache miss and written through to the store
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedIdentity {
    #[serde(flatten)]
    pub result: RecognitionResult,
    pub fingerprint: Fingerprint,
    /// Access counter after the write (1 for a new entry)
    pub cache_hits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Result of a cache-aside recognition
#[derive(Debug, Clone)]
pub enum RecognitionOutcome {
    /// Served from the store; `access_count` is the post-increment hit count
    Cached(CacheEntry),
    /// Freshly recognized and written through
    Resolved(Vec<ResolvedIdentity>),
    /// The recognizer found nothing; nothing was written
    NoResult,
}

impl RecognitionOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, RecognitionOutcome::Cached(_))
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

/// Request-time policy gluing recognizers to the cache store
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<CacheStore>,
}

impl CacheAside {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Resolve a request through the cache, falling back to `recognizer`
    ///
    /// A recognizer failure is returned as-is and leaves the store untouched.
    pub async fn recognize(
        &self,
        request: &RecognitionRequest,
        recognizer: &dyn Recognizer,
    ) -> Result<RecognitionOutcome, OrchestratorError> {
        let started = Instant::now();

        if let Some(entry) = self.store.lookup(request.kind, &request.features).await? {
            record_prediction(
                request,
                &entry.result,
                true,
                started.elapsed().as_secs_f64() * 1000.0,
            );
            return Ok(RecognitionOutcome::Cached(entry));
        }

        let identities = recognizer.recognize(request).await.map_err(|e| {
            tracing::warn!(
                kind = %request.kind,
                recognizer = recognizer.name(),
                error = %e,
                "Recognition failed; cache left unchanged"
            );
            e
        })?;

        if identities.is_empty() {
            tracing::info!(
                kind = %request.kind,
                recognizer = recognizer.name(),
                "Recognizer returned no identities"
            );
            return Ok(RecognitionOutcome::NoResult);
        }

        let identities = merge_by_fingerprint(&self.store, request.kind, identities)?;

        let mut resolved = Vec::with_capacity(identities.len());
        for identity in identities {
            let entry = self
                .store
                .upsert(
                    request.kind,
                    &identity.features,
                    &identity.result,
                    request.context.as_deref(),
                )
                .await?;

            resolved.push(ResolvedIdentity {
                result: entry.result,
                fingerprint: entry.fingerprint,
                cache_hits: entry.access_count,
                reasoning: identity.reasoning,
            });
        }

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        for identity in &resolved {
            record_prediction(request, &identity.result, false, latency_ms);
        }

        Ok(RecognitionOutcome::Resolved(resolved))
    }
}

/// Collapse identities that would land on the same cache entry
///
/// The highest-confidence identity per fingerprint is kept (the first one on a
/// tie), in first-seen order. Every fingerprint is computed before anything is
/// written, so bad features fail the request without a partial write.
fn merge_by_fingerprint(
    store: &CacheStore,
    kind: FeatureKind,
    identities: Vec<Identity>,
) -> Result<Vec<Identity>, CacheError> {
    let mut merged: Vec<(Fingerprint, Identity)> = Vec::with_capacity(identities.len());

    for identity in identities {
        let fingerprint = store.fingerprint(kind, &identity.features)?;
        match merged.iter_mut().find(|(existing, _)| *existing == fingerprint) {
            Some((_, kept)) => {
                let dropped = if identity.result.confidence > kept.result.confidence {
                    std::mem::replace(kept, identity)
                } else {
                    identity
                };
                tracing::debug!(
                    kind = %kind,
                    fingerprint = %fingerprint,
                    kept = %kept.result.name,
                    dropped = %dropped.result.name,
                    "Identities share a cache entry; keeping the most confident"
                );
            }
            None => merged.push((fingerprint, identity)),
        }
    }

    Ok(merged.into_iter().map(|(_, identity)| identity).collect())
}

/// Structured prediction event for the monitoring pipeline
fn record_prediction(
    request: &RecognitionRequest,
    result: &RecognitionResult,
    cached: bool,
    latency_ms: f64,
) {
    let kind = match request.kind {
        FeatureKind::Voice => "voice_recognition",
        FeatureKind::Face => "face_recognition",
    };
    tracing::info!(
        target: "tartan_id::telemetry",
        prediction_type = kind,
        prediction = %result.name,
        confidence = result.confidence,
        cached,
        latency_ms,
        context = request.context_str(),
        feature_count = request.features.len(),
        "Prediction recorded"
    );
}
