//! Recognizer port
//!
//! A recognizer turns a feature set (plus optional context and raw image) into
//! zero or more identities. Implementations call external services; the cache
//! layer only sees this trait.

use crate::cache::RecognitionResult;
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use tartan_common::{FeatureKind, FeatureSet};
use thiserror::Error;

/// Input handed to a recognizer on a cache miss
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub kind: FeatureKind,
    /// Features the cache lookup was keyed on
    pub features: FeatureSet,
    /// Free-text hint from the caller (show name, scene description, ...)
    pub context: Option<String>,
    /// Decoded frame for face recognition
    pub image: Option<Arc<DynamicImage>>,
}

impl RecognitionRequest {
    pub fn voice(features: FeatureSet, context: Option<String>) -> Self {
        Self {
            kind: FeatureKind::Voice,
            features,
            context,
            image: None,
        }
    }

    pub fn face(features: FeatureSet, image: Arc<DynamicImage>, context: Option<String>) -> Self {
        Self {
            kind: FeatureKind::Face,
            features,
            context,
            image: Some(image),
        }
    }

    pub fn context_str(&self) -> &str {
        self.context.as_deref().unwrap_or("")
    }
}

/// One resolved identity
///
/// `features` is what the identity is cached under; a face carries its own
/// region features rather than the whole-frame features.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub result: RecognitionResult,
    pub features: FeatureSet,
    /// Provider explanation, not cached
    pub reasoning: Option<String>,
}

impl Identity {
    pub fn new(result: RecognitionResult, features: FeatureSet) -> Self {
        Self {
            result,
            features,
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Recognizer errors
#[derive(Debug, Error)]
pub enum RecognizerError {
    /// Provider has no API key configured
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Request lacked an input the recognizer needs
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image error: {0}")]
    Image(String),
}

/// Identity resolution capability
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Resolve identities for a request
    ///
    /// An empty vector means nothing was recognized (no face, no transcript).
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Identity>, RecognizerError>;
}

/// Stand-in used when a provider's API key is missing
///
/// Every call fails with [`RecognizerError::NotConfigured`].
pub struct UnconfiguredRecognizer {
    provider: &'static str,
}

impl UnconfiguredRecognizer {
    pub fn new(provider: &'static str) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Recognizer for UnconfiguredRecognizer {
    fn name(&self) -> &'static str {
        self.provider
    }

    async fn recognize(&self, _request: &RecognitionRequest) -> Result<Vec<Identity>, RecognizerError> {
        Err(RecognizerError::NotConfigured(self.provider.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_recognizer_fails() {
        let recognizer = UnconfiguredRecognizer::new("OpenAI");
        let request = RecognitionRequest::voice(FeatureSet::new(), None);

        let err = recognizer.recognize(&request).await.unwrap_err();
        assert!(matches!(err, RecognizerError::NotConfigured(ref p) if p == "OpenAI"));
        assert_eq!(err.to_string(), "OpenAI is not configured");
    }

    #[test]
    fn test_context_str_defaults_to_empty() {
        let request = RecognitionRequest::voice(FeatureSet::new(), None);
        assert_eq!(request.context_str(), "");
    }
}
