//! Recognition services
//!
//! The cache-aside orchestrator, the recognizer port and its provider
//! implementations, plus the image helpers they share.

pub mod cache_aside;
pub mod face_detector;
pub mod image_features;
pub mod llm_client;
pub mod overshoot_client;
pub mod payload;
pub mod recognizer;
pub mod shazam_client;
pub mod vision_recognizer;

pub use cache_aside::{CacheAside, OrchestratorError, RecognitionOutcome, ResolvedIdentity};
pub use face_detector::{BoundingBox, DetectedFace, FaceDetector, FullFrameDetector};
pub use image_features::{analyze_image, analyze_region, decode_image};
pub use llm_client::{OpenAiClient, VoiceActorRecognizer};
pub use overshoot_client::{OvershootClient, SceneAnalysis, SceneInterpretation};
pub use payload::{decode_base64_payload, PayloadError};
pub use recognizer::{
    Identity, RecognitionRequest, Recognizer, RecognizerError, UnconfiguredRecognizer,
};
pub use shazam_client::{MusicMatch, ShazamClient, TrackInfo, TrackSummary};
pub use vision_recognizer::VisionFaceRecognizer;
