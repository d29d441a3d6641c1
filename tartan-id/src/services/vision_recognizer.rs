//! Face identification through a vision chat model
//!
//! Faces are located by the configured [`FaceDetector`]; the frame is sent to
//! the model once with the face boxes listed, and each returned identity is
//! matched back to its face by index. In a multi-face frame every identity is
//! cached under its own face region features.

use crate::services::face_detector::{DetectedFace, FaceDetector};
use crate::services::llm_client::{IdentityCandidate, IdentityList, OpenAiClient};
use crate::services::payload::to_data_uri;
use crate::services::recognizer::{Identity, RecognitionRequest, Recognizer, RecognizerError};
use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;
use tartan_common::FeatureSet;

pub struct VisionFaceRecognizer {
    client: OpenAiClient,
    model: String,
    detector: Arc<dyn FaceDetector>,
}

impl VisionFaceRecognizer {
    pub fn new(client: OpenAiClient, model: impl Into<String>, detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            client,
            model: model.into(),
            detector,
        }
    }
}

/// Prompt listing the detected face boxes
pub fn face_prompt(faces: &[DetectedFace], context: &str) -> String {
    let mut prompt = String::from(
        "Identify the people whose faces appear in this image. Detected faces:\n",
    );
    for face in faces {
        prompt.push_str(&format!(
            "- face_id {}: x={} y={} width={} height={}\n",
            face.id, face.bbox.x, face.bbox.y, face.bbox.width, face.bbox.height
        ));
    }
    if !context.is_empty() {
        prompt.push_str(&format!("\nAdditional Context: {}\n", context));
    }
    prompt.push_str(
        "\nReply with a JSON object {\"identities\": [{\"face_id\": integer, \"name\": string, \
         \"notable_works\": [string], \"confidence\": number between 0 and 1, \"reasoning\": string}]}. \
         Omit faces you cannot identify.",
    );
    prompt
}

/// Pair model answers with detected faces
///
/// Answers naming an unknown face index are dropped; a missing `face_id` is
/// only accepted when exactly one face was detected. Each face is used once.
pub(crate) fn match_candidates(
    faces: &[DetectedFace],
    candidates: Vec<IdentityCandidate>,
) -> Vec<(usize, IdentityCandidate)> {
    let mut used = vec![false; faces.len()];
    let mut matched = Vec::new();

    for candidate in candidates.into_iter().filter(IdentityCandidate::is_named) {
        let index = match candidate.face_id {
            Some(id) => faces.iter().position(|f| f.id == id),
            None if faces.len() == 1 => Some(0),
            None => None,
        };

        match index {
            Some(i) if !used[i] => {
                used[i] = true;
                matched.push((i, candidate));
            }
            _ => {
                tracing::debug!(
                    face_id = ?candidate.face_id,
                    name = %candidate.name,
                    "Discarding identity without a matching face"
                );
            }
        }
    }

    matched
}

/// Features an identified face is cached under
///
/// A lone face is the subject of the frame and is keyed like the request, so
/// the same upload hits next time. With several faces each one gets its own
/// region entry.
pub(crate) fn cache_features(
    faces: &[DetectedFace],
    index: usize,
    image: &DynamicImage,
    request_features: &FeatureSet,
) -> FeatureSet {
    if faces.len() == 1 {
        request_features.clone()
    } else {
        faces[index].features(image)
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, RecognizerError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| RecognizerError::Image(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[async_trait]
impl Recognizer for VisionFaceRecognizer {
    fn name(&self) -> &'static str {
        "openai-vision"
    }

    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Identity>, RecognizerError> {
        let image = request
            .image
            .clone()
            .ok_or_else(|| RecognizerError::InvalidRequest("face recognition needs an image".into()))?;

        let faces = self.detector.detect(&image);
        if faces.is_empty() {
            tracing::info!(detector = self.detector.name(), "No faces detected");
            return Ok(Vec::new());
        }

        let png = {
            let image = Arc::clone(&image);
            tokio::task::spawn_blocking(move || encode_png(&image))
                .await
                .map_err(|e| RecognizerError::Image(format!("encode task failed: {}", e)))??
        };

        let messages = serde_json::json!([
            {
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": { "url": to_data_uri("image/png", &png) }
                    },
                    {
                        "type": "text",
                        "text": face_prompt(&faces, request.context_str())
                    }
                ]
            }
        ]);

        let reply = self.client.chat_json(&self.model, messages, 800).await?;
        let list = IdentityList::from_value(reply)?;

        let identities: Vec<Identity> = match_candidates(&faces, list.identities)
            .into_iter()
            .map(|(i, candidate)| {
                let features = cache_features(&faces, i, &image, &request.features);
                candidate.into_identity(features)
            })
            .collect();

        tracing::info!(
            model = %self.model,
            faces = faces.len(),
            identities = identities.len(),
            "Face identification complete"
        );

        Ok(identities)
    }
}
