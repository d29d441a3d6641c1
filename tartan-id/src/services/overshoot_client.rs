//! Overshoot scene analysis client
//!
//! Sends a base64 frame plus a prompt to the `/analyze` endpoint. Scene
//! results are not cached.

use crate::services::payload::strip_data_uri;
use crate::services::recognizer::RecognizerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OVERSHOOT_BASE_URL: &str = "https://api.overshoot.io/v1";

/// Raw `/analyze` reply; every field is optional on the wire
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalyzeResponse {
    description: String,
    analysis: String,
    elements: Vec<serde_json::Value>,
    mood: String,
    setting: String,
    context: String,
    confidence: f64,
}

/// General scene description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneAnalysis {
    pub scene_description: String,
    pub interpretation: String,
    pub elements: Vec<serde_json::Value>,
    pub mood: String,
    pub confidence: f64,
}

/// Scene interpretation informed by detected and identified faces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneInterpretation {
    pub scene_interpretation: String,
    pub interaction_analysis: String,
    pub setting: String,
    pub story_context: String,
    pub confidence: f64,
    pub detected_faces_count: usize,
}

pub struct OvershootClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl OvershootClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, RecognizerError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecognizerError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
        })
    }

    /// Describe the scene in a frame
    pub async fn analyze_scene(
        &self,
        image_base64: &str,
        context: &str,
    ) -> Result<SceneAnalysis, RecognizerError> {
        let reply = self
            .analyze(image_base64, &scene_prompt(context), 500)
            .await?;

        Ok(SceneAnalysis {
            scene_description: reply.description,
            interpretation: reply.analysis,
            elements: reply.elements,
            mood: reply.mood,
            confidence: reply.confidence,
        })
    }

    /// Interpret a scene given how many faces were found and who they are
    pub async fn interpret_with_faces(
        &self,
        image_base64: &str,
        detected_faces: usize,
        identified_people: &[String],
        context: &str,
    ) -> Result<SceneInterpretation, RecognizerError> {
        let prompt = faces_prompt(detected_faces, identified_people, context);
        let reply = self.analyze(image_base64, &prompt, 600).await?;

        Ok(SceneInterpretation {
            scene_interpretation: reply.description,
            interaction_analysis: reply.analysis,
            setting: reply.setting,
            story_context: reply.context,
            confidence: reply.confidence,
            detected_faces_count: detected_faces,
        })
    }

    async fn analyze(
        &self,
        image_base64: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<AnalyzeResponse, RecognizerError> {
        let payload = serde_json::json!({
            "image": strip_data_uri(image_base64),
            "prompt": prompt,
            "max_tokens": max_tokens,
        });

        let response = self
            .http_client
            .post(format!("{}/analyze", OVERSHOOT_BASE_URL))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RecognizerError::Network(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(RecognizerError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecognizerError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| RecognizerError::InvalidResponse(e.to_string()))
    }
}

pub fn scene_prompt(context: &str) -> String {
    let prompt = "Analyze this image and provide: 1) A detailed description of the scene, \
                  2) What's happening, 3) Notable elements or people, 4) The mood/atmosphere.";
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("{} Context: {}", prompt, context)
    }
}

pub fn faces_prompt(detected_faces: usize, identified_people: &[String], context: &str) -> String {
    let mut face_context = format!("Detected {} face(s) in the image.", detected_faces);
    if !identified_people.is_empty() {
        face_context.push_str(&format!(
            " Identified people: {}.",
            identified_people.join(", ")
        ));
    }
    if !context.is_empty() {
        face_context = format!("{}. {}", context, face_context);
    }

    format!(
        "Analyze this scene with the following context: {}\n\n\
         Provide:\n\
         1. What's happening in the scene\n\
         2. The interaction between people (if multiple)\n\
         3. The setting and atmosphere\n\
         4. What this scene might be about (if it's from a show/movie)\n",
        face_context
    )
}
