//! OpenAI-compatible chat completions client and voice actor recognizer
//!
//! The model is asked for a JSON object of the form
//! `{"identities": [{"name", "notable_works", "confidence", "reasoning"}]}`.
//! An empty list means the model could not name anyone.

use crate::cache::RecognitionResult;
use crate::services::recognizer::{Identity, RecognitionRequest, Recognizer, RecognizerError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tartan_common::FeatureSet;

const USER_AGENT: &str = concat!("tartan-id/", env!("CARGO_PKG_VERSION"));

/// Minimal chat completions client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, RecognizerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RecognizerError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Run one chat completion and parse the reply as a JSON object
    pub async fn chat_json(
        &self,
        model: &str,
        messages: serde_json::Value,
        max_tokens: u32,
    ) -> Result<serde_json::Value, RecognizerError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
        });

        let url = format!("{}/v1/chat/completions", self.base_url);

        tracing::debug!(model, "Sending chat completion request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
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

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| RecognizerError::InvalidResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        parse_json_content(&content)
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Parse model output, tolerating a markdown code fence around the JSON
pub(crate) fn parse_json_content(content: &str) -> Result<serde_json::Value, RecognizerError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced)
        .map_err(|e| RecognizerError::InvalidResponse(format!("model reply is not JSON: {}", e)))
}

/// One identity as returned by the model
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IdentityCandidate {
    /// Face index for vision replies
    #[serde(default)]
    pub face_id: Option<usize>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notable_works: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl IdentityCandidate {
    /// Blank names and "unknown" answers don't count as identities
    pub fn is_named(&self) -> bool {
        let name = self.name.trim();
        !name.is_empty() && !name.eq_ignore_ascii_case("unknown")
    }

    pub fn into_identity(self, features: FeatureSet) -> Identity {
        let result = RecognitionResult::new(self.name.trim(), self.notable_works, self.confidence);
        let identity = Identity::new(result, features);
        match self.reasoning {
            Some(reasoning) if !reasoning.trim().is_empty() => identity.with_reasoning(reasoning),
            _ => identity,
        }
    }
}

/// Most confident named candidate; the earliest wins a tie
pub(crate) fn best_candidate(candidates: Vec<IdentityCandidate>) -> Option<IdentityCandidate> {
    candidates
        .into_iter()
        .filter(IdentityCandidate::is_named)
        .reduce(|best, candidate| {
            if candidate.confidence > best.confidence {
                candidate
            } else {
                best
            }
        })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IdentityList {
    #[serde(default)]
    pub identities: Vec<IdentityCandidate>,
}

impl IdentityList {
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecognizerError> {
        serde_json::from_value(value)
            .map_err(|e| RecognizerError::InvalidResponse(format!("unexpected reply shape: {}", e)))
    }
}

/// Build the voice identification prompt from clip features and context
pub fn voice_prompt(features: &FeatureSet, context: &str) -> String {
    format!(
        "Based on the following voice characteristics, identify the likely voice actor.\n\n\
         Audio Features:\n\
         - Mean Pitch: {:.2} Hz\n\
         - Pitch Variation: {:.2} Hz\n\
         - Spectral Centroid: {:.2} Hz\n\
         - Energy Level: {:.4}\n\
         - Tempo: {:.2} BPM\n\n\
         Additional Context: {}\n\n\
         Reply with a JSON object {{\"identities\": [{{\"name\": string, \"notable_works\": [string], \
         \"confidence\": number between 0 and 1, \"reasoning\": string}}]}}. \
         Use an empty list if you cannot identify anyone.",
        features.number_or_zero("mean_pitch"),
        features.number_or_zero("pitch_std"),
        features.number_or_zero("spectral_centroid_mean"),
        features.number_or_zero("energy"),
        features.number_or_zero("tempo"),
        context,
    )
}

/// Voice actor identification through a chat model
pub struct VoiceActorRecognizer {
    client: OpenAiClient,
    model: String,
}

impl VoiceActorRecognizer {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Recognizer for VoiceActorRecognizer {
    fn name(&self) -> &'static str {
        "openai-voice"
    }

    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Identity>, RecognizerError> {
        let prompt = voice_prompt(&request.features, request.context_str());
        let messages = serde_json::json!([
            {
                "role": "system",
                "content": "You identify voice actors from acoustic measurements. Answer only with JSON."
            },
            { "role": "user", "content": prompt }
        ]);

        let reply = self.client.chat_json(&self.model, messages, 500).await?;
        let list = IdentityList::from_value(reply)?;

        let candidates = list.identities.len();

        // Every answer describes the same clip, so only one can own its entry
        let identities: Vec<Identity> = best_candidate(list.identities)
            .map(|candidate| candidate.into_identity(request.features.clone()))
            .into_iter()
            .collect();

        tracing::info!(
            model = %self.model,
            candidates,
            identities = identities.len(),
            "Voice identification complete"
        );

        Ok(identities)
    }
}
