//! Shazam (RapidAPI) client
//!
//! Music identification from a raw audio clip and track search by text.
//! Results are returned as-is and never cached.

use crate::services::recognizer::RecognizerError;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const SHAZAM_BASE_URL: &str = "https://shazam.p.rapidapi.com";
const SHAZAM_HOST: &str = "shazam.p.rapidapi.com";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const RATE_LIMIT_MS: u64 = 200;
/// Shazam reports no score; a returned match is treated as high confidence
const MATCH_CONFIDENCE: f64 = 0.95;

/// Full metadata for an identified track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub release_date: String,
    pub cover_art: String,
    pub apple_music_url: String,
    pub shazam_url: String,
    pub preview_url: String,
    pub confidence: f64,
}

/// Search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub title: String,
    pub artist: String,
    pub cover_art: String,
    pub shazam_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MusicMatch {
    Found(TrackInfo),
    NotFound,
}

/// Minimum spacing between provider calls
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Shazam rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

pub struct ShazamClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    api_key: String,
}

impl ShazamClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, RecognizerError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecognizerError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            api_key,
        })
    }

    /// Identify the song in a raw audio clip
    pub async fn identify(&self, audio: Vec<u8>) -> Result<MusicMatch, RecognizerError> {
        self.rate_limiter.wait().await;

        tracing::debug!(bytes = audio.len(), "Querying Shazam detect");

        let response = self
            .http_client
            .post(format!("{}/songs/v2/detect", SHAZAM_BASE_URL))
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", SHAZAM_HOST)
            .header("Content-Type", "text/plain")
            .query(&[("locale", "en-US")])
            .body(audio)
            .send()
            .await
            .map_err(|e| RecognizerError::Network(e.to_string()))?;

        let body = read_json(response).await?;
        let found = parse_detect_response(&body);

        match &found {
            MusicMatch::Found(track) => tracing::info!(
                title = %track.title,
                artist = %track.artist,
                "Shazam match"
            ),
            MusicMatch::NotFound => tracing::info!("Shazam found no match"),
        }

        Ok(found)
    }

    /// Search tracks by title, artist or lyrics
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<TrackSummary>, RecognizerError> {
        self.rate_limiter.wait().await;

        let limit = limit.to_string();
        let response = self
            .http_client
            .get(format!("{}/search", SHAZAM_BASE_URL))
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", SHAZAM_HOST)
            .query(&[("term", query), ("locale", "en-US"), ("limit", limit.as_str())])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| RecognizerError::Network(e.to_string()))?;

        let body = read_json(response).await?;
        Ok(parse_search_response(&body))
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, RecognizerError> {
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

fn text_at<'a>(value: &'a Value, pointer: &str, default: &'a str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Extract the matched track from a detect response
pub fn parse_detect_response(body: &Value) -> MusicMatch {
    let Some(track) = body.get("track") else {
        return MusicMatch::NotFound;
    };

    MusicMatch::Found(TrackInfo {
        title: text_at(track, "/title", "Unknown"),
        artist: text_at(track, "/subtitle", "Unknown Artist"),
        album: text_at(track, "/sections/0/metadata/0/text", "Unknown Album"),
        genre: text_at(track, "/genres/primary", "Unknown"),
        release_date: text_at(track, "/sections/0/metadata/1/text", "Unknown"),
        cover_art: text_at(track, "/images/coverart", ""),
        apple_music_url: text_at(track, "/url", ""),
        shazam_url: text_at(track, "/share/href", ""),
        preview_url: text_at(track, "/hub/actions/0/uri", ""),
        confidence: MATCH_CONFIDENCE,
    })
}

/// Extract track summaries from a search response
pub fn parse_search_response(body: &Value) -> Vec<TrackSummary> {
    body.pointer("/tracks/hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    let track = hit.get("track").unwrap_or(&Value::Null);
                    TrackSummary {
                        title: text_at(track, "/title", "Unknown"),
                        artist: text_at(track, "/subtitle", "Unknown Artist"),
                        cover_art: text_at(track, "/images/coverart", ""),
                        shazam_url: text_at(track, "/share/href", ""),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_with_match() {
        let body = json!({
            "track": {
                "title": "Song",
                "subtitle": "Band",
                "genres": {"primary": "Rock"},
                "sections": [{"metadata": [{"text": "Album"}, {"text": "1999"}]}],
                "images": {"coverart": "https://img/cover.jpg"},
                "share": {"href": "https://shazam/track"},
                "hub": {"actions": [{"uri": "https://preview.m4a"}]}
            }
        });

        let MusicMatch::Found(track) = parse_detect_response(&body) else {
            panic!("expected a match");
        };
        assert_eq!(track.title, "Song");
        assert_eq!(track.artist, "Band");
        assert_eq!(track.album, "Album");
        assert_eq!(track.release_date, "1999");
        assert_eq!(track.genre, "Rock");
        assert_eq!(track.preview_url, "https://preview.m4a");
        assert_eq!(track.apple_music_url, "");
        assert_eq!(track.confidence, 0.95);
    }

    #[test]
    fn test_detect_sparse_track_uses_defaults() {
        let MusicMatch::Found(track) = parse_detect_response(&json!({"track": {}})) else {
            panic!("expected a match");
        };
        assert_eq!(track.title, "Unknown");
        assert_eq!(track.album, "Unknown Album");
        assert_eq!(track.release_date, "Unknown");
    }

    #[test]
    fn test_detect_without_track() {
        assert_eq!(
            parse_detect_response(&json!({"matches": []})),
            MusicMatch::NotFound
        );
    }

    #[test]
    fn test_search_hits() {
        let body = json!({
            "tracks": {"hits": [
                {"track": {"title": "A", "subtitle": "X"}},
                {"track": {"title": "B", "subtitle": "Y", "share": {"href": "https://s/b"}}}
            ]}
        });

        let tracks = parse_search_response(&body);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].shazam_url, "https://s/b");
        assert!(parse_search_response(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(50);
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
