//! Screenshot design scoring through a Gemini-style `generateContent` API.

use super::{api_key_from_env, DesignScores, VisionScorer};
use crate::config::VisionSettings;
use crate::error::VisionError;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const PROMPT: &str = "You are reviewing the visual design of a small-business website \
from a screenshot. Rate each aspect from 1 (very poor) to 10 (excellent): layout, color, \
typography, hierarchy, modernity. Reply with a JSON object containing exactly those five \
integer fields and nothing else.";

/// Vision scorer backed by a hosted multimodal model.
pub struct GeminiVisionScorer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiVisionScorer {
    pub fn new(endpoint: &str, model: &str, api_key: String, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.replace("{model}", model),
            api_key,
        }
    }

    /// Build from settings, reading the key from the configured variable.
    pub fn from_settings(settings: &VisionSettings, timeout_ms: u64) -> Result<Self, VisionError> {
        let key = api_key_from_env(&settings.api_key_env)?;
        Ok(Self::new(&settings.endpoint, &settings.model, key, timeout_ms))
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl VisionScorer for GeminiVisionScorer {
    async fn score_design(&self, png: &[u8]) -> Result<DesignScores, VisionError> {
        if png.is_empty() {
            return Err(VisionError::Unavailable("no screenshot captured".into()));
        }
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    { "inline_data": {
                        "mime_type": "image/png",
                        "data": base64::engine::general_purpose::STANDARD.encode(png),
                    }}
                ]
            }],
            "generationConfig": { "responseMimeType": "application/json", "temperature": 0 }
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VisionError::Http(format!("vision endpoint returned {status}")));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| VisionError::Malformed(e.to_string()))?;
        let text = parsed
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| VisionError::Malformed("response has no text part".into()))?;

        debug!("vision model replied: {text}");
        parse_scores(&text)
    }
}

/// Parse the model's JSON reply, tolerating a fenced code block around it.
pub fn parse_scores(text: &str) -> Result<DesignScores, VisionError> {
    let trimmed = text.trim();
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    let object = match (start, end) {
        (Some(s), Some(e)) if e > s => &trimmed[s..=e],
        _ => return Err(VisionError::Malformed("reply contains no JSON object".into())),
    };
    let scores: DesignScores =
        serde_json::from_str(object).map_err(|e| VisionError::Malformed(e.to_string()))?;
    scores.validated()
}
