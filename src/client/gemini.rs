//! Google Gemini generateContent client (vision).
//!
//! Gemini can be told to answer with `application/json` directly
//! (`responseMimeType`), which makes the strict-parse stage of the
//! normalizer succeed far more often than with the other backends.

use crate::config::ExtractionConfig;
use crate::error::TransportError;
use crate::pipeline::encode::EncodedPage;
use crate::prompts::EXTRACTION_PROMPT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

use super::{map_request_error, status_error, ExtractionClient};

/// Table extraction over the Gemini generateContent API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

// ── generateContent request/response types ─────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    #[serde(rename = "text")]
    Text(&'a str),
    #[serde(rename = "inlineData")]
    InlineData(InlineData<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ── Implementation ─────────────────────────────────────────────────────────

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: String,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            http,
            api_key,
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl ExtractionClient for GeminiClient {
    fn backend_name(&self) -> &'static str {
        "gemini"
    }

    async fn extract_table(&self, image: &EncodedPage) -> Result<String, TransportError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text(EXTRACTION_PROMPT),
                    Part::InlineData(InlineData {
                        mime_type: image.mime_type,
                        data: &image.base64,
                    }),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
                response_mime_type: "application/json",
            },
        };

        let url = format!("{API_BASE}/{}:generateContent", self.model);

        debug!(
            model = %self.model,
            image_bytes = image.base64.len(),
            "Sending extraction request to Gemini API"
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("failed to parse API response: {e}")))?;

        let text = api_response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or(TransportError::MissingContent)?;

        debug!(response_len = text.len(), "Received extraction response from Gemini API");

        Ok(text)
    }
}
