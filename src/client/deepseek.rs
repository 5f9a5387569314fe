//! DeepSeek chat-completions client.
//!
//! deepseek-chat has no image input type; the page image travels as a
//! truncated base64 excerpt appended to the text prompt. Extraction quality
//! is accordingly weaker than the vision backends, which is exactly why the
//! normalizer's later cascade stages exist.

use crate::config::ExtractionConfig;
use crate::error::TransportError;
use crate::pipeline::encode::EncodedPage;
use crate::prompts::EXTRACTION_PROMPT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{map_request_error, status_error, ExtractionClient};

const API_URL: &str = "https://api.deepseek.com/chat/completions";

/// Characters of base64 image data included in the text prompt.
const IMAGE_EXCERPT_LEN: usize = 1000;

/// Table extraction over the DeepSeek chat-completions API.
pub struct DeepSeekClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

// ── Chat-completions request/response types ────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── Implementation ─────────────────────────────────────────────────────────

impl DeepSeekClient {
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

    fn build_prompt(image: &EncodedPage) -> String {
        let excerpt_len = image.base64.len().min(IMAGE_EXCERPT_LEN);
        format!(
            "{EXTRACTION_PROMPT}\n\nBase64 image data (truncated): {}...",
            &image.base64[..excerpt_len]
        )
    }
}

#[async_trait]
impl ExtractionClient for DeepSeekClient {
    fn backend_name(&self) -> &'static str {
        "deepseek"
    }

    async fn extract_table(&self, image: &EncodedPage) -> Result<String, TransportError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::build_prompt(image),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        debug!(model = %self.model, "Sending extraction request to DeepSeek API");

        let response = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("failed to parse API response: {e}")))?;

        let text = api_response
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or(TransportError::MissingContent)?;

        debug!(response_len = text.len(), "Received extraction response from DeepSeek API");

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_truncates_image_excerpt() {
        let image = EncodedPage {
            base64: "x".repeat(5000),
            mime_type: "image/png",
        };
        let prompt = DeepSeekClient::build_prompt(&image);
        assert!(prompt.starts_with(EXTRACTION_PROMPT));
        assert!(prompt.contains(&"x".repeat(IMAGE_EXCERPT_LEN)));
        assert!(!prompt.contains(&"x".repeat(IMAGE_EXCERPT_LEN + 1)));
        assert!(prompt.ends_with("..."));
    }

    #[test]
    fn prompt_handles_short_image_data() {
        let image = EncodedPage {
            base64: "abc".to_string(),
            mime_type: "image/png",
        };
        let prompt = DeepSeekClient::build_prompt(&image);
        assert!(prompt.contains("abc..."));
    }

    #[test]
    fn response_content_is_extracted() {
        let raw = r#"{"choices":[{"message":{"content":"{\"headers\":[\"A\"],\"rows\":[]}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .unwrap();
        assert!(text.contains("headers"));
    }
}
