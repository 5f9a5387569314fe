//! Anthropic Messages API client (vision).

use crate::config::ExtractionConfig;
use crate::error::TransportError;
use crate::pipeline::encode::EncodedPage;
use crate::prompts::EXTRACTION_PROMPT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{map_request_error, status_error, ExtractionClient};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Table extraction over the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

// ── Messages API request/response types ────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

// ── Implementation ─────────────────────────────────────────────────────────

impl AnthropicClient {
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
impl ExtractionClient for AnthropicClient {
    fn backend_name(&self) -> &'static str {
        "anthropic"
    }

    async fn extract_table(&self, image: &EncodedPage) -> Result<String, TransportError> {
        // Image first, then the instruction, matching the API's recommended
        // ordering for single-image prompts.
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: image.mime_type,
                            data: &image.base64,
                        },
                    },
                    ContentPart::Text {
                        text: EXTRACTION_PROMPT,
                    },
                ],
            }],
        };

        debug!(
            model = %self.model,
            image_bytes = image.base64.len(),
            "Sending extraction request to Anthropic API"
        );

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("failed to parse API response: {e}")))?;

        let text = api_response
            .content
            .iter()
            .find_map(|block| {
                if block.block_type == "text" {
                    block.text.clone()
                } else {
                    None
                }
            })
            .ok_or(TransportError::MissingContent)?;

        debug!(
            stop_reason = ?api_response.stop_reason,
            response_len = text.len(),
            "Received extraction response from Anthropic API"
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialises_with_base64_image_block() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 4096,
            temperature: 0.1,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: "image/png",
                            data: "AAAA",
                        },
                    },
                    ContentPart::Text { text: "extract" },
                ],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["type"], "image");
        assert_eq!(
            json["messages"][0]["content"][0]["source"]["media_type"],
            "image/png"
        );
        assert_eq!(json["messages"][0]["content"][1]["type"], "text");
    }

    #[test]
    fn response_text_block_is_found_after_non_text() {
        let raw = r#"{"content":[{"type":"thinking"},{"type":"text","text":"{\"headers\":[]}"}],"stop_reason":"end_turn"}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .content
            .iter()
            .find_map(|b| (b.block_type == "text").then(|| b.text.clone()).flatten())
            .unwrap();
        assert!(text.contains("headers"));
    }
}
