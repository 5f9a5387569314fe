//! Backend clients: one polymorphic capability, three vendor variants.
//!
//! Every backend implements [`ExtractionClient`]: take one encoded page
//! image, return the raw response text or a [`TransportError`]. Nothing
//! here interprets the response (repair and validation belong to the
//! normalizer), so each client stays a thin, typed wrapper over its
//! vendor's wire format.
//!
//! Credential resolution happens once, in [`create_client`], before any
//! page is processed: an explicit `api_key` in the config wins, otherwise
//! the backend's environment variable is consulted, otherwise the run
//! fails fast with a setup hint.

mod anthropic;
mod deepseek;
mod gemini;

pub use anthropic::AnthropicClient;
pub use deepseek::DeepSeekClient;
pub use gemini::GeminiClient;

use crate::config::{Backend, ExtractionConfig};
use crate::error::{Pdf2XlsxError, TransportError};
use crate::pipeline::encode::EncodedPage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One AI backend able to extract a table from a page image.
///
/// Implementations send exactly one request per call and never retry;
/// pacing and failure policy live in the driver.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Canonical backend name for logs and diagnostics.
    fn backend_name(&self) -> &'static str;

    /// Send the page image with the extraction prompt and return the raw
    /// response text. Transport problems (network, non-2xx, timeout,
    /// missing content block) are the only error cases; malformed *text*
    /// is returned as-is for the normalizer to repair.
    async fn extract_table(&self, image: &EncodedPage) -> Result<String, TransportError>;
}

/// Build the configured backend client, resolving the credential first.
///
/// Precedence: explicit `config.api_key` overrides the backend's
/// environment variable. An absent credential is a configuration error
/// surfaced here, before any rasterisation or network traffic.
pub fn create_client(config: &ExtractionConfig) -> Result<Arc<dyn ExtractionClient>, Pdf2XlsxError> {
    let api_key = resolve_credential(config)?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .build()
        .map_err(|e| Pdf2XlsxError::Internal(format!("HTTP client construction failed: {e}")))?;

    let model = config.effective_model().to_string();
    let client: Arc<dyn ExtractionClient> = match config.backend {
        Backend::Anthropic => Arc::new(AnthropicClient::new(http, api_key, model, config)),
        Backend::DeepSeek => Arc::new(DeepSeekClient::new(http, api_key, model, config)),
        Backend::Gemini => Arc::new(GeminiClient::new(http, api_key, model, config)),
    };
    Ok(client)
}

fn resolve_credential(config: &ExtractionConfig) -> Result<String, Pdf2XlsxError> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    let var = config.backend.credential_env_var();
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(Pdf2XlsxError::BackendNotConfigured {
            backend: config.backend.as_str().to_string(),
            hint: format!("Set {var} or pass an explicit API key (--api-key)."),
        }),
    }
}

/// Map a reqwest send/body error to the transport taxonomy.
pub(crate) fn map_request_error(e: reqwest::Error, timeout_secs: u64) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout { secs: timeout_secs }
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Turn a non-2xx response into a [`TransportError::Status`], reading as
/// much of the body as possible for the diagnostic.
pub(crate) async fn status_error(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    TransportError::Status { status, body }
}
