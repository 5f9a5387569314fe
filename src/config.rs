//! Configuration types for PDF-table-to-workbook extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs, log them, and diff two runs to understand why
//! their outputs differ. There are no ambient lookups in the pipeline itself:
//! environment variables are consulted exactly once, at client construction,
//! and an explicit `api_key` always wins over them.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Pdf2XlsxError;
use crate::progress::ExtractionProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Which AI backend performs the table extraction.
///
/// All three variants share the [`crate::client::ExtractionClient`] contract;
/// picking one is a configuration choice, not a code fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Anthropic Messages API (vision). The default.
    #[default]
    Anthropic,
    /// DeepSeek chat completions.
    DeepSeek,
    /// Google Gemini generateContent (vision).
    Gemini,
}

impl Backend {
    /// Canonical lowercase name, used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Anthropic => "anthropic",
            Backend::DeepSeek => "deepseek",
            Backend::Gemini => "gemini",
        }
    }

    /// Environment variable consulted when no explicit `api_key` is set.
    pub fn credential_env_var(&self) -> &'static str {
        match self {
            Backend::Anthropic => "ANTHROPIC_API_KEY",
            Backend::DeepSeek => "DEEPSEEK_API_KEY",
            Backend::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Model used when [`ExtractionConfig::model`] is `None`.
    pub fn default_model(&self) -> &'static str {
        match self {
            Backend::Anthropic => "claude-sonnet-4-20250514",
            Backend::DeepSeek => "deepseek-chat",
            Backend::Gemini => "gemini-2.5-flash",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Backend {
    type Err = Pdf2XlsxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Backend::Anthropic),
            "deepseek" => Ok(Backend::DeepSeek),
            "gemini" | "google" => Ok(Backend::Gemini),
            other => Err(Pdf2XlsxError::InvalidConfig(format!(
                "Unknown backend '{other}' (expected anthropic, deepseek, or gemini)"
            ))),
        }
    }
}

/// Encoding used for the rasterised page sent over the wire.
///
/// PNG is lossless and keeps rendered text crisp, which matters for OCR
/// accuracy; JPEG trades some crispness for a smaller request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl PageImageFormat {
    /// MIME type sent to the backend alongside the base64 payload.
    pub fn mime_type(&self) -> &'static str {
        match self {
            PageImageFormat::Png => "image/png",
            PageImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// What the assembler does with a failed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailedPagePolicy {
    /// Emit a single-cell diagnostic sheet at the page's position, so sheet
    /// count always equals attempted-page count. The default.
    #[default]
    DiagnosticSheet,
    /// Drop failed pages from the workbook entirely.
    Skip,
}

/// Specifies which pages of the PDF to extract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Extract all pages (default).
    #[default]
    All,
    /// Extract a single page (1-indexed).
    Single(usize),
    /// Extract a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Extract specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Configuration for a PDF-table extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2xlsx::{Backend, ExtractionConfig};
///
/// let config = ExtractionConfig::builder()
///     .backend(Backend::Gemini)
///     .dpi(200)
///     .page_delay_ms(0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// AI backend performing the extraction. Default: [`Backend::Anthropic`].
    pub backend: Backend,

    /// Model identifier. If `None`, uses [`Backend::default_model`].
    pub model: Option<String>,

    /// Explicit API credential. Overrides the backend's environment variable.
    pub api_key: Option<String>,

    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 200.
    ///
    /// 200 DPI keeps table cell text sharp enough for a vision model to read
    /// reliably while the encoded image stays well below request-size limits.
    /// Increase to 300 for small-font statements; decrease for oversized pages.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// A safety cap independent of DPI. A 300-DPI render of an A0 page could
    /// exhaust memory; this caps either dimension, scaling the other
    /// proportionally.
    pub max_rendered_pixels: u32,

    /// Encoding for the page image sent to the backend. Default: PNG.
    pub image_format: PageImageFormat,

    /// Sampling temperature for the extraction completion. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what is on the page,
    /// which is exactly what table transcription wants.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    ///
    /// Dense tables can exceed 2000 output tokens; setting this too low
    /// silently truncates the JSON mid-row.
    pub max_tokens: u32,

    /// Per-backend-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Delay between consecutive page calls in milliseconds. Default: 1000.
    ///
    /// This is cooperative pacing against backend rate limits, not a
    /// correctness requirement. Set to 0 (as tests do) to disable it; the
    /// delay is never applied after the last page.
    pub page_delay_ms: u64,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Whether a failed page lets the run continue to the next page. Default: true.
    ///
    /// With `false` the run stops at the first transport failure, but the
    /// outcomes collected so far are still assembled into a workbook.
    pub continue_on_failure: bool,

    /// What the assembler does with failed pages. Default: diagnostic sheet.
    pub failed_page_policy: FailedPagePolicy,

    /// Directory the timestamped workbook is written into. Default: `output`.
    pub output_dir: PathBuf,

    /// When set, every raw model response is dumped here as
    /// `response_page_NNN.txt` for post-mortem debugging. Persistence is
    /// best-effort and never affects the page outcome.
    pub raw_response_dir: Option<PathBuf>,

    /// Cooperative cancellation flag, checked before each page's backend
    /// call. A cancelled run still assembles the outcomes collected so far.
    pub cancel_flag: Option<Arc<AtomicBool>>,

    /// Optional per-page progress callback.
    pub progress_callback: Option<Arc<dyn ExtractionProgressCallback>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: None,
            api_key: None,
            dpi: 200,
            max_rendered_pixels: 2000,
            image_format: PageImageFormat::default(),
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 120,
            page_delay_ms: 1000,
            pages: PageSelection::default(),
            continue_on_failure: true,
            failed_page_policy: FailedPagePolicy::default(),
            output_dir: PathBuf::from("output"),
            raw_response_dir: None,
            cancel_flag: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("image_format", &self.image_format)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("pages", &self.pages)
            .field("continue_on_failure", &self.continue_on_failure)
            .field("failed_page_policy", &self.failed_page_policy)
            .field("output_dir", &self.output_dir)
            .field("raw_response_dir", &self.raw_response_dir)
            .field("cancel_flag", &self.cancel_flag.as_ref().map(|_| "<flag>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model that will actually be sent to the backend.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.backend.default_model())
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn image_format(mut self, format: PageImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn page_delay_ms(mut self, ms: u64) -> Self {
        self.config.page_delay_ms = ms;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn continue_on_failure(mut self, v: bool) -> Self {
        self.config.continue_on_failure = v;
        self
    }

    pub fn failed_page_policy(mut self, policy: FailedPagePolicy) -> Self {
        self.config.failed_page_policy = policy;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn raw_response_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.raw_response_dir = Some(dir.into());
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.cancel_flag = Some(flag);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ExtractionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2XlsxError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2XlsxError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_dpi() {
        let c = ExtractionConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(c.dpi, 400);
        let c = ExtractionConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
    }

    #[test]
    fn effective_model_falls_back_per_backend() {
        let c = ExtractionConfig::builder()
            .backend(Backend::Gemini)
            .build()
            .unwrap();
        assert_eq!(c.effective_model(), "gemini-2.5-flash");

        let c = ExtractionConfig::builder()
            .backend(Backend::Gemini)
            .model("gemini-2.5-pro")
            .build()
            .unwrap();
        assert_eq!(c.effective_model(), "gemini-2.5-pro");
    }

    #[test]
    fn backend_from_str_aliases() {
        assert_eq!("claude".parse::<Backend>().unwrap(), Backend::Anthropic);
        assert_eq!("GEMINI".parse::<Backend>().unwrap(), Backend::Gemini);
        assert_eq!("deepseek".parse::<Backend>().unwrap(), Backend::DeepSeek);
        assert!("mistral".parse::<Backend>().is_err());
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractionConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
