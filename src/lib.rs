//! # pdf2xlsx
//!
//! Resilient PDF table extraction: rasterise each page, ask a vision AI
//! backend for the largest table as structured JSON, repair whatever the
//! model actually returns, and assemble one worksheet per page into a
//! timestamped `.xlsx` workbook.
//!
//! ```text
//! PDF ──render──▶ page images ──encode──▶ base64
//!                                           │
//!                                     vision backend
//!                                  (Anthropic / DeepSeek / Gemini)
//!                                           │
//!                                raw text ──normalize──▶ TableResult
//!                                           │
//!                              PageOutcome per page, in order
//!                                           │
//!                                       assemble ──▶ .xlsx
//! ```
//!
//! The pipeline is built for messy reality: model responses wrapped in
//! code fences, Python-flavoured JSON, plain-text tables, and outright
//! transport failures all degrade gracefully. A page never takes the run
//! down with it; the only aborting condition is a run that produced no
//! sheets at all.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf2xlsx::{convert, Backend, ExtractionConfig};
//!
//! # async fn example() -> Result<(), pdf2xlsx::Pdf2XlsxError> {
//! let config = ExtractionConfig::builder()
//!     .backend(Backend::Anthropic)
//!     .output_dir("output")
//!     .build()?;
//!
//! let result = convert("report.pdf", &config).await?;
//! println!(
//!     "{} of {} pages extracted -> {}",
//!     result.stats.extracted_pages,
//!     result.stats.attempted_pages,
//!     result.output_path.display()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! Credentials come from the backend's environment variable
//! (`ANTHROPIC_API_KEY`, `DEEPSEEK_API_KEY`, `GEMINI_API_KEY`) unless set
//! explicitly on the config.
//!
//! ## Features
//!
//! - `cli` (default): the `pdf2xlsx` command-line binary and its
//!   dependencies (clap, indicatif, anyhow, tracing-subscriber).

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod table;

pub use client::{create_client, ExtractionClient};
pub use config::{
    Backend, ExtractionConfig, ExtractionConfigBuilder, FailedPagePolicy, PageImageFormat,
    PageSelection,
};
pub use convert::{convert, convert_sync, inspect, run_extraction, ConversionOutput, DocumentInfo};
pub use error::{PageError, Pdf2XlsxError, TransportError};
pub use pipeline::encode::EncodedPage;
pub use progress::{ExtractionProgressCallback, ProgressCallback};
pub use table::{PageOutcome, PipelineRun, RunStats, TableResult};
