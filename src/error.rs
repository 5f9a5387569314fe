//! Error types for the pdf2xlsx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2XlsxError`]: **Fatal**: the extraction run cannot proceed at all
//!   (bad input file, backend not configured, nothing to write). Returned as
//!   `Err(Pdf2XlsxError)` from the top-level `convert*` functions.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed at the transport
//!   boundary (network error, non-2xx status, empty body) but other pages
//!   are fine. Stored inside [`crate::table::PageOutcome::Failure`] so the
//!   run continues and the assembler can still place a diagnostic sheet at
//!   the page's position.
//!
//! Malformed model *responses* are deliberately absent from both types:
//! the normalizer (see [`crate::pipeline::normalize`]) absorbs every syntax
//! or schema problem and always produces a usable table, so those failures
//! never cross the page boundary as errors.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2xlsx library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::table::PageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2XlsxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The selected AI backend has no credential available.
    ///
    /// Surfaced *before* any page is processed so a misconfigured run fails
    /// fast rather than after minutes of rasterisation.
    #[error("Backend '{backend}' is not configured.\n{hint}")]
    BackendNotConfigured { backend: String, hint: String },

    /// No page produced a sheet; the workbook would be empty.
    #[error("No sheets to write: all {attempted} attempted pages failed and failed pages are skipped.\nFirst error: {first_error}")]
    EmptyRun {
        attempted: usize,
        first_error: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output workbook.
    #[error("Failed to write workbook '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A transport-level failure from one backend call.
///
/// Produced by [`crate::client::ExtractionClient::extract_table`] and wrapped
/// into a [`PageError`] by the page processor. Everything here is about the
/// network exchange; the response *content* is the normalizer's business.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// The HTTP request itself failed (DNS, TLS, connection reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The call exceeded the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response was 2xx but carried no text content block.
    #[error("response contained no text content")]
    MissingContent,
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::table::PageOutcome::Failure`] when a page fails.
/// The overall run continues unless `continue_on_failure` is off.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The backend call failed at the transport level.
    #[error("Page {page}: backend call failed: {source}")]
    Transport {
        page: usize,
        #[source]
        source: TransportError,
    },

    /// The backend returned a 2xx response with an empty body.
    #[error("Page {page}: backend returned an empty response")]
    EmptyResponse { page: usize },
}

impl PageError {
    /// The 1-based page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::Transport { page, .. } | PageError::EmptyResponse { page } => *page,
        }
    }
}
