//! Top-level pipeline driver: PDF in, timestamped `.xlsx` out.
//!
//! The driver is deliberately layered so the interesting part, the
//! sequential, paced extraction loop, is independent of pdfium and the
//! network: [`run_extraction`] takes pre-encoded pages and any
//! [`ExtractionClient`], which is also how the integration tests drive it.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::client::{create_client, ExtractionClient};
use crate::config::{ExtractionConfig, PageSelection};
use crate::error::Pdf2XlsxError;
use crate::pipeline::assemble::{assemble, save_workbook};
use crate::pipeline::encode::{encode_page, EncodedPage};
use crate::pipeline::extract::process_page;
use crate::pipeline::render;
use crate::table::{PipelineRun, RunStats};

/// Everything a completed conversion produced.
#[derive(Debug)]
pub struct ConversionOutput {
    /// Path of the saved workbook.
    pub output_path: PathBuf,
    /// Per-page outcomes, in processing order.
    pub run: PipelineRun,
    /// Aggregate counters and timings.
    pub stats: RunStats,
}

/// Convert a PDF into a multi-sheet workbook using the configured backend.
///
/// Steps: validate the input file, resolve credentials, rasterise and encode
/// the selected pages, run the sequential extraction loop, then assemble and
/// save the workbook. The credential check happens *before* any rendering so
/// a missing API key fails in milliseconds, not after a 200-page raster.
pub async fn convert(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ConversionOutput, Pdf2XlsxError> {
    let pdf_path = pdf_path.as_ref();
    let run_started = Instant::now();

    validate_input(pdf_path)?;
    let client = create_client(config)?;

    let total_pages = render::page_count(pdf_path).await?;
    let indices = config.pages.to_indices(total_pages);
    if indices.is_empty() {
        return Err(Pdf2XlsxError::PageOutOfRange {
            page: highest_requested_page(&config.pages),
            total: total_pages,
        });
    }

    info!(
        path = %pdf_path.display(),
        total_pages,
        selected = indices.len(),
        backend = %config.backend,
        model = config.effective_model(),
        "starting conversion"
    );

    let render_started = Instant::now();
    let images = render::render_pages(pdf_path, config, &indices).await?;
    let mut pages = Vec::with_capacity(images.len());
    for (index, image) in &images {
        let encoded = encode_page(image, config.image_format).map_err(|e| {
            Pdf2XlsxError::Internal(format!("image encoding failed for page {}: {e}", index + 1))
        })?;
        // 1-based page numbers from here on; they name sheets and log lines.
        pages.push((index + 1, encoded));
    }
    let render_duration = render_started.elapsed();

    let (run, api_duration) = run_extraction(client.as_ref(), &pages, config).await;

    let mut workbook = assemble(&run, config.failed_page_policy)?;
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extracted".to_string());
    let output_path = save_workbook(&mut workbook, &config.output_dir, &stem)?;

    let stats = RunStats {
        total_pages,
        attempted_pages: run.attempted(),
        extracted_pages: run.succeeded(),
        failed_pages: run.failed(),
        sheet_count: match config.failed_page_policy {
            crate::config::FailedPagePolicy::DiagnosticSheet => run.attempted(),
            crate::config::FailedPagePolicy::Skip => run.succeeded(),
        },
        total_duration_ms: run_started.elapsed().as_millis() as u64,
        render_duration_ms: render_duration.as_millis() as u64,
        api_duration_ms: api_duration.as_millis() as u64,
    };

    info!(
        attempted = stats.attempted_pages,
        extracted = stats.extracted_pages,
        failed = stats.failed_pages,
        sheets = stats.sheet_count,
        elapsed_ms = stats.total_duration_ms,
        output = %output_path.display(),
        "conversion complete"
    );

    Ok(ConversionOutput { output_path, run, stats })
}

/// Basic facts about a PDF, gathered without any backend calls.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentInfo {
    /// Number of pages in the document.
    pub page_count: usize,
    /// Size of the file on disk, in bytes.
    pub file_size_bytes: u64,
}

/// Inspect a PDF without extracting anything. Needs no credential.
pub async fn inspect(pdf_path: impl AsRef<Path>) -> Result<DocumentInfo, Pdf2XlsxError> {
    let pdf_path = pdf_path.as_ref();
    validate_input(pdf_path)?;

    let page_count = render::page_count(pdf_path).await?;
    let file_size_bytes = std::fs::metadata(pdf_path)
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(DocumentInfo {
        page_count,
        file_size_bytes,
    })
}

/// Blocking wrapper around [`convert`] for callers without a runtime.
pub fn convert_sync(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ConversionOutput, Pdf2XlsxError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Pdf2XlsxError::Internal(format!("failed to start async runtime: {e}")))?;
    runtime.block_on(convert(pdf_path, config))
}

/// The sequential extraction loop over pre-encoded pages.
///
/// Strictly one request in flight at a time, with a fixed pacing delay
/// between consecutive requests. Pages are `(page_number_1based, image)`
/// pairs. Returns the run record plus the wall time spent inside backend
/// calls (pacing sleeps excluded).
///
/// The loop stops early in two cases, both marking the run aborted:
/// the cancellation flag is set, or a page fails while
/// `continue_on_failure` is off. Outcomes recorded before the stop are
/// kept and still get assembled.
pub async fn run_extraction(
    client: &dyn ExtractionClient,
    pages: &[(usize, EncodedPage)],
    config: &ExtractionConfig,
) -> (PipelineRun, Duration) {
    let total = pages.len();
    let mut run = PipelineRun::new();
    let mut api_duration = Duration::ZERO;

    if let Some(cb) = &config.progress_callback {
        cb.on_run_start(total);
    }

    for (i, (page, image)) in pages.iter().enumerate() {
        if let Some(flag) = &config.cancel_flag {
            if flag.load(Ordering::Relaxed) {
                warn!(
                    attempted = run.attempted(),
                    remaining = total - i,
                    "cancellation requested, stopping run"
                );
                run.mark_aborted();
                break;
            }
        }

        if let Some(cb) = &config.progress_callback {
            cb.on_page_start(*page, total);
        }

        let call_started = Instant::now();
        let outcome = process_page(client, *page, image, config).await;
        api_duration += call_started.elapsed();

        if let Some(cb) = &config.progress_callback {
            cb.on_page_done(&outcome, total);
        }

        let failed = !outcome.is_success();
        run.push(outcome);

        if failed && !config.continue_on_failure {
            warn!(page, "stopping run on first failure");
            run.mark_aborted();
            break;
        }

        let is_last = i + 1 == total;
        if !is_last && config.page_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.page_delay_ms)).await;
        }
    }

    if let Some(cb) = &config.progress_callback {
        cb.on_run_complete(run.attempted(), run.succeeded());
    }

    (run, api_duration)
}

/// Check the input path exists, is readable, and starts with the PDF magic.
fn validate_input(path: &Path) -> Result<(), Pdf2XlsxError> {
    if !path.exists() {
        return Err(Pdf2XlsxError::FileNotFound { path: path.to_path_buf() });
    }

    let mut magic = [0u8; 5];
    let read = std::fs::File::open(path)
        .and_then(|mut f| std::io::Read::read(&mut f, &mut magic));
    match read {
        Ok(n) if n >= 5 && &magic[..5] == b"%PDF-" => Ok(()),
        Ok(_) => Err(Pdf2XlsxError::NotAPdf {
            path: path.to_path_buf(),
            magic: [magic[0], magic[1], magic[2], magic[3]],
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Pdf2XlsxError::PermissionDenied { path: path.to_path_buf() })
        }
        Err(_) => Err(Pdf2XlsxError::FileNotFound { path: path.to_path_buf() }),
    }
}

/// Best representative page number for an out-of-range selection error.
fn highest_requested_page(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 1,
        PageSelection::Single(p) => *p,
        PageSelection::Range(_, end) => *end,
        PageSelection::Set(pages) => pages.iter().copied().max().unwrap_or(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_reported() {
        let err = validate_input(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"PK\x03\x04 zip data").unwrap();

        let err = validate_input(&path).unwrap_err();
        match err {
            Pdf2XlsxError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("real.pdf");
        std::fs::write(&path, b"%PDF-1.7\n...").unwrap();
        assert!(validate_input(&path).is_ok());
    }

    #[test]
    fn truncated_file_is_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert!(matches!(
            validate_input(&path).unwrap_err(),
            Pdf2XlsxError::NotAPdf { .. }
        ));
    }

    #[test]
    fn highest_requested_page_per_selection() {
        assert_eq!(highest_requested_page(&PageSelection::Single(9)), 9);
        assert_eq!(highest_requested_page(&PageSelection::Range(2, 6)), 6);
        assert_eq!(highest_requested_page(&PageSelection::Set(vec![4, 12, 3])), 12);
    }
}
