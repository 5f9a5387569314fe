//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! blocking-pool thread so the Tokio workers never stall during CPU-heavy
//! rendering.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 200 DPI would produce an image
//! in the tens of thousands of pixels per side. `max_rendered_pixels` caps
//! the longest edge regardless of physical size, keeping memory bounded and
//! the encoded payload within backend upload limits.

use crate::config::ExtractionConfig;
use crate::error::Pdf2XlsxError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Rasterise selected pages of a PDF into images.
///
/// This runs inside `spawn_blocking` since pdfium operations are CPU-bound.
///
/// # Returns
/// A vector of `(page_index_0based, DynamicImage)` tuples, in index order.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ExtractionConfig,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Pdf2XlsxError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || render_pages_blocking(&path, dpi, max_pixels, &indices))
        .await
        .map_err(|e| Pdf2XlsxError::Internal(format!("Render task panicked: {e}")))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Pdf2XlsxError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| Pdf2XlsxError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            continue;
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| Pdf2XlsxError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        // Page dimensions are in PDF points (1/72 inch), so the pixel width
        // at the requested DPI is width_pts / 72 * dpi, capped so oversized
        // pages cannot blow past backend upload limits.
        let width_px = (page.width().value / 72.0 * dpi as f32).round() as u32;
        let target_width = width_px.clamp(1, max_pixels);
        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width as i32)
            .set_maximum_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2XlsxError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok(results)
}

/// Read the page count without rendering anything.
pub async fn page_count(pdf_path: &Path) -> Result<usize, Pdf2XlsxError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let pdfium = Pdfium::default();
        let document =
            pdfium
                .load_pdf_from_file(&path, None)
                .map_err(|e| Pdf2XlsxError::CorruptPdf {
                    path: path.clone(),
                    detail: format!("{e:?}"),
                })?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| Pdf2XlsxError::Internal(format!("Page-count task panicked: {e}")))?
}
