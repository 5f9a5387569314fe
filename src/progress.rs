//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the driver works through the document. The CLI uses this to run
//! its progress bar; library callers can forward events wherever they like
//! without the pipeline knowing how the host application communicates.
//!
//! The pipeline is strictly sequential, so callbacks are never invoked
//! concurrently; the `Send + Sync` bound only exists so the config remains
//! shareable across threads.

use crate::table::PageOutcome;
use std::sync::Arc;

/// Called by the driver as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first page's backend call.
    ///
    /// `total_pages` is the number of *selected* pages that will be
    /// attempted, not the document's full page count.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the backend request is sent for a page.
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page's outcome has been recorded, success or failure.
    fn on_page_done(&self, outcome: &PageOutcome, total_pages: usize) {
        let _ = (outcome, total_pages);
    }

    /// Called once after the last attempted page, before assembly.
    ///
    /// `attempted` may be less than the count given to `on_run_start` when
    /// the run was cancelled or stopped on a failure.
    fn on_run_complete(&self, attempted: usize, succeeded: usize) {
        let _ = (attempted, succeeded);
    }
}

/// Convenience alias for the injected callback handle.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
