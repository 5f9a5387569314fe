//! Per-page extraction: one encoded image → one [`PageOutcome`].
//!
//! Failure classification is the point of this module: transport-level
//! problems (network, HTTP status, timeout, missing content) produce a
//! [`PageOutcome::Failure`] carrying the page index, while *content*-level
//! problems (malformed JSON, prose instead of a table) are absorbed by the
//! normalization cascade and still count as success.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::client::ExtractionClient;
use crate::config::ExtractionConfig;
use crate::error::PageError;
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::normalize::normalize;
use crate::table::PageOutcome;

/// Run one page through the configured backend and normalize the response.
///
/// Never panics and never returns early through `?`: whatever happens is
/// folded into the returned outcome so the caller's sequential loop can
/// decide whether to continue.
pub async fn process_page(
    client: &dyn ExtractionClient,
    page: usize,
    image: &EncodedPage,
    config: &ExtractionConfig,
) -> PageOutcome {
    let started = Instant::now();
    debug!(page, backend = client.backend_name(), "requesting extraction");

    let raw = match client.extract_table(image).await {
        Ok(text) => text,
        Err(source) => {
            error!(page, error = %source, "extraction request failed");
            return PageOutcome::Failure {
                page,
                error: PageError::Transport { page, source },
            };
        }
    };

    persist_raw_response(config, page, &raw);

    if raw.trim().is_empty() {
        error!(page, "backend returned an empty response body");
        return PageOutcome::Failure {
            page,
            error: PageError::EmptyResponse { page },
        };
    }

    let table = normalize(&raw, page);
    info!(
        page,
        columns = table.width(),
        rows = table.rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "page extracted"
    );
    PageOutcome::Success { page, table }
}

/// Best-effort raw-response dump for debugging prompt or repair issues.
/// Write failures are logged and swallowed; they must not fail the page.
fn persist_raw_response(config: &ExtractionConfig, page: usize, raw: &str) {
    let Some(dir) = &config.raw_response_dir else {
        return;
    };
    if let Err(e) = write_response_file(dir, page, raw) {
        debug!(page, error = %e, "could not persist raw response");
    }
}

fn write_response_file(dir: &Path, page: usize, raw: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(format!("response_page_{page:03}.txt")), raw)
}
