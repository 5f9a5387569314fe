//! Tabular data model: per-page results and the run-level collection.
//!
//! [`TableResult`] is the one shape every pipeline stage agrees on: ordered
//! header labels plus ordered rows of strings. Cells are always strings;
//! the extraction prompt asks the model for verbatim formatting (no rounding,
//! `""` for missing cells), and keeping everything textual means the workbook
//! writer never has to guess at number formats.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// The normalized headers+rows representation of one page's extracted table.
///
/// Invariant: `headers` is non-empty. Row length is *conceptually* aligned
/// with the header count; call [`TableResult::conform`] to enforce the
/// pad-short/truncate-long policy before handing the table downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableResult {
    /// Column labels, order-significant.
    pub headers: Vec<String>,
    /// Data rows. An empty/missing cell is `""`, never an omitted entry.
    pub rows: Vec<Vec<String>>,
}

impl TableResult {
    /// Build a table and immediately apply the row-length policy.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut t = Self { headers, rows };
        t.conform();
        t
    }

    /// Single-column, single-row table. Used for diagnostic placeholders.
    pub fn placeholder(header: impl Into<String>, cell: impl Into<String>) -> Self {
        Self {
            headers: vec![header.into()],
            rows: vec![vec![cell.into()]],
        }
    }

    /// Force every row to exactly `headers.len()` cells: short rows are
    /// padded with empty strings, long rows are truncated.
    pub fn conform(&mut self) {
        let width = self.headers.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            } else if row.len() > width {
                row.truncate(width);
            }
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// The result of attempting one page, tagged with its 1-based page number.
///
/// Created by the page processor, consumed only by the assembler, never
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PageOutcome {
    /// The backend call succeeded and the response was normalized.
    ///
    /// Note: "success" means the transport succeeded; a garbled response
    /// still lands here, as a repaired or placeholder table.
    Success { page: usize, table: TableResult },
    /// The backend call itself failed.
    Failure { page: usize, error: PageError },
}

impl PageOutcome {
    /// The 1-based page number, the stable ordering key.
    pub fn page(&self) -> usize {
        match self {
            PageOutcome::Success { page, .. } | PageOutcome::Failure { page, .. } => *page,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PageOutcome::Success { .. })
    }
}

/// Ordered sequence of per-page outcomes, one per attempted page.
///
/// Built incrementally (append-only) by the driver, finalized when all
/// pages were attempted or the run was cut short, then consumed exactly
/// once by the assembler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRun {
    outcomes: Vec<PageOutcome>,
    /// True when cancellation or a stop-on-failure config ended the run
    /// before every selected page was attempted.
    aborted: bool,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next page's outcome. Outcomes arrive in document order.
    pub fn push(&mut self, outcome: PageOutcome) {
        self.outcomes.push(outcome);
    }

    /// Mark the run as cut short before all pages were attempted.
    pub fn mark_aborted(&mut self) {
        self.aborted = true;
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Number of pages attempted (successes and failures alike).
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[PageOutcome] {
        &self.outcomes
    }

    /// First recorded failure message, if any. Used by the empty-run error.
    pub fn first_error(&self) -> Option<String> {
        self.outcomes.iter().find_map(|o| match o {
            PageOutcome::Failure { error, .. } => Some(error.to_string()),
            PageOutcome::Success { .. } => None,
        })
    }
}

impl IntoIterator for PipelineRun {
    type Item = PageOutcome;
    type IntoIter = std::vec::IntoIter<PageOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

/// Aggregate timing and counting statistics for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages attempted (selected and reached before any abort).
    pub attempted_pages: usize,
    /// Pages whose backend call succeeded.
    pub extracted_pages: usize,
    /// Pages recorded as transport failures.
    pub failed_pages: usize,
    /// Sheets written to the workbook.
    pub sheet_count: usize,
    /// Wall-clock duration of the whole run.
    pub total_duration_ms: u64,
    /// Time spent rasterising pages.
    pub render_duration_ms: u64,
    /// Time spent in backend calls (excludes pacing sleeps).
    pub api_duration_ms: u64,
}
