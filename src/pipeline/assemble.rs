//! Workbook assembly: a finished [`PipelineRun`] → a multi-sheet `.xlsx`.
//!
//! Sheet accounting is the core contract here. With the default
//! [`FailedPagePolicy::DiagnosticSheet`], the workbook holds exactly one
//! sheet per *attempted* page: failed pages get a diagnostic sheet instead
//! of silently vanishing, so a 40-page run with 3 failures still produces
//! 40 sheets and the gaps are visible at a glance.

use std::path::{Path, PathBuf};

use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, info, warn};

use crate::config::FailedPagePolicy;
use crate::error::Pdf2XlsxError;
use crate::table::{PageOutcome, PipelineRun, TableResult};

/// Excel's hard sheet-name limit.
const SHEET_NAME_MAX: usize = 31;

/// Column width cap, in characters.
const COLUMN_WIDTH_MAX: usize = 50;

/// Build the output workbook from a completed run.
///
/// Returns [`Pdf2XlsxError::EmptyRun`] when the run produced no sheets at
/// all (no pages attempted, or every page failed under
/// [`FailedPagePolicy::Skip`]). This is the only condition that aborts
/// assembly; everything else degrades to diagnostic content.
pub fn assemble(run: &PipelineRun, policy: FailedPagePolicy) -> Result<Workbook, Pdf2XlsxError> {
    let mut workbook = Workbook::new();
    let mut sheets = 0usize;

    for outcome in run.outcomes() {
        match outcome {
            PageOutcome::Success { page, table } => {
                write_sheet(&mut workbook, *page, table)?;
                sheets += 1;
            }
            PageOutcome::Failure { page, error } => match policy {
                FailedPagePolicy::DiagnosticSheet => {
                    let table = TableResult::placeholder(
                        format!("Page {page}"),
                        format!("Extraction failed: {error}"),
                    );
                    write_sheet(&mut workbook, *page, &table)?;
                    sheets += 1;
                }
                FailedPagePolicy::Skip => {
                    warn!(page, "skipping failed page per policy");
                }
            },
        }
    }

    if sheets == 0 {
        return Err(Pdf2XlsxError::EmptyRun {
            attempted: run.attempted(),
            first_error: run
                .first_error()
                .unwrap_or_else(|| "no pages were attempted".to_string()),
        });
    }

    debug!(sheets, attempted = run.attempted(), "workbook assembled");
    Ok(workbook)
}

/// Write one page's table to its own worksheet.
fn write_sheet(
    workbook: &mut Workbook,
    page: usize,
    table: &TableResult,
) -> Result<(), Pdf2XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(sheet_name(page))
        .map_err(|e| Pdf2XlsxError::Internal(format!("invalid sheet name for page {page}: {e}")))?;

    let bold = Format::new().set_bold();
    for (col, header) in table.headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, header, &bold)
            .map_err(|e| write_error(page, e))?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            sheet
                .write_string((r + 1) as u32, c as u16, cell)
                .map_err(|e| write_error(page, e))?;
        }
    }

    for col in 0..table.width() {
        sheet
            .set_column_width(col as u16, column_width(table, col))
            .map_err(|e| write_error(page, e))?;
    }

    Ok(())
}

/// Width for one column: longest cell plus padding, capped so one runaway
/// cell does not produce a screen-wide column.
fn column_width(table: &TableResult, col: usize) -> f64 {
    let longest = table
        .rows
        .iter()
        .filter_map(|row| row.get(col))
        .map(|cell| cell.chars().count())
        .chain(table.headers.get(col).map(|h| h.chars().count()))
        .max()
        .unwrap_or(0);
    (longest + 2).min(COLUMN_WIDTH_MAX) as f64
}

fn write_error(page: usize, e: rust_xlsxwriter::XlsxError) -> Pdf2XlsxError {
    Pdf2XlsxError::Internal(format!("worksheet write failed on page {page}: {e}"))
}

/// `"Page N"`, truncated to Excel's 31-character limit with a `...` marker.
fn sheet_name(page: usize) -> String {
    let name = format!("Page {page}");
    if name.len() <= SHEET_NAME_MAX {
        name
    } else {
        format!("{}...", &name[..SHEET_NAME_MAX - 3])
    }
}

/// Save the workbook as `{stem}_{timestamp}.xlsx` inside `output_dir`,
/// creating the directory if needed. Returns the full output path.
pub fn save_workbook(
    workbook: &mut Workbook,
    output_dir: &Path,
    stem: &str,
) -> Result<PathBuf, Pdf2XlsxError> {
    std::fs::create_dir_all(output_dir).map_err(|e| Pdf2XlsxError::OutputWriteFailed {
        path: output_dir.to_path_buf(),
        detail: e.to_string(),
    })?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("{stem}_{timestamp}.xlsx"));
    workbook
        .save(&path)
        .map_err(|e| Pdf2XlsxError::OutputWriteFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;

    info!(path = %path.display(), "workbook saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PageError, TransportError};

    fn success(page: usize) -> PageOutcome {
        PageOutcome::Success {
            page,
            table: TableResult::new(
                vec!["A".to_string(), "B".to_string()],
                vec![vec!["1".to_string(), "2".to_string()]],
            ),
        }
    }

    fn failure(page: usize) -> PageOutcome {
        PageOutcome::Failure {
            page,
            error: PageError::Transport {
                page,
                source: TransportError::Network("connection reset".to_string()),
            },
        }
    }

    fn run_with(outcomes: Vec<PageOutcome>) -> PipelineRun {
        let mut run = PipelineRun::new();
        for o in outcomes {
            run.push(o);
        }
        run
    }

    #[test]
    fn diagnostic_policy_emits_one_sheet_per_attempted_page() {
        let run = run_with(vec![success(1), failure(2), success(3)]);
        let mut workbook = assemble(&run, FailedPagePolicy::DiagnosticSheet).unwrap();
        let names: Vec<String> = workbook
            .worksheets()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["Page 1", "Page 2", "Page 3"]);
    }

    #[test]
    fn skip_policy_omits_failed_pages() {
        let run = run_with(vec![success(1), failure(2), success(3)]);
        let mut workbook = assemble(&run, FailedPagePolicy::Skip).unwrap();
        assert_eq!(workbook.worksheets().len(), 2);
    }

    #[test]
    fn all_failed_under_skip_policy_is_an_empty_run() {
        let run = run_with(vec![failure(1), failure(2)]);
        let err = match assemble(&run, FailedPagePolicy::Skip) {
            Ok(_) => panic!("expected assemble to fail"),
            Err(e) => e,
        };
        match err {
            Pdf2XlsxError::EmptyRun { attempted, first_error } => {
                assert_eq!(attempted, 2);
                assert!(first_error.contains("connection reset"));
            }
            other => panic!("expected EmptyRun, got {other:?}"),
        }
    }

    #[test]
    fn zero_outcomes_is_an_empty_run() {
        let run = PipelineRun::new();
        assert!(matches!(
            assemble(&run, FailedPagePolicy::DiagnosticSheet),
            Err(Pdf2XlsxError::EmptyRun { attempted: 0, .. })
        ));
    }

    #[test]
    fn all_failed_under_diagnostic_policy_still_produces_sheets() {
        let run = run_with(vec![failure(1)]);
        let mut workbook = assemble(&run, FailedPagePolicy::DiagnosticSheet).unwrap();
        assert_eq!(workbook.worksheets().len(), 1);
    }

    #[test]
    fn sheet_names_respect_excel_limit() {
        assert_eq!(sheet_name(7), "Page 7");
        // Even the largest page index fits: "Page " plus 20 digits is 25 chars.
        assert!(sheet_name(usize::MAX).len() <= SHEET_NAME_MAX);
    }

    #[test]
    fn column_width_pads_and_caps() {
        let table = TableResult::new(
            vec!["Description".to_string(), "Qty".to_string()],
            vec![vec!["x".repeat(300), "7".to_string()]],
        );
        // A 300-char cell hits the cap.
        assert_eq!(column_width(&table, 0), COLUMN_WIDTH_MAX as f64);
        // A short column gets the longest entry (the header) plus padding.
        assert_eq!(column_width(&table, 1), ("Qty".len() + 2) as f64);
    }

    #[test]
    fn save_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_with(vec![success(1)]);
        let mut workbook = assemble(&run, FailedPagePolicy::DiagnosticSheet).unwrap();

        let path = save_workbook(&mut workbook, dir.path(), "invoice").unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("invoice_"));
        assert!(name.ends_with(".xlsx"));
    }
}
