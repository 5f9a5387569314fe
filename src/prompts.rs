//! The extraction prompt shared by every backend.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the two-field schema (`headers`, `rows`)
//!    is part of each backend's contract; changing it must change exactly
//!    one place.
//!
//! 2. **Testability**: unit tests can inspect the prompt directly without
//!    calling a real backend, so schema regressions are caught cheaply.

/// Instruction sent with each page image.
///
/// Asks for exactly the two-field JSON payload the normalizer expects. The
/// "verbatim numbers, empty strings for missing cells, no commentary" rules
/// exist so that the strict-parse stage of the cascade succeeds as often as
/// possible; the later repair stages are for when the model disobeys anyway.
pub const EXTRACTION_PROMPT: &str = r#"Analyze the table in this page image and extract it as structured data.

Requirements:
1. Identify ALL rows and columns of the table.
2. Return the data as JSON with exactly this structure:
{
  "headers": ["Column 1", "Column 2", "Column 3"],
  "rows": [
    ["row 1 value 1", "row 1 value 2", "row 1 value 3"],
    ["row 2 value 1", "row 2 value 2", "row 2 value 3"]
  ]
}
3. IMPORTANT: Preserve number formatting verbatim. Do not round, do not strip
   thousands separators, and keep currency units as printed.
4. If the page contains several tables, extract the main/largest one.
5. Include any totals or summary rows in "rows".
6. Use "" (empty string) for blank or missing cells.
7. Return ONLY the JSON object. No markdown fences, no commentary before or
   after the JSON."#;
