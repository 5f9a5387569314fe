//! Response normalization: raw model text → a guaranteed [`TableResult`].
//!
//! ## Why a repair cascade?
//!
//! Even well-prompted models frequently return output that is *semantically*
//! the requested table but *structurally* broken, for example:
//!
//! - Wrapping the JSON in ` ```json ... ``` ` fences despite the prompt
//!   saying "no fences"
//! - Prefixing commentary ("Here is the table: {...}")
//! - Emitting Python-flavoured JSON: unquoted keys, single quotes,
//!   trailing commas, literal newlines inside strings
//! - Abandoning JSON entirely and printing a tab- or space-aligned table
//!
//! This module applies increasingly permissive parsing strategies until one
//! succeeds. Each repair transformation is an independent, composable pure
//! function, so new malformation patterns can be added as new stages without
//! touching existing ones.
//!
//! ## The one invariant
//!
//! [`normalize`] is **total**: every attempted page yields *some* rows for
//! the user, even if that is a single diagnostic placeholder. Syntax and
//! schema failures never escape this module.
//!
//! ## Stage order
//!
//! 1. Strict parse (after stripping one optional fenced code block)
//! 2. Greedy `{`…`}` substring extraction, strict parse again
//! 3. Syntax repairs, cumulative, re-parsing after each:
//!    escape control chars in strings → single→double quotes →
//!    quote bare identifiers → strip trailing commas
//! 4. Delimited-text fallback (tab / comma / 2+ space columns)
//! 5. Diagnostic placeholder naming the page and the failure class

use crate::table::TableResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Why the structured stages could not produce a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StructuredFailure {
    /// Not parseable as a JSON object at all (includes non-object documents).
    Syntax,
    /// Valid JSON object, but not the two-field schema we asked for.
    Schema(&'static str),
}

/// Normalize one raw model response into a table. Never fails.
///
/// A schema-level failure (valid JSON missing `headers` or `rows`) is
/// reported as a labeled placeholder immediately; a syntax-level failure
/// walks the rest of the cascade first.
pub fn normalize(raw: &str, page: usize) -> TableResult {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return placeholder(page, "model returned an empty response");
    }

    // Stage 1: strict parse, tolerating a single fence wrapper.
    let unfenced = strip_code_fence(trimmed);
    match try_structured(unfenced) {
        Ok(table) => return table,
        Err(StructuredFailure::Schema(detail)) => return schema_placeholder(page, detail),
        Err(StructuredFailure::Syntax) => {}
    }

    // Stage 2: the response may interleave commentary with the JSON.
    // Greedily grab the outermost brace span and try again.
    if let Some(span) = brace_span(unfenced) {
        match try_structured(span) {
            Ok(table) => {
                debug!(page, "recovered table via brace extraction");
                return table;
            }
            Err(StructuredFailure::Schema(detail)) => return schema_placeholder(page, detail),
            Err(StructuredFailure::Syntax) => {}
        }

        // Stage 3: syntax repairs, applied cumulatively. Stop at the first
        // transformation that yields a parseable document.
        let mut candidate = span.to_string();
        for (name, repair) in REPAIRS {
            candidate = repair(&candidate);
            match try_structured(&candidate) {
                Ok(table) => {
                    debug!(page, repair = name, "recovered table via syntax repair");
                    return table;
                }
                Err(StructuredFailure::Schema(detail)) => {
                    return schema_placeholder(page, detail)
                }
                Err(StructuredFailure::Syntax) => {}
            }
        }
    }

    // Stage 4: no structured form is recoverable; maybe the model printed
    // a plain-text table instead.
    if let Some(table) = parse_delimited_text(trimmed) {
        warn!(
            page,
            columns = table.width(),
            rows = table.rows.len(),
            "fell back to delimited-text table extraction"
        );
        return table;
    }

    // Stage 5: nothing table-like at all.
    placeholder(page, "response was not parseable as JSON and no delimited table was found")
}

fn placeholder(page: usize, detail: &str) -> TableResult {
    TableResult::placeholder(format!("Page {page}"), format!("Page {page}: {detail}"))
}

fn schema_placeholder(page: usize, detail: &str) -> TableResult {
    placeholder(page, &format!("response JSON missing required field ({detail})"))
}

// ── Stage 1: fence stripping ─────────────────────────────────────────────────

static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9]*[ \t]*\n?").unwrap());
static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?```\s*$").unwrap());

/// Strip one optional fenced code-block wrapper (opening fence with an
/// optional language tag, closing fence) from the trimmed text.
fn strip_code_fence(text: &str) -> &str {
    let mut s = text;
    if let Some(m) = RE_FENCE_OPEN.find(s) {
        s = &s[m.end()..];
    }
    if let Some(m) = RE_FENCE_CLOSE.find(s) {
        s = &s[..m.start()];
    }
    s.trim()
}

// ── Stage 2: brace extraction ────────────────────────────────────────────────

/// The substring from the first `{` to the last `}`, if both exist in order.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ── Structured parse + schema validation ─────────────────────────────────────

/// Parse `text` as the two-field document and validate its shape.
fn try_structured(text: &str) -> Result<TableResult, StructuredFailure> {
    let value: Value = serde_json::from_str(text).map_err(|_| StructuredFailure::Syntax)?;
    let obj = value.as_object().ok_or(StructuredFailure::Syntax)?;

    let headers_value = obj
        .get("headers")
        .ok_or(StructuredFailure::Schema("'headers' absent"))?;
    let rows_value = obj
        .get("rows")
        .ok_or(StructuredFailure::Schema("'rows' absent"))?;

    let headers: Vec<String> = headers_value
        .as_array()
        .ok_or(StructuredFailure::Schema("'headers' is not a list"))?
        .iter()
        .map(value_to_cell)
        .collect();
    if headers.is_empty() {
        return Err(StructuredFailure::Schema("'headers' is empty"));
    }

    let rows: Vec<Vec<String>> = rows_value
        .as_array()
        .ok_or(StructuredFailure::Schema("'rows' is not a list"))?
        .iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(value_to_cell).collect(),
            // A bare scalar where a row was expected becomes a one-cell row;
            // conform() pads it out to the header width.
            other => vec![value_to_cell(other)],
        })
        .collect();

    Ok(TableResult::new(headers, rows))
}

/// Stringify one cell value, preserving the model's formatting verbatim.
fn value_to_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Nested structure in a cell: keep it visible rather than lossy.
        other => other.to_string(),
    }
}

// ── Stage 3: syntax repairs ──────────────────────────────────────────────────

type Repair = fn(&str) -> String;

/// Ordered repair transformations, applied cumulatively with a re-parse
/// attempt after every step. Single-quote conversion must precede bare-atom
/// quoting: the atom scanner only tracks double-quoted strings, so a
/// single-quoted key would otherwise be double-wrapped.
const REPAIRS: [(&str, Repair); 4] = [
    ("escape_control_chars", escape_control_chars),
    ("normalize_single_quotes", normalize_single_quotes),
    ("quote_bare_atoms", quote_bare_atoms),
    ("strip_trailing_commas", strip_trailing_commas),
];

/// Escape literal newlines/tabs/carriage-returns *inside* string content.
/// Control characters between tokens are legal JSON whitespace (except
/// `\t`/`\r`, which are too) and are left untouched.
fn escape_control_chars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_string {
            match c {
                '\n' if !escaped => out.push_str("\\n"),
                '\t' if !escaped => out.push_str("\\t"),
                '\r' if !escaped => out.push_str("\\r"),
                _ => out.push(c),
            }
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

/// Quote bare identifiers outside string context: both unquoted keys
/// (`{headers: ...}`) and unquoted scalar values (`[A, B]`). The JSON
/// keywords `true`/`false`/`null` are left alone.
fn quote_bare_atoms(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
        } else if c.is_ascii_alphabetic() || c == '_' {
            // A letter right after a digit, dot, or sign is part of a number
            // literal (`1.5e3`, `2E+8`), not a bare atom.
            let numeric_tail = matches!(
                out.as_bytes().last(),
                Some(b'0'..=b'9' | b'.' | b'+' | b'-')
            );
            let mut atom = String::new();
            atom.push(c);
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    atom.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if numeric_tail || matches!(atom.as_str(), "true" | "false" | "null") {
                out.push_str(&atom);
            } else {
                out.push('"');
                out.push_str(&atom);
                out.push('"');
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert single-quote string delimiters to double quotes, leaving
/// apostrophes inside double-quoted strings untouched.
fn normalize_single_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_double = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
        } else if c == '\'' {
            out.push('"');
        } else {
            if c == '"' {
                in_double = true;
            }
            out.push(c);
        }
    }
    out
}

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Remove trailing commas before closing brackets and braces.
fn strip_trailing_commas(input: &str) -> String {
    RE_TRAILING_COMMA.replace_all(input, "$1").to_string()
}

// ── Stage 4: delimited-text fallback ─────────────────────────────────────────

static RE_DELIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t|,\s*|\s{2,}").unwrap());

/// Treat the response as a plain-text table: the first line splittable into
/// 2+ non-empty parts becomes the headers, subsequent non-empty lines the
/// rows (padded/truncated against the header count).
fn parse_delimited_text(text: &str) -> Option<TableResult> {
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let parts = split_delimited(line);
        if parts.len() < 2 {
            continue;
        }

        let headers: Vec<String> = parts;
        let rows: Vec<Vec<String>> = lines[i + 1..]
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| split_delimited(l))
            .filter(|cells| !cells.is_empty())
            .collect();

        return Some(TableResult::new(headers, rows));
    }

    None
}

fn split_delimited(line: &str) -> Vec<String> {
    RE_DELIM
        .split(line.trim())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
