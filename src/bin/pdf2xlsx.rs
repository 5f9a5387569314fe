//! CLI binary for pdf2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig`, runs the conversion, and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2xlsx::{
    convert, inspect, Backend, ExtractionConfig, ExtractionProgressCallback, FailedPagePolicy,
    PageOutcome, PageSelection, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one live bar plus a per-page log line.
/// The pipeline is strictly sequential, so pages complete in order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose bar length is set by `on_run_start`
    /// (called after page selection, before any backend calls).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting tables from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page: usize, _total: usize) {
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_done(&self, outcome: &PageOutcome, total: usize) {
        match outcome {
            PageOutcome::Success { page, table } => {
                self.bar.println(format!(
                    "  {} Page {:>3}/{:<3}  {}",
                    green("✓"),
                    page,
                    total,
                    dim(&format!(
                        "{} cols × {} rows",
                        table.width(),
                        table.rows.len()
                    )),
                ));
            }
            PageOutcome::Failure { page, error } => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                // Truncate very long error messages to keep output tidy.
                let msg = truncate_message(&error.to_string(), 80);
                self.bar.println(format!(
                    "  {} Page {:>3}/{:<3}  {}",
                    red("✗"),
                    page,
                    total,
                    red(&msg),
                ));
            }
        }
        self.bar.inc(1);
    }

    fn on_run_complete(&self, attempted: usize, succeeded: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages extracted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed)",
                if failed == attempted {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                attempted,
                red(&failed.to_string()),
            );
        }
    }
}

/// Cap a message at `max` characters, replacing the tail with an ellipsis.
/// Counts characters, not bytes, so multibyte text in an error body
/// (HTTP responses are arbitrary UTF-8) never splits a code point.
fn truncate_message(msg: &str, max: usize) -> String {
    if msg.chars().count() <= max {
        return msg.to_string();
    }
    let head: String = msg.chars().take(max.saturating_sub(1)).collect();
    format!("{head}\u{2026}")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (one sheet per page, into ./output/)
  pdf2xlsx invoice.pdf

  # Specific pages only
  pdf2xlsx --pages 3-15 report.pdf

  # DeepSeek backend with a custom output directory
  pdf2xlsx --backend deepseek --output-dir results financials.pdf

  # Faster pacing (no delay) and skip failed pages instead of
  # writing diagnostic sheets
  pdf2xlsx --delay-ms 0 --failed-pages skip scan.pdf

  # Keep raw model responses for debugging
  pdf2xlsx --save-responses debug/ statement.pdf

  # Stop at the first failed page
  pdf2xlsx --fail-fast ledger.pdf

  # Page count only, no API key needed
  pdf2xlsx --inspect-only scan.pdf

SUPPORTED BACKENDS:
  Backend      Default model              Credential env var
  ─────────    ─────────────────────────  ──────────────────
  anthropic    claude-sonnet-4-20250514   ANTHROPIC_API_KEY
  deepseek     deepseek-chat              DEEPSEEK_API_KEY
  gemini       gemini-2.5-flash           GEMINI_API_KEY

OUTPUT:
  One .xlsx workbook per run, named {input-stem}_{timestamp}.xlsx, with one
  worksheet per attempted page ("Page 1", "Page 2", ...). Pages whose
  backend call failed get a diagnostic sheet unless --failed-pages skip.

SETUP:
  1. Set API key:   export ANTHROPIC_API_KEY=sk-ant-...
  2. Extract:       pdf2xlsx document.pdf
"#;

/// Extract tables from PDF pages into an Excel workbook using vision AI.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2xlsx",
    version,
    about = "Extract tables from PDF pages into an Excel workbook using vision AI",
    long_about = "Rasterise each selected PDF page, ask a vision AI backend (Anthropic, \
DeepSeek, or Google Gemini) for the largest table on the page as structured JSON, repair \
malformed responses, and assemble one worksheet per page into a timestamped .xlsx workbook.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// AI backend: anthropic, deepseek, gemini.
    #[arg(short, long, env = "PDF2XLSX_BACKEND", default_value = "anthropic")]
    backend: Backend,

    /// Model ID (defaults to the backend's standard vision model).
    #[arg(long, env = "PDF2XLSX_MODEL")]
    model: Option<String>,

    /// API key (overrides the backend's environment variable).
    #[arg(long, env = "PDF2XLSX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory for the output workbook.
    #[arg(short, long, env = "PDF2XLSX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2XLSX_PAGES", default_value = "all")]
    pages: String,

    /// Rendering DPI (72-400).
    #[arg(long, env = "PDF2XLSX_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Delay between consecutive backend calls, in milliseconds.
    #[arg(long, env = "PDF2XLSX_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,

    /// Per-page backend call timeout in seconds.
    #[arg(long, env = "PDF2XLSX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Max model output tokens per page.
    #[arg(long, env = "PDF2XLSX_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: u32,

    /// Model temperature (0.0-2.0).
    #[arg(long, env = "PDF2XLSX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// What to do with pages whose backend call failed: diagnostic, skip.
    #[arg(long, env = "PDF2XLSX_FAILED_PAGES", default_value = "diagnostic")]
    failed_pages: FailedPagesArg,

    /// Stop the run at the first failed page (pages already done are kept).
    #[arg(long, env = "PDF2XLSX_FAIL_FAST")]
    fail_fast: bool,

    /// Save each raw model response to this directory for debugging.
    #[arg(long, env = "PDF2XLSX_SAVE_RESPONSES", value_name = "DIR")]
    save_responses: Option<PathBuf>,

    /// Print page count only, no extraction (needs no API key).
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2XLSX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FailedPagesArg {
    Diagnostic,
    Skip,
}

impl From<FailedPagesArg> for FailedPagePolicy {
    fn from(v: FailedPagesArg) -> Self {
        match v {
            FailedPagesArg::Diagnostic => FailedPagePolicy::DiagnosticSheet,
            FailedPagesArg::Skip => FailedPagePolicy::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input).await.context("Failed to inspect PDF")?;
        println!("File:   {}", cli.input.display());
        println!("Pages:  {}", info.page_count);
        println!("Size:   {} bytes", info.file_size_bytes);
        return Ok(());
    }

    // ── Ctrl-C: finish the current page, then assemble what we have ─────
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} finishing current page, then assembling…", cyan("⚠"));
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, cancel, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = convert(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    if !cli.quiet {
        let stats = &result.stats;
        eprintln!(
            "{}  {}/{} pages  {} sheets  {}ms  →  {}",
            if stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.extracted_pages,
            stats.attempted_pages,
            stats.sheet_count,
            stats.total_duration_ms,
            bold(&result.output_path.display().to_string()),
        );
        if result.run.aborted() {
            eprintln!(
                "   {}",
                dim("run stopped early; the workbook covers the pages attempted so far")
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(
    cli: &Cli,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ExtractionConfig::builder()
        .backend(cli.backend)
        .dpi(cli.dpi)
        .pages(pages)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .page_delay_ms(cli.delay_ms)
        .continue_on_failure(!cli.fail_fast)
        .failed_page_policy(cli.failed_pages.clone().into())
        .output_dir(cli.output_dir.clone())
        .cancel_flag(cancel);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref dir) = cli.save_responses {
        builder = builder.raw_response_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &pages {
            if p < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
            }
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_messages_alone() {
        assert_eq!(truncate_message("HTTP 500", 80), "HTTP 500");
    }

    #[test]
    fn truncate_caps_long_ascii_messages() {
        let long = "x".repeat(200);
        let msg = truncate_message(&long, 80);
        assert_eq!(msg.chars().count(), 80);
        assert!(msg.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_handles_multibyte_error_bodies() {
        // An HTTP error body can carry arbitrary UTF-8; a 3-byte character
        // straddling the cap must not split.
        let body = format!("HTTP 500 Internal Server Error: {}", "ệ".repeat(40));
        let msg = truncate_message(&body, 80);
        assert_eq!(msg.chars().count(), 80);
        assert!(msg.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_at_exactly_the_cap_is_unchanged() {
        let exact = "é".repeat(80);
        assert_eq!(truncate_message(&exact, 80), exact);
    }

    #[test]
    fn parse_pages_accepts_all_forms() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(
            parse_pages("5").unwrap(),
            PageSelection::Single(5)
        ));
        assert!(matches!(
            parse_pages("3-15").unwrap(),
            PageSelection::Range(3, 15)
        ));
        assert!(matches!(
            parse_pages("1,3,5").unwrap(),
            PageSelection::Set(ref v) if v == &[1, 3, 5]
        ));
    }

    #[test]
    fn parse_pages_rejects_zero_and_inverted_ranges() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-3").is_err());
    }
}
