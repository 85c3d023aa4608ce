//! CLI binary for jqfr-scrap.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, prints the extracted line items, and optionally
//! writes the debug overlay PDF.

use anyhow::{Context, Result};
use clap::Parser;
use jqfr_scrap::{extract, write_overlay_pdf, ExtractionConfig, ScrapError};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract line items from a quarterly report, TSV on stdout
  scrap tanshin_2q.pdf

  # Full result as JSON, written to a file
  scrap tanshin_2q.pdf --json -o result.json

  # Also write a debug overlay PDF showing detected lines and tables
  scrap tanshin_2q.pdf --debug overlay.pdf

  # Looser fuzzy matching, sequential page processing
  scrap tanshin_2q.pdf --fuzzy-threshold 0.6 --page-parallelism 1

EXIT CODES:
  0  extraction succeeded (classification misses are warnings, not errors)
  1  unreadable input, or the debug overlay could not be written
"#;

#[derive(Parser, Debug)]
#[command(
    name = "scrap",
    version,
    about = "Extract structured financial data from Japanese quarterly-report PDFs",
    long_about = "Reconstruct tables from the text geometry of 決算短信 PDFs and classify \
                  their rows into tagged, typed line items (balance sheet, P&L, cash flow, \
                  per-share figures). Rows the vocabulary does not recognise are kept and \
                  flagged rather than dropped.",
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file.
    input: PathBuf,

    /// Write a debug overlay PDF with detected regions outlined.
    #[arg(long, value_name = "PATH", env = "SCRAP_DEBUG")]
    debug: Option<PathBuf>,

    /// Output file (defaults to stdout).
    #[arg(short, long, env = "SCRAP_OUTPUT")]
    output: Option<PathBuf>,

    /// Emit the full result (tables, line items, warnings, stats) as JSON
    /// instead of line-item TSV.
    #[arg(long, env = "SCRAP_JSON")]
    json: bool,

    /// Minimum consecutive aligned lines to accept a table.
    #[arg(long, env = "SCRAP_MIN_TABLE_ROWS", default_value_t = 3)]
    min_table_rows: usize,

    /// Column left-edge clustering tolerance in points.
    #[arg(long, env = "SCRAP_COLUMN_TOLERANCE", default_value_t = 4.0)]
    column_tolerance: f32,

    /// Minimum normalised similarity (0-1) for fuzzy label matches.
    #[arg(long, env = "SCRAP_FUZZY_THRESHOLD", default_value_t = 0.75)]
    fuzzy_threshold: f64,

    /// Page-level worker fan-out; 1 disables parallelism.
    #[arg(long, env = "SCRAP_PAGE_PARALLELISM", default_value_t = 4)]
    page_parallelism: usize,

    /// Verbose logging (debug level).
    #[arg(short, long, env = "SCRAP_VERBOSE")]
    verbose: bool,

    /// Suppress all logging except errors.
    #[arg(short, long, env = "SCRAP_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ExtractionConfig::builder()
        .min_table_rows(cli.min_table_rows)
        .column_cluster_tolerance_pts(cli.column_tolerance)
        .fuzzy_match_threshold(cli.fuzzy_threshold)
        .page_parallelism(cli.page_parallelism)
        .build()
        .context("Invalid configuration")?;

    let result = extract(&cli.input, &config)
        .await
        .with_context(|| format!("Extraction failed for '{}'", cli.input.display()))?;

    if !cli.quiet {
        for warning in &result.warnings {
            eprintln!("warning: {warning}");
        }
    }

    // ── Emit the result before any debug rendering ───────────────────────
    let rendered = if cli.json {
        serde_json::to_string_pretty(&result).context("Failed to serialise result")?
    } else {
        result.to_tsv()
    };
    match &cli.output {
        Some(path) => std::fs::write(path, rendered.as_bytes()).map_err(|e| {
            ScrapError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            }
        })?,
        None => io::stdout()
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?,
    }

    // The result above is already emitted; an overlay failure only affects
    // the exit code.
    if let Some(debug_path) = &cli.debug {
        if let Err(e) = write_overlay_pdf(result.overlay, debug_path).await {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
        if !cli.quiet {
            eprintln!("debug overlay written to {}", debug_path.display());
        }
    }

    Ok(())
}
