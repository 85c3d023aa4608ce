//! # jqfr-scrap
//!
//! Extract structured financial data from Japanese quarterly-report
//! (四半期決算短信) PDFs.
//!
//! ## Why this crate?
//!
//! Quarterly reports are born-digital PDFs with no table markup at all:
//! every table is just positioned text. Plain text extraction scrambles the
//! columns and loses which number belongs to which line item. This crate
//! reconstructs the tables from geometry — baseline bands, recurring
//! column alignment, numeric conventions like `△1,234` and `（単位：百万円）`
//! — and classifies the rows against a vocabulary of statement labels, so
//! `資産合計` comes out as a typed, tagged yen amount instead of a loose
//! string.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Decode    pdfium text extraction (CPU-bound, spawn_blocking)
//!  ├─ 2. Lines     fragments → baseline-banded lines, header/footer roles
//!  ├─ 3. Tables    aligned-line runs → column boundaries, cross-page merge
//!  ├─ 4. Cells     regions → grids, numeric canonicalisation
//!  ├─ 5. Classify  labels → semantic tags, typed values with units/periods
//!  └─ 6. Output    tables + line items + warnings (+ optional debug overlay)
//! ```
//!
//! Steps 1–3 run per page and fan out across workers; everything from the
//! cross-page merge on is sequential.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jqfr_scrap::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let result = extract("tanshin_q2.pdf", &config).await?;
//!     for item in &result.line_items {
//!         if let Some((value, unit)) = item.primary_value() {
//!             println!("{}\t{:?}\t{}\t{:?}", item.label, item.tag, value, unit);
//!         }
//!     }
//!     eprintln!("{} tables, {} warnings", result.tables.len(), result.warnings.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scrap` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! jqfr-scrap = { version = "0.1", default-features = false }
//! ```
//!
//! ## Degraded confidence, never silent loss
//!
//! Only unreadable input is fatal. A fragment outside every column band, a
//! label the vocabulary does not know, a value that fails numeric parsing —
//! each is kept in the output and annotated with a [`LayoutWarning`], so
//! downstream consumers can audit confidence without re-deriving it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod vocab;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{LayoutWarning, ScrapError};
pub use extract::{extract, extract_from_pages, extract_from_pages_async, extract_sync};
pub use model::{
    Cell, CellValue, ColumnBoundaries, Line, LineItem, LineItemValue, LineRole, PageFragments,
    Rect, SemanticTag, StatementKind, Table, TextFragment, Unit,
};
pub use output::{ExtractionResult, ExtractionStats};
pub use pipeline::overlay::{write_overlay_pdf, OverlayCanvas, OverlayPlan, OverlayRegion};
pub use vocab::StatementVocabulary;
