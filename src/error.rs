//! Error types for the jqfr-scrap library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`ScrapError`] — **Fatal**: the extraction cannot proceed at all
//!   (unreadable input, corrupt PDF, pdfium binding failure). Returned as
//!   `Err(ScrapError)` from the top-level `extract*` functions.
//!
//! * [`LayoutWarning`] — **Non-fatal**: a fragment, row or cell could not be
//!   handled with full confidence. Recorded as an annotation on the affected
//!   cell or line item and rolled up on the result, never thrown. This keeps
//!   the hard invariant of the pipeline: degraded confidence is surfaced,
//!   data is never silently dropped.
//!
//! The debug-overlay path gets its own fatal variant
//! ([`ScrapError::OverlayWriteFailed`]) because a failure there must be
//! reportable without invalidating the already-computed extraction result.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the jqfr-scrap library.
#[derive(Debug, Error)]
pub enum ScrapError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The document is encrypted; password-protected input is not supported.
    #[error("PDF '{path}' is encrypted; password-protected documents are not supported")]
    EncryptedPdf { path: PathBuf },

    /// pdfium failed to decode the text of a specific page.
    #[error("Text decode failed for page {page}: {detail}")]
    DecodeFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
         Install libpdfium or set PDFIUM_DYNAMIC_LIB_PATH to its location."
    )]
    PdfiumBindingFailed(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the structured output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The debug overlay document could not be produced. The extraction
    /// result computed before rendering started remains valid.
    #[error("Failed to write debug overlay '{path}': {detail}")]
    OverlayWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal, low-confidence condition attached to the output it affects.
///
/// Warnings accumulate on [`crate::model::Cell`] and
/// [`crate::model::LineItem`] and are rolled up on
/// [`crate::ExtractionResult::warnings`] so downstream consumers can audit
/// confidence without re-walking the tables.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum LayoutWarning {
    /// A fragment's x-position fell outside every column band; it was
    /// appended to the nearest column instead of being dropped.
    #[error("page {page}: fragment '{text}' at x={x:.1} outside all column bands, appended to column {column}")]
    AmbiguousColumn {
        page: usize,
        text: String,
        x: f32,
        column: usize,
    },

    /// A row's label matched nothing in the statement vocabulary; the row
    /// was emitted with a null semantic tag.
    #[error("table {table}, row {row}: label '{label}' not found in vocabulary")]
    UnclassifiedRow {
        table: usize,
        row: usize,
        label: String,
    },

    /// A cell expected to hold a number failed parsing; the raw text was
    /// retained.
    #[error("table {table}, row {row}, column {column}: '{raw}' is not numeric, kept as raw text")]
    NumericParse {
        table: usize,
        row: usize,
        column: usize,
        raw: String,
    },
}
