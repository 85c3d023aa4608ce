//! Pipeline stages for structured extraction from quarterly-report PDFs.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. feed fragments from a different decoder) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! decode ──▶ lines ──▶ tables ──▶ cells ──▶ classify
//! (pdfium)  (baseline  (column    (grid +   (vocabulary
//!            bands)     clusters)  numbers)  match)
//!                          │
//!                          └────▶ overlay (debug PDF, optional)
//! ```
//!
//! 1. [`decode`]   — pdfium text extraction into positioned fragments; runs
//!    in `spawn_blocking` because pdfium is not async-safe
//! 2. [`lines`]    — group fragments into baseline-banded lines, mark
//!    header/footer lines
//! 3. [`tables`]   — find runs of aligned lines, infer column boundaries,
//!    merge page-spanning regions
//! 4. [`cells`]    — reconcile regions into grids and canonicalise numeric
//!    tokens
//! 5. [`classify`] — match row labels against the statement vocabulary and
//!    parse typed values
//! 6. [`overlay`]  — draw detected geometry into a fresh PDF for human
//!    verification; never feeds back into extraction
pub mod cells;
pub mod classify;
pub mod decode;
pub mod lines;
pub mod overlay;
pub mod tables;
