//! Top-level extraction orchestration.
//!
//! ## Two phases
//!
//! Per-page work (line assembly and table detection) is embarrassingly
//! parallel: page data shares nothing with other pages except the
//! read-only vocabulary. Those stages fan out across `spawn_blocking`
//! workers, bounded by `page_parallelism`. Everything that crosses page
//! boundaries — stitching page-spanning tables, cell reconciliation,
//! classification — runs in a single sequential pass once every page has
//! been detected.
//!
//! The debug overlay consumes geometry captured here but is rendered by
//! the caller strictly after extraction returns, so a render failure can
//! never invalidate the result.

use crate::config::ExtractionConfig;
use crate::error::{LayoutWarning, ScrapError};
use crate::model::{Line, PageFragments, TableRegion};
use crate::output::{ExtractionResult, ExtractionStats};
use crate::pipeline::{cells, classify, decode, lines, overlay, tables};
use futures::stream::{self, StreamExt};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Per-page product of the parallel phase.
struct PageDetection {
    page_index: usize,
    width: f32,
    height: f32,
    fragment_count: usize,
    prose: Vec<Line>,
    regions: Vec<TableRegion>,
}

/// Extract structured financial data from the PDF at `path`.
///
/// Fatal only on unreadable or undecodable input; every layout or
/// classification problem degrades to a warning on the result instead.
pub async fn extract(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ScrapError> {
    let path = path.as_ref();
    let total_start = Instant::now();
    check_pdf_magic(path)?;

    let decode_start = Instant::now();
    let pages = decode::decode_pages(path).await?;
    let decode_ms = decode_start.elapsed().as_millis() as u64;

    let layout_start = Instant::now();
    let detections = if config.page_parallelism > 1 {
        detect_concurrent(&pages, config).await?
    } else {
        pages.iter().map(|p| detect_page(p, config)).collect()
    };

    Ok(finish(
        detections,
        config,
        decode_ms,
        layout_start,
        total_start,
    ))
}

/// Synchronous variant of [`extract`] for callers without a Tokio runtime.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ScrapError> {
    let path = path.as_ref();
    let total_start = Instant::now();
    check_pdf_magic(path)?;

    let decode_start = Instant::now();
    let pages = decode::decode_pages_blocking(path)?;
    let decode_ms = decode_start.elapsed().as_millis() as u64;

    let layout_start = Instant::now();
    let detections = pages.iter().map(|p| detect_page(p, config)).collect();
    Ok(finish(
        detections,
        config,
        decode_ms,
        layout_start,
        total_start,
    ))
}

/// Run the pipeline on already-decoded pages. Pure: no I/O, no shared
/// state, deterministic for a given input and configuration.
pub fn extract_from_pages(pages: &[PageFragments], config: &ExtractionConfig) -> ExtractionResult {
    let total_start = Instant::now();
    let detections = pages.iter().map(|p| detect_page(p, config)).collect();
    finish(detections, config, 0, total_start, total_start)
}

/// Async variant of [`extract_from_pages`]: identical output, but phase 1
/// fans out across blocking workers bounded by `page_parallelism`.
pub async fn extract_from_pages_async(
    pages: &[PageFragments],
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ScrapError> {
    let total_start = Instant::now();
    let detections = if config.page_parallelism > 1 {
        detect_concurrent(pages, config).await?
    } else {
        pages.iter().map(|p| detect_page(p, config)).collect()
    };
    Ok(finish(detections, config, 0, total_start, total_start))
}

/// Phase 1 for one page: assemble lines, detect table regions. Prose lines
/// are kept for the overlay and for unit-declaration context next to a
/// table.
fn detect_page(page: &PageFragments, config: &ExtractionConfig) -> PageDetection {
    let assembled = lines::assemble_lines(page, config);
    let (regions, prose) = tables::detect_tables(assembled, page.page_index, config);

    PageDetection {
        page_index: page.page_index,
        width: page.width,
        height: page.height,
        fragment_count: page.fragments.len(),
        prose,
        regions,
    }
}

/// Fan page detection out over blocking workers, bounded by
/// `page_parallelism`, then restore page order.
async fn detect_concurrent(
    pages: &[PageFragments],
    config: &ExtractionConfig,
) -> Result<Vec<PageDetection>, ScrapError> {
    let mut detections: Vec<PageDetection> = stream::iter(pages.iter().map(|page| {
        let page = page.clone();
        let config = config.clone();
        async move {
            tokio::task::spawn_blocking(move || detect_page(&page, &config))
                .await
                .map_err(|e| ScrapError::Internal(format!("detection task panicked: {e}")))
        }
    }))
    .buffer_unordered(config.page_parallelism)
    .collect::<Vec<_>>()
    .await
    .into_iter()
    .collect::<Result<_, _>>()?;

    detections.sort_by_key(|d| d.page_index);
    Ok(detections)
}

/// Phase 2: merge page-spanning regions, reconcile, classify, roll up.
fn finish(
    detections: Vec<PageDetection>,
    config: &ExtractionConfig,
    decode_ms: u64,
    layout_start: Instant,
    total_start: Instant,
) -> ExtractionResult {
    let vocab = config.resolve_vocabulary();

    let regions: Vec<TableRegion> = detections
        .iter()
        .flat_map(|d| d.regions.iter().cloned())
        .collect();
    let merged = tables::merge_page_spanning(regions, config);
    let reconciled: Vec<_> = merged.iter().map(|r| cells::reconcile(r, config)).collect();
    let layout_ms = layout_start.elapsed().as_millis() as u64;

    let classify_start = Instant::now();
    let mut line_items = Vec::new();
    for (i, table) in reconciled.iter().enumerate() {
        // A `（単位：…）` declaration often sits on its own line just above
        // the grid rather than inside it; pull it from the page's prose.
        let context = detections
            .iter()
            .find(|d| d.page_index == table.first_page)
            .and_then(|d| classify::context_unit(table, &d.prose));
        line_items.extend(classify::classify(table, i, &vocab, config, context));
    }
    let classify_ms = classify_start.elapsed().as_millis() as u64;

    let mut warnings: Vec<LayoutWarning> = reconciled
        .iter()
        .flat_map(|t| t.rows.iter().flatten())
        .flat_map(|c| c.warnings.iter().cloned())
        .collect();
    // Cell warnings were already copied onto their line items; only the
    // classifier's own warnings are new here.
    warnings.extend(line_items.iter().flat_map(|item| {
        item.warnings
            .iter()
            .filter(|w| !matches!(w, LayoutWarning::AmbiguousColumn { .. }))
            .cloned()
    }));

    let page_sizes: Vec<(f32, f32)> = detections.iter().map(|d| (d.width, d.height)).collect();
    let lines_by_page: Vec<Vec<Line>> = detections
        .iter()
        .map(|d| {
            let mut page_lines = d.prose.clone();
            page_lines.extend(d.regions.iter().flat_map(|r| r.lines.iter().cloned()));
            page_lines
        })
        .collect();
    let overlay = overlay::build_plan(&page_sizes, &lines_by_page, &reconciled);

    let stats = ExtractionStats {
        pages: detections.len(),
        fragments: detections.iter().map(|d| d.fragment_count).sum(),
        lines: detections
            .iter()
            .map(|d| d.prose.len() + d.regions.iter().map(|r| r.lines.len()).sum::<usize>())
            .sum(),
        tables: reconciled.len(),
        line_items: line_items.len(),
        decode_duration_ms: decode_ms,
        layout_duration_ms: layout_ms,
        classify_duration_ms: classify_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        pages = stats.pages,
        tables = stats.tables,
        line_items = stats.line_items,
        warnings = warnings.len(),
        "extraction complete"
    );
    debug!(?stats, "stage timings");

    ExtractionResult {
        tables: reconciled,
        line_items,
        warnings,
        stats,
        overlay,
    }
}

/// Cheap pre-check before handing the file to pdfium: it must exist, be
/// readable, and start with the `%PDF` magic.
fn check_pdf_magic(path: &Path) -> Result<(), ScrapError> {
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScrapError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ScrapError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ScrapError::Internal(format!("failed to open '{}': {e}", path.display())),
    })?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|_| ScrapError::NotAPdf {
            path: path.to_path_buf(),
            magic: [0; 4],
        })?;
    if &magic != b"%PDF" {
        return Err(ScrapError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn magic_check_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"<html></html>").unwrap();
        match check_pdf_magic(&path) {
            Err(ScrapError::NotAPdf { magic, .. }) => assert_eq!(&magic, b"<htm"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn magic_check_reports_missing_file() {
        match check_pdf_magic(Path::new("/no/such/report.pdf")) {
            Err(ScrapError::FileNotFound { .. }) => {}
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn magic_check_accepts_pdf_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert!(check_pdf_magic(&path).is_ok());
    }

    #[test]
    fn empty_pages_yield_empty_result() {
        let pages = vec![PageFragments {
            page_index: 0,
            width: 595.0,
            height: 842.0,
            fragments: vec![],
        }];
        let result = extract_from_pages(&pages, &ExtractionConfig::default());
        assert!(result.tables.is_empty());
        assert!(result.line_items.is_empty());
        assert_eq!(result.stats.pages, 1);
        assert_eq!(result.overlay.pages.len(), 1);
    }
}
