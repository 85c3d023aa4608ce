//! Cell reconciliation: turn a detected table region into a fully populated
//! grid of cells.
//!
//! Each line's runs are bucketed into columns by their left edge; lines are
//! grouped into row bands, so a value line and the tightly stacked
//! annotation under it land in one row. Every (row, column) intersection
//! exists in the output, with explicit empty cells for the gaps.
//!
//! Numeric content is canonicalised here (half-width digits, thousands
//! separators removed, parenthesised and `△`-marked negatives rewritten
//! with a leading minus) so the classifier downstream only ever sees
//! canonical tokens. The text as it appeared on the page is kept alongside
//! in [`Cell::raw_text`].
//!
//! A run whose x-position falls left of every column band is appended to
//! the first column instead of being dropped, and the receiving cell is
//! marked with a low-confidence warning.

use crate::config::ExtractionConfig;
use crate::error::LayoutWarning;
use crate::model::{Cell, Line, Table, TableRegion};
use crate::vocab::fold_width;
use tracing::debug;

/// Reconcile one table region into a grid. Row count equals the number of
/// row bands found; column count equals the region's boundary count.
pub fn reconcile(region: &TableRegion, config: &ExtractionConfig) -> Table {
    let columns = region.boundaries.len();
    let bands = band_rows(&region.lines, config);
    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(bands.len());

    for (row_idx, band) in bands.iter().enumerate() {
        let mut cells: Vec<Cell> = (0..columns).map(|c| Cell::empty(row_idx, c)).collect();
        for (line_idx, &line) in band.iter().enumerate() {
            // Content joining across baselines takes the gap-derived
            // separator; runs on one baseline always join with a space.
            let line_sep = match line_idx {
                0 => ' ',
                i => separator(band[i - 1], line, config),
            };
            let mut touched = vec![false; columns];
            for frag in &line.fragments {
                let (col, ambiguous) = match region
                    .boundaries
                    .column_for(frag.rect.x0, config.column_cluster_tolerance_pts)
                {
                    Some(c) => (c.min(columns - 1), false),
                    None => (0, true),
                };
                let cell = &mut cells[col];
                if !cell.raw_text.is_empty() {
                    cell.raw_text
                        .push(if touched[col] { ' ' } else { line_sep });
                }
                touched[col] = true;
                cell.raw_text.push_str(&frag.text);
                cell.rect = Some(match cell.rect {
                    Some(r) => r.union(&frag.rect),
                    None => frag.rect,
                });
                if ambiguous {
                    cell.warnings.push(LayoutWarning::AmbiguousColumn {
                        page: frag.page_index,
                        text: frag.text.clone(),
                        x: frag.rect.x0,
                        column: col,
                    });
                }
            }
        }
        for cell in &mut cells {
            cell.text = canonicalize_numeric(&cell.raw_text);
        }
        rows.push(cells);
    }

    debug!(
        rows = rows.len(),
        columns,
        first_page = region.first_page,
        "reconciled table"
    );
    Table {
        rows,
        boundaries: region.boundaries.clone(),
        rect: region.rect,
        first_page: region.first_page,
        last_page: region.last_page,
    }
}

/// Group a region's lines (already top-to-bottom) into row bands.
///
/// Two consecutive lines share a band when they are tightly stacked
/// (annotation under a value, gap within the line-band tolerance) or when
/// they occupy disjoint columns within a line height of each other (content
/// of one logical row split across two baselines).
fn band_rows<'a>(lines: &'a [Line], config: &ExtractionConfig) -> Vec<Vec<&'a Line>> {
    let mut bands: Vec<Vec<&'a Line>> = Vec::new();
    for line in lines {
        let joins = match bands.last().and_then(|b| b.last()) {
            Some(prev) if prev.page_index == line.page_index => {
                let h = prev.rect.height().max(line.rect.height());
                let gap = prev.rect.y0 - line.rect.y1;
                gap <= config.line_band_factor * h
                    || (gap <= h && disjoint_spans(prev, line))
            }
            _ => false,
        };
        match bands.last_mut() {
            Some(band) if joins => band.push(line),
            _ => bands.push(vec![line]),
        }
    }
    bands
}

/// True when no run of `a` horizontally overlaps a run of `b`.
fn disjoint_spans(a: &Line, b: &Line) -> bool {
    a.fragments.iter().all(|fa| {
        b.fragments
            .iter()
            .all(|fb| fa.rect.x1 <= fb.rect.x0 || fb.rect.x1 <= fa.rect.x0)
    })
}

/// Separator for stacked content within one cell: a newline once the gap
/// exceeds `newline_gap_factor × line height`, otherwise a space.
fn separator(prev: &Line, line: &Line, config: &ExtractionConfig) -> char {
    let h = prev.rect.height().max(line.rect.height());
    let gap = prev.rect.y0 - line.rect.y1;
    if gap >= config.newline_gap_factor * h {
        '\n'
    } else {
        ' '
    }
}

// ── Numeric normalization ────────────────────────────────────────────────

/// Rewrite a cell's content with every numeric token canonicalised:
/// full-width digits folded to half-width, thousands separators removed,
/// `(…)`, `（…）`, `△` and `▲` negatives rewritten with a leading `-`.
/// Non-numeric tokens pass through width folding only.
pub fn canonicalize_numeric(raw: &str) -> String {
    raw.split_inclusive(['\n', ' '])
        .map(|piece| {
            let (tok, tail) = match piece.strip_suffix(['\n', ' ']) {
                Some(t) => (t, &piece[t.len()..]),
                None => (piece, ""),
            };
            let mut out = canonicalize_token(tok);
            out.push_str(tail);
            out
        })
        .collect()
}

fn canonicalize_token(tok: &str) -> String {
    let folded: String = tok.chars().map(fold_width).collect();
    let mut s = folded.trim().to_string();
    if s.is_empty() {
        return folded;
    }

    let mut negative = false;
    if let Some(inner) = s
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .or_else(|| s.strip_prefix('（').and_then(|t| t.strip_suffix('）')))
    {
        negative = true;
        s = inner.trim().to_string();
    }
    if let Some(rest) = s.strip_prefix(['△', '▲']) {
        negative = true;
        s = rest.trim().to_string();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest.trim().to_string();
    }

    let percent = s.ends_with('%');
    let body = s.strip_suffix('%').unwrap_or(&s);
    let digits: String = body.chars().filter(|&c| c != ',' && c != '，').collect();

    let numeric = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit());
    if !numeric {
        return folded;
    }

    let mut out = String::with_capacity(digits.len() + 2);
    if negative {
        out.push('-');
    }
    out.push_str(&digits);
    if percent {
        out.push('%');
    }
    out
}

/// Parse a canonical numeric token to `f64`. Accepts an optional trailing
/// `%`. Returns `None` for anything non-numeric.
pub fn parse_number(text: &str) -> Option<f64> {
    let canonical = canonicalize_token(text);
    let body = canonical.trim().trim_end_matches('%');
    if body.is_empty() {
        return None;
    }
    body.parse::<f64>().ok()
}
