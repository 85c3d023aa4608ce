//! Line assembly: group the unordered fragments of one page into visually
//! coherent text lines.
//!
//! ## Why a derived tolerance band?
//!
//! Fragments sharing a baseline rarely share exact y-coordinates — ruby
//! annotations, superscript marks and mixed type sizes all jitter the
//! midpoints. A fixed point tolerance either splits headings or glues
//! adjacent body lines together. Deriving the band from the glyph heights
//! involved (`line_band_factor × height`) tracks the type size in use, so a
//! 14 pt heading and 9 pt body text each get an appropriate band.
//!
//! The assembler also undoes two decoder artefacts: words split across
//! several fragments are re-joined when the horizontal gap is small, and
//! fragments that start inside the first third of their predecessor are
//! dropped as invisible duplicates (typically phantom half-width spaces
//! painted over real glyphs).

use crate::config::ExtractionConfig;
use crate::model::{Line, LineRole, PageFragments, TextFragment};
use std::cmp::Ordering;
use tracing::debug;

/// Assemble the fragments of one page into lines, ordered top-to-bottom
/// then left-to-right.
///
/// A page with zero usable fragments yields an empty sequence, not an
/// error.
pub fn assemble_lines(page: &PageFragments, config: &ExtractionConfig) -> Vec<Line> {
    let mut frags: Vec<&TextFragment> = page.fragments.iter().filter(|f| !f.is_blank()).collect();
    if frags.is_empty() {
        return Vec::new();
    }

    // Top-to-bottom: y grows upward, so sort by descending midpoint.
    frags.sort_by(|a, b| {
        b.rect
            .mid_y()
            .partial_cmp(&a.rect.mid_y())
            .unwrap_or(Ordering::Equal)
    });

    let mut lines: Vec<Line> = Vec::new();
    let mut band: Vec<&TextFragment> = Vec::new();
    let mut band_mid = 0.0_f32;
    let mut band_height = 0.0_f32;

    for f in frags {
        let h = f.rect.height().max(f.font_size);
        if band.is_empty() {
            band.push(f);
            band_mid = f.rect.mid_y();
            band_height = h;
            continue;
        }
        let tolerance = config.line_band_factor * band_height.max(h);
        if (band_mid - f.rect.mid_y()).abs() <= tolerance {
            // Running mean keeps the band anchored to its members rather
            // than drifting with the last fragment seen.
            band_mid = (band_mid * band.len() as f32 + f.rect.mid_y()) / (band.len() + 1) as f32;
            band_height = band_height.max(h);
            band.push(f);
        } else {
            if let Some(line) = finish_band(&band, page.page_index, config) {
                lines.push(line);
            }
            band = vec![f];
            band_mid = f.rect.mid_y();
            band_height = h;
        }
    }
    if let Some(line) = finish_band(&band, page.page_index, config) {
        lines.push(line);
    }

    assign_roles(&mut lines, page.height, config.margin_band_ratio);
    debug!(
        page = page.page_index,
        lines = lines.len(),
        "assembled lines"
    );
    lines
}

/// Sort one baseline band left-to-right, suppress overlapping duplicates
/// and merge near-adjacent fragments into text runs.
fn finish_band(
    band: &[&TextFragment],
    page_index: usize,
    config: &ExtractionConfig,
) -> Option<Line> {
    if band.is_empty() {
        return None;
    }
    let mut sorted: Vec<&TextFragment> = band.to_vec();
    sorted.sort_by(|a, b| {
        a.rect
            .x0
            .partial_cmp(&b.rect.x0)
            .unwrap_or(Ordering::Equal)
    });

    // A fragment starting left of the previous fragment's first third is an
    // invisible duplicate painted over it; drop it.
    let mut kept: Vec<&TextFragment> = Vec::with_capacity(sorted.len());
    for f in sorted {
        if let Some(prev) = kept.last() {
            if f.rect.x0 < prev.rect.x0 + prev.rect.width() / 3.0 {
                continue;
            }
        }
        kept.push(f);
    }

    let mut runs: Vec<TextFragment> = Vec::new();
    for f in kept {
        match runs.last_mut() {
            Some(run) if joins_run(run, f, config) => {
                let gap = f.rect.x0 - run.rect.x1;
                // Reinsert the word space the decoder dropped.
                if gap >= 0.25 * run.font_size {
                    run.text.push(' ');
                }
                run.text.push_str(&f.text);
                run.rect = run.rect.union(&f.rect);
                run.font_size = run.font_size.max(f.font_size);
            }
            _ => runs.push(f.clone()),
        }
    }

    let rect = runs
        .iter()
        .skip(1)
        .fold(runs[0].rect, |acc, f| acc.union(&f.rect));

    Some(Line {
        fragments: runs,
        rect,
        page_index,
        role: LineRole::Body,
    })
}

/// Two bounds gate a merge: the font-size one catches ordinary word
/// breaks, the glyph-width one keeps narrow leader glyphs (`…` dot runs)
/// from bridging a column gap their font size alone would span.
fn joins_run(run: &TextFragment, next: &TextFragment, config: &ExtractionConfig) -> bool {
    let gap = next.rect.x0 - run.rect.x1;
    let char_width = run.rect.width() / run.text.chars().count().max(1) as f32;
    gap < config.intra_line_gap_factor * run.font_size.max(next.font_size)
        && gap < config.column_gap_factor * char_width
}

/// Mark the first/last line of a page as header/footer when it sits in the
/// page margin band. Interior lines never take those roles.
fn assign_roles(lines: &mut [Line], page_height: f32, margin_ratio: f32) {
    let n = lines.len();
    if n == 0 {
        return;
    }
    if lines[0].rect.y1 >= page_height * (1.0 - margin_ratio) {
        lines[0].role = LineRole::Header;
    }
    if lines[n - 1].rect.y0 <= page_height * margin_ratio {
        lines[n - 1].role = LineRole::Footer;
    }
}
