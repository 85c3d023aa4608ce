//! Table detection: find contiguous runs of lines that form tabular
//! regions and infer their column boundaries.
//!
//! Source documents carry no table markup at all — structure must be read
//! off the geometry. The signal used here is recurring horizontal
//! alignment: body lines with two or more runs whose left edges keep
//! landing on the same x-positions, line after line, are a table candidate.
//! Column boundaries are the clustered left edges across the candidate's
//! lines.
//!
//! A candidate must reach `min_table_rows` consecutive aligned lines to be
//! accepted; anything shorter is returned as prose. Header and footer
//! lines never participate.
//!
//! Ambiguity at the junction of two adjacent candidates is resolved by
//! exact column-count match, preferring the preceding candidate when both
//! match (see [`detect_tables`]).
//!
//! Tables that continue across a page break are stitched back together in
//! a separate sequential pass ([`merge_page_spanning`]) once every page has
//! been detected independently.

use crate::config::ExtractionConfig;
use crate::model::{ColumnBoundaries, Line, LineRole, TableRegion};
use tracing::debug;

/// Running cluster of column left edges for one table candidate.
struct EdgeCluster {
    /// Sorted cluster centers (running means).
    centers: Vec<f32>,
    /// How many lines contributed an edge to each center.
    support: Vec<usize>,
}

impl EdgeCluster {
    fn new(edges: &[f32]) -> Self {
        let mut centers: Vec<f32> = edges.to_vec();
        centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let support = vec![1; centers.len()];
        Self { centers, support }
    }

    /// How many of `edges` land within `tol` of an existing center.
    fn match_count(&self, edges: &[f32], tol: f32) -> usize {
        edges
            .iter()
            .filter(|&&x| self.centers.iter().any(|&c| (c - x).abs() <= tol))
            .count()
    }

    /// Fold a line's edges into the cluster, updating running means and
    /// inserting new centers for unmatched edges.
    fn absorb(&mut self, edges: &[f32], tol: f32) {
        for &x in edges {
            let nearest = self
                .centers
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (*a - x)
                        .abs()
                        .partial_cmp(&(*b - x).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, c)| (i, (*c - x).abs()));
            match nearest {
                Some((i, d)) if d <= tol => {
                    let n = self.support[i] as f32;
                    self.centers[i] = (self.centers[i] * n + x) / (n + 1.0);
                    self.support[i] += 1;
                }
                _ => {
                    let pos = self
                        .centers
                        .partition_point(|&c| c < x);
                    self.centers.insert(pos, x);
                    self.support.insert(pos, 1);
                }
            }
        }
    }

    /// Centers supported by at least two lines: recurrence is what
    /// distinguishes a column from a one-off indent.
    fn recurring_centers(&self) -> Vec<f32> {
        self.centers
            .iter()
            .zip(self.support.iter())
            .filter(|(_, &s)| s >= 2)
            .map(|(&c, _)| c)
            .collect()
    }

    fn column_count(&self) -> usize {
        let recurring = self.support.iter().filter(|&&s| s >= 2).count();
        if recurring >= 2 {
            recurring
        } else {
            self.centers.len()
        }
    }
}

/// One in-progress candidate during the scan.
struct Candidate {
    lines: Vec<Line>,
    cluster: EdgeCluster,
}

impl Candidate {
    fn new(line: Line) -> Self {
        let cluster = EdgeCluster::new(&line.left_edges());
        Self {
            lines: vec![line],
            cluster,
        }
    }

    fn push(&mut self, line: Line, tol: f32) {
        self.cluster.absorb(&line.left_edges(), tol);
        self.lines.push(line);
    }

    /// Promote to a region if large enough, otherwise hand the lines back
    /// as prose.
    fn finish(self, page: usize, config: &ExtractionConfig, prose: &mut Vec<Line>) -> Option<TableRegion> {
        let boundaries = ColumnBoundaries::from_edges(
            self.cluster.recurring_centers(),
            config.column_cluster_tolerance_pts,
        );
        if self.lines.len() >= config.min_table_rows && boundaries.len() >= 2 {
            let rect = self
                .lines
                .iter()
                .skip(1)
                .fold(self.lines[0].rect, |acc, l| acc.union(&l.rect));
            Some(TableRegion {
                lines: self.lines,
                boundaries,
                rect,
                first_page: page,
                last_page: page,
            })
        } else {
            prose.extend(self.lines);
            None
        }
    }
}

/// Scan the ordered lines of one page and split them into table regions and
/// non-tabular (prose) lines.
///
/// Prose lines are returned separately and never passed downstream to cell
/// reconciliation.
pub fn detect_tables(
    lines: Vec<Line>,
    page: usize,
    config: &ExtractionConfig,
) -> (Vec<TableRegion>, Vec<Line>) {
    let tol = config.column_cluster_tolerance_pts;
    let mut regions: Vec<TableRegion> = Vec::new();
    let mut prose: Vec<Line> = Vec::new();
    let mut candidate: Option<Candidate> = None;

    let mut iter = lines.into_iter().peekable();

    while let Some(line) = iter.next() {
        let tabular = line.role == LineRole::Body && line.run_count() >= 2;
        if !tabular {
            if let Some(cand) = candidate.take() {
                regions.extend(cand.finish(page, config, &mut prose));
            }
            prose.push(line);
            continue;
        }

        match candidate.as_mut() {
            None => candidate = Some(Candidate::new(line)),
            Some(cand) => {
                let edges = line.left_edges();
                let aligned = cand.cluster.match_count(&edges, tol) >= 2;
                if !aligned {
                    let done = candidate.take().unwrap();
                    regions.extend(done.finish(page, config, &mut prose));
                    candidate = Some(Candidate::new(line));
                    continue;
                }

                // The line aligns with the running candidate. If its column
                // count differs from the candidate's but exactly matches a
                // new table starting on the next line, it belongs to that
                // table; on an equal match it stays with the preceding one.
                // Candidates still short of `min_table_rows` absorb freely:
                // header rows often have fewer columns than the body below.
                let starts_next_table = cand.lines.len() >= config.min_table_rows
                    && line.run_count() != cand.cluster.column_count()
                    && iter
                        .peek()
                        .map(|next| {
                            next.role == LineRole::Body
                                && edges_match(&edges, &next.left_edges(), tol)
                        })
                        .unwrap_or(false);

                if starts_next_table {
                    let done = candidate.take().unwrap();
                    regions.extend(done.finish(page, config, &mut prose));
                    candidate = Some(Candidate::new(line));
                } else {
                    cand.push(line, tol);
                }
            }
        }
    }
    if let Some(cand) = candidate.take() {
        regions.extend(cand.finish(page, config, &mut prose));
    }

    debug!(page, regions = regions.len(), prose = prose.len(), "detected table regions");
    (regions, prose)
}

/// Same arity, pairwise within tolerance. Both slices come out of
/// [`Line::left_edges`] already ordered left to right.
fn edges_match(a: &[f32], b: &[f32], tol: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
}

/// Merge table regions that continue across a page break.
///
/// `regions` must be ordered by page then top-to-bottom, which makes the
/// last region of page `p` and the first of page `p + 1` adjacent in the
/// list. They are merged when their column boundary sets agree within the
/// clustering tolerance.
pub fn merge_page_spanning(
    regions: Vec<TableRegion>,
    config: &ExtractionConfig,
) -> Vec<TableRegion> {
    let tol = config.column_cluster_tolerance_pts;
    let mut merged: Vec<TableRegion> = Vec::new();
    for region in regions {
        match merged.last_mut() {
            Some(prev)
                if region.first_page == prev.last_page + 1
                    && prev.boundaries.matches(&region.boundaries, tol) =>
            {
                debug!(
                    from_page = prev.last_page,
                    to_page = region.first_page,
                    "merging page-spanning table"
                );
                prev.lines.extend(region.lines);
                prev.rect = prev.rect.union(&region.rect);
                prev.last_page = region.last_page;
            }
            _ => merged.push(region),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageFragments, Rect, TextFragment};
    use crate::pipeline::lines::assemble_lines;

    fn frag(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> TextFragment {
        TextFragment::new(Rect::new(x0, y0, x1, y1), text, y1 - y0, 0)
    }

    /// A two-column, `rows`-row block starting at `top`, 20pt leading.
    fn table_frags(top: f32, rows: usize) -> Vec<TextFragment> {
        let mut out = Vec::new();
        for r in 0..rows {
            let y = top - 20.0 * r as f32;
            out.push(frag(72.0, y, 150.0, y + 10.0, "項目"));
            out.push(frag(300.0, y, 360.0, y + 10.0, "1,000"));
        }
        out
    }

    fn lines_for(fragments: Vec<TextFragment>) -> Vec<Line> {
        let page = PageFragments {
            page_index: 0,
            width: 595.0,
            height: 842.0,
            fragments,
        };
        assemble_lines(&page, &ExtractionConfig::default())
    }

    #[test]
    fn aligned_run_forms_one_region() {
        let lines = lines_for(table_frags(700.0, 4));
        let (regions, prose) = detect_tables(lines, 0, &ExtractionConfig::default());
        assert_eq!(regions.len(), 1);
        assert!(prose.is_empty());
        assert_eq!(regions[0].boundaries.len(), 2);
        assert_eq!(regions[0].lines.len(), 4);
    }

    #[test]
    fn short_run_is_prose() {
        let lines = lines_for(table_frags(700.0, 2));
        let (regions, prose) = detect_tables(lines, 0, &ExtractionConfig::default());
        assert!(regions.is_empty());
        assert_eq!(prose.len(), 2);
    }

    #[test]
    fn single_run_lines_are_prose() {
        let mut frags = table_frags(700.0, 3);
        frags.push(frag(72.0, 760.0, 400.0, 770.0, "経営成績に関する説明"));
        let lines = lines_for(frags);
        let (regions, prose) = detect_tables(lines, 0, &ExtractionConfig::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(prose.len(), 1);
        assert!(prose[0].text().contains("経営成績"));
    }

    #[test]
    fn misaligned_block_splits_regions() {
        let mut frags = table_frags(700.0, 3);
        // Second block with shifted columns.
        for r in 0..3 {
            let y = 620.0 - 20.0 * r as f32;
            frags.push(frag(120.0, y, 200.0, y + 10.0, "別表"));
            frags.push(frag(420.0, y, 470.0, y + 10.0, "2,000"));
        }
        let lines = lines_for(frags);
        let (regions, _prose) = detect_tables(lines, 0, &ExtractionConfig::default());
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn junction_line_prefers_matching_column_count() {
        // Three 2-column rows, then a junction row whose label column also
        // sits at x=72 but which has 3 runs, followed by two more 3-run
        // rows at the new column positions: the junction row belongs to the
        // second table.
        let mut frags = table_frags(700.0, 3);
        for r in 0..3 {
            let y = 620.0 - 20.0 * r as f32;
            frags.push(frag(72.0, y, 150.0, y + 10.0, "項目"));
            frags.push(frag(250.0, y, 300.0, y + 10.0, "前期"));
            frags.push(frag(400.0, y, 450.0, y + 10.0, "当期"));
        }
        let lines = lines_for(frags);
        let (regions, _prose) = detect_tables(lines, 0, &ExtractionConfig::default());
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].lines.len(), 3);
        assert_eq!(regions[0].boundaries.len(), 2);
        assert_eq!(regions[1].lines.len(), 3);
        assert_eq!(regions[1].boundaries.len(), 3);
    }

    #[test]
    fn junction_row_sharing_columns_joins_the_new_table() {
        // The second table reuses the first table's two column positions
        // and adds a third. Its first row aligns with the old candidate,
        // but its column count matches the rows below, so it opens the new
        // table instead of being absorbed.
        let mut frags = table_frags(700.0, 3);
        for r in 0..3 {
            let y = 620.0 - 20.0 * r as f32;
            frags.push(frag(72.0, y, 150.0, y + 10.0, "項目"));
            frags.push(frag(300.0, y, 350.0, y + 10.0, "前期"));
            frags.push(frag(430.0, y, 480.0, y + 10.0, "当期"));
        }
        let lines = lines_for(frags);
        let (regions, _prose) = detect_tables(lines, 0, &ExtractionConfig::default());
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].lines.len(), 3);
        assert_eq!(regions[1].lines.len(), 3);
        assert_eq!(regions[1].boundaries.len(), 3);
    }

    #[test]
    fn header_and_footer_lines_never_join_tables() {
        let mut frags = table_frags(700.0, 3);
        // A two-run footer in the bottom margin band.
        frags.push(frag(72.0, 20.0, 150.0, 30.0, "社名"));
        frags.push(frag(300.0, 20.0, 360.0, 30.0, "- 3 -"));
        let lines = lines_for(frags);
        let (regions, prose) = detect_tables(lines, 0, &ExtractionConfig::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].lines.len(), 3);
        assert_eq!(prose.len(), 1);
    }

    #[test]
    fn page_spanning_regions_merge_when_boundaries_agree() {
        let (mut r0, _) = detect_tables(lines_for(table_frags(100.0, 3)), 0, &ExtractionConfig::default());
        let mut lines1 = lines_for(table_frags(780.0, 3));
        for l in &mut lines1 {
            l.page_index = 1;
        }
        let (mut r1, _) = detect_tables(lines1, 1, &ExtractionConfig::default());
        for r in &mut r1 {
            r.first_page = 1;
            r.last_page = 1;
        }
        r0.append(&mut r1);
        let merged = merge_page_spanning(r0, &ExtractionConfig::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].first_page, 0);
        assert_eq!(merged[0].last_page, 1);
        assert_eq!(merged[0].lines.len(), 6);
    }

    #[test]
    fn differing_boundaries_do_not_merge_across_pages() {
        let (mut r0, _) = detect_tables(lines_for(table_frags(100.0, 3)), 0, &ExtractionConfig::default());
        let mut frags = Vec::new();
        for r in 0..3 {
            let y = 780.0 - 20.0 * r as f32;
            frags.push(frag(120.0, y, 180.0, y + 10.0, "項目"));
            frags.push(frag(420.0, y, 480.0, y + 10.0, "9,999"));
        }
        let mut lines1 = lines_for(frags);
        for l in &mut lines1 {
            l.page_index = 1;
        }
        let (mut r1, _) = detect_tables(lines1, 1, &ExtractionConfig::default());
        for r in &mut r1 {
            r.first_page = 1;
            r.last_page = 1;
        }
        r0.append(&mut r1);
        let merged = merge_page_spanning(r0, &ExtractionConfig::default());
        assert_eq!(merged.len(), 2);
    }
}
