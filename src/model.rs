//! Core data model for layout reconstruction.
//!
//! Everything the pipeline passes between stages lives here, ordered
//! leaf-first: geometry ([`Rect`]), decoded input ([`TextFragment`],
//! [`PageFragments`]), assembled layout ([`Line`], [`ColumnBoundaries`]),
//! reconstructed structure ([`Cell`], [`Table`]) and classified output
//! ([`LineItem`], [`CellValue`]).
//!
//! Lifecycles differ by stage: fragments and lines are page-scoped and
//! discarded once tables are assembled; tables and line items survive the
//! extraction call and are handed to the caller.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner of
//! the page (y grows upward), matching what pdfium reports.

use crate::error::LayoutWarning;
use serde::{Deserialize, Serialize};

// ── Geometry ─────────────────────────────────────────────────────────────

/// Axis-aligned bounding box in page coordinates (points, y-up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Vertical midpoint, used for baseline-band grouping.
    pub fn mid_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest rect containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// True when the interiors intersect. Shared edges do not count as
    /// overlap, so adjacent cells in a grid are disjoint.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

// ── Decoded input ────────────────────────────────────────────────────────

/// A single positioned run of text as produced by the document decoder,
/// before any structural grouping. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub rect: Rect,
    pub text: String,
    /// Scaled font size in points; drives the vertical grouping tolerance.
    pub font_size: f32,
    /// Zero-based page index this fragment was decoded from.
    pub page_index: usize,
}

impl TextFragment {
    pub fn new(rect: Rect, text: impl Into<String>, font_size: f32, page_index: usize) -> Self {
        Self {
            rect,
            text: text.into(),
            font_size,
            page_index,
        }
    }

    /// Fragments with no printable content are dropped before line assembly.
    pub fn is_blank(&self) -> bool {
        self.rect.width() <= 0.0 || self.text.trim().is_empty()
    }
}

/// The decode product for one page: page geometry plus the unordered set of
/// text fragments found on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFragments {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub fragments: Vec<TextFragment>,
}

// ── Assembled layout ─────────────────────────────────────────────────────

/// Role of a line on the page. Header and footer lines are excluded from
/// table detection; only the first and last line of a page qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineRole {
    Body,
    Header,
    Footer,
}

/// Fragments grouped by shared baseline band: one visual row of text.
///
/// After assembly the contained fragments are merged text runs ordered
/// left to right, not raw decoder fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub fragments: Vec<TextFragment>,
    pub rect: Rect,
    pub page_index: usize,
    pub role: LineRole,
}

impl Line {
    /// Concatenated text of all runs, single space between runs.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Left x-coordinates of the runs, the raw material for column detection.
    pub fn left_edges(&self) -> Vec<f32> {
        self.fragments.iter().map(|f| f.rect.x0).collect()
    }

    pub fn run_count(&self) -> usize {
        self.fragments.len()
    }
}

/// Inferred left edges of the columns of one table, sorted ascending.
///
/// Invariant: strictly increasing and separated by more than the clustering
/// tolerance the detector was configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBoundaries {
    xs: Vec<f32>,
}

impl ColumnBoundaries {
    /// Build from raw x-coordinates, sorting and merging values closer than
    /// `min_gap` into their mean.
    pub fn from_edges(mut edges: Vec<f32>, min_gap: f32) -> Self {
        edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mut xs: Vec<f32> = Vec::with_capacity(edges.len());
        let mut cluster: Vec<f32> = Vec::new();
        for x in edges {
            match cluster.last() {
                Some(&last) if x - last <= min_gap => cluster.push(x),
                _ => {
                    if !cluster.is_empty() {
                        xs.push(cluster.iter().sum::<f32>() / cluster.len() as f32);
                    }
                    cluster = vec![x];
                }
            }
        }
        if !cluster.is_empty() {
            xs.push(cluster.iter().sum::<f32>() / cluster.len() as f32);
        }
        Self { xs }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &[f32] {
        &self.xs
    }

    /// Index of the column whose span contains `x`, or `None` when `x` lies
    /// more than `tolerance` left of the first boundary.
    pub fn column_for(&self, x: f32, tolerance: f32) -> Option<usize> {
        if self.xs.is_empty() {
            return None;
        }
        if x < self.xs[0] - tolerance {
            return None;
        }
        let mut col = 0;
        for (i, &b) in self.xs.iter().enumerate() {
            if x >= b - tolerance {
                col = i;
            } else {
                break;
            }
        }
        Some(col)
    }

    /// True when both sets have the same arity and agree pairwise within
    /// `tolerance`. Used for page-spanning table merges.
    pub fn matches(&self, other: &ColumnBoundaries, tolerance: f32) -> bool {
        self.xs.len() == other.xs.len()
            && self
                .xs
                .iter()
                .zip(other.xs.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// A contiguous run of lines suspected to form tabular structure, pending
/// cell reconciliation. Produced per page; page-spanning candidates are
/// merged before reconciliation.
#[derive(Debug, Clone)]
pub struct TableRegion {
    pub lines: Vec<Line>,
    pub boundaries: ColumnBoundaries,
    pub rect: Rect,
    pub first_page: usize,
    pub last_page: usize,
}

// ── Reconstructed structure ──────────────────────────────────────────────

/// One (row, column) intersection of a table. Empty intersections are
/// explicit cells with no content, never omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub column: usize,
    /// Content with numeric tokens canonicalised (half-width digits, no
    /// thousands separators, leading `-` for negatives).
    pub text: String,
    /// Content exactly as it appeared on the page.
    pub raw_text: String,
    /// None for explicit empty cells.
    pub rect: Option<Rect>,
    /// Low-confidence markers attached during reconciliation.
    pub warnings: Vec<LayoutWarning>,
}

impl Cell {
    pub fn empty(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            text: String::new(),
            raw_text: String::new(),
            rect: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A reconciled grid of cells. Invariants: every row has exactly
/// `column_count()` cells, and sibling cell bounding boxes never overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
    pub boundaries: ColumnBoundaries,
    pub rect: Rect,
    /// Inclusive zero-based page range; differs across a page break.
    pub first_page: usize,
    pub last_page: usize,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.boundaries.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

// ── Classified output ────────────────────────────────────────────────────

/// Monetary / numeric unit inferred from column headers or statement-level
/// context rows such as `（単位：百万円）`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    Yen,
    ThousandYen,
    MillionYen,
    Percent,
    /// Per-share figures quoted in 円銭.
    YenPerShare,
}

/// Statement family a semantic tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    BalanceSheet,
    ProfitAndLoss,
    CashFlow,
    PerShare,
}

/// Semantic tag assigned by matching a row label against the
/// [`crate::vocab::StatementVocabulary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticTag {
    CurrentAssets,
    NonCurrentAssets,
    TotalAssets,
    CurrentLiabilities,
    NonCurrentLiabilities,
    TotalLiabilities,
    NetAssets,
    NetSales,
    OperatingIncome,
    OrdinaryIncome,
    NetIncome,
    ProfitAttributableToOwners,
    OperatingCashFlow,
    InvestingCashFlow,
    FinancingCashFlow,
    CashAndEquivalents,
    EquityRatio,
    EarningsPerShare,
    DividendPerShare,
}

impl SemanticTag {
    pub fn statement(&self) -> StatementKind {
        use SemanticTag::*;
        match self {
            CurrentAssets | NonCurrentAssets | TotalAssets | CurrentLiabilities
            | NonCurrentLiabilities | TotalLiabilities | NetAssets | EquityRatio => {
                StatementKind::BalanceSheet
            }
            NetSales | OperatingIncome | OrdinaryIncome | NetIncome
            | ProfitAttributableToOwners => StatementKind::ProfitAndLoss,
            OperatingCashFlow | InvestingCashFlow | FinancingCashFlow | CashAndEquivalents => {
                StatementKind::CashFlow
            }
            EarningsPerShare | DividendPerShare => StatementKind::PerShare,
        }
    }
}

/// Parsed content of one value cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Successfully parsed number with its inferred unit.
    Number { value: f64, unit: Unit },
    /// Non-empty content that failed numeric parsing; kept verbatim so no
    /// data is lost. The owning line item carries a parse-failure marker.
    Unparsed { raw: String },
    Empty,
}

/// One value column of a classified row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemValue {
    /// Column index within the originating table.
    pub column: usize,
    pub value: CellValue,
    /// Period label taken from the column header, e.g. `前年同四半期`.
    pub period: Option<String>,
}

/// A classified (label, values, period) record extracted from one table row.
///
/// `table_index`/`row_index` are back-references into
/// [`crate::ExtractionResult::tables`] for traceability; they confer no
/// ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    /// None when the label matched nothing in the vocabulary. Such rows are
    /// kept rather than dropped: completeness over precision.
    pub tag: Option<SemanticTag>,
    pub values: Vec<LineItemValue>,
    pub table_index: usize,
    pub row_index: usize,
    pub warnings: Vec<LayoutWarning>,
}

impl LineItem {
    /// First successfully parsed numeric value, if any.
    pub fn primary_value(&self) -> Option<(f64, Unit)> {
        self.values.iter().find_map(|v| match v.value {
            CellValue::Number { value, unit } => Some((value, unit)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_union_and_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 15.0, 15.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 15.0, 15.0));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn adjacent_rects_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn boundaries_cluster_nearby_edges() {
        let b = ColumnBoundaries::from_edges(vec![72.0, 73.5, 300.2, 299.8, 71.0], 4.0);
        assert_eq!(b.len(), 2);
        assert!((b.xs()[0] - 72.2).abs() < 1.0);
        assert!((b.xs()[1] - 300.0).abs() < 1.0);
    }

    #[test]
    fn boundaries_are_monotonic() {
        let b = ColumnBoundaries::from_edges(vec![400.0, 100.0, 250.0], 4.0);
        let xs = b.xs();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn column_for_span_semantics() {
        let b = ColumnBoundaries::from_edges(vec![72.0, 300.0], 4.0);
        // Near a left edge.
        assert_eq!(b.column_for(73.0, 4.0), Some(0));
        // Right-aligned content deep inside the first column span.
        assert_eq!(b.column_for(250.0, 4.0), Some(0));
        assert_eq!(b.column_for(310.0, 4.0), Some(1));
        // Left of the first boundary beyond tolerance: unassignable.
        assert_eq!(b.column_for(40.0, 4.0), None);
    }

    #[test]
    fn boundary_match_requires_same_arity() {
        let a = ColumnBoundaries::from_edges(vec![72.0, 300.0], 4.0);
        let b = ColumnBoundaries::from_edges(vec![72.5, 299.0], 4.0);
        let c = ColumnBoundaries::from_edges(vec![72.0, 300.0, 400.0], 4.0);
        assert!(a.matches(&b, 2.0));
        assert!(!a.matches(&c, 2.0));
    }

    #[test]
    fn blank_fragment_detection() {
        let f = TextFragment::new(Rect::new(0.0, 0.0, 0.0, 10.0), "x", 10.0, 0);
        assert!(f.is_blank(), "zero-width fragment is blank");
        let f = TextFragment::new(Rect::new(0.0, 0.0, 5.0, 10.0), "  ", 10.0, 0);
        assert!(f.is_blank(), "whitespace-only fragment is blank");
    }

    #[test]
    fn tag_statement_families() {
        assert_eq!(
            SemanticTag::TotalAssets.statement(),
            StatementKind::BalanceSheet
        );
        assert_eq!(
            SemanticTag::OperatingCashFlow.statement(),
            StatementKind::CashFlow
        );
    }
}
