//! Statement classification: turn reconciled table rows into tagged line
//! items.
//!
//! Matching is three-stage: exact lookup of the normalised label, then a
//! fuzzy pass using normalised edit distance against every vocabulary
//! entry, accepted only above `fuzzy_match_threshold`, and finally an
//! unclassified line item with a null tag. Rows are never dropped for
//! failing to match; the only rows withheld from the output are header
//! rows, which carry period labels and unit declarations rather than data.
//!
//! Unit inference walks outward from the cell: an explicit `%` on the value
//! wins, then the column header's unit annotation, then the unit implied by
//! the semantic tag (per-share figures are quoted in 円銭), then a
//! `（単位：百万円）` declaration (in a table row, or on a context line just
//! above the grid — see [`context_unit`]), and finally plain yen.
//!
//! Pure function of the table and the read-only vocabulary; no state
//! survives a call.

use crate::config::ExtractionConfig;
use crate::error::LayoutWarning;
use crate::model::{Cell, CellValue, Line, LineItem, LineItemValue, SemanticTag, Table, Unit};
use crate::pipeline::cells::parse_number;
use crate::vocab::{normalize_label, StatementVocabulary};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// Table-level unit declaration, e.g. `（単位：百万円）` or `(単位:千円)`.
static UNIT_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[（(]?\s*単位\s*[：:]\s*(百万円|千円|円)").expect("unit declaration regex")
});

/// Unit annotation inside a column header cell.
static COLUMN_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(百万円|千円|円\s*銭|円銭|[%％]|円)").expect("column unit regex"));

/// Period labels as they appear in column headers: relative quarter names
/// and era/calendar year-month forms.
static PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(前年同四半期|当四半期|前連結会計年度|当連結会計年度|前事業年度|当事業年度|前期末?|当期末?|当第[0-9０-９一二三四]四半期|(平成|令和|昭和)[0-9０-９元]+年[0-9０-９]+月(期|末|[0-9０-９]+日)?|[0-9０-９]{4}年[0-9０-９]+月(期|末|[0-9０-９]+日)?)",
    )
    .expect("period regex")
});

/// Classify every data row of `table` into a [`LineItem`].
///
/// `table_index` is recorded on each item as a back-reference for
/// traceability. `context_unit` is a unit declared adjacent to the table
/// but outside it (see [`context_unit`]); an in-table declaration takes
/// precedence.
pub fn classify(
    table: &Table,
    table_index: usize,
    vocab: &StatementVocabulary,
    config: &ExtractionConfig,
    context_unit: Option<Unit>,
) -> Vec<LineItem> {
    let table_unit = table_level_unit(table).or(context_unit);
    let headers = header_rows(table);
    let periods = column_periods(table, &headers);
    let column_units = column_unit_annotations(table, &headers);

    let mut items = Vec::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        if headers.contains(&row_idx) {
            continue;
        }
        let label_cell = &row[0];
        let label = label_cell.raw_text.trim().to_string();
        if label.is_empty() && row.iter().all(|c| c.is_empty()) {
            continue;
        }

        let mut warnings: Vec<LayoutWarning> = row.iter().flat_map(|c| c.warnings.clone()).collect();
        let tag = match lookup(vocab, &label, config.fuzzy_match_threshold) {
            Some(tag) => Some(tag),
            None => {
                warnings.push(LayoutWarning::UnclassifiedRow {
                    table: table_index,
                    row: row_idx,
                    label: label.clone(),
                });
                None
            }
        };

        let mut values = Vec::with_capacity(row.len().saturating_sub(1));
        for cell in &row[1..] {
            let value = parse_cell(
                cell,
                tag,
                column_units.get(cell.column).copied().flatten(),
                table_unit,
                table_index,
                &mut warnings,
            );
            values.push(LineItemValue {
                column: cell.column,
                value,
                period: periods.get(cell.column).cloned().flatten(),
            });
        }

        trace!(table = table_index, row = row_idx, ?tag, "classified row");
        items.push(LineItem {
            label,
            tag,
            values,
            table_index,
            row_index: row_idx,
            warnings,
        });
    }
    items
}

/// Exact match first, then the best fuzzy candidate above the threshold.
///
/// Score ties break on the lexicographically smaller normalised label; the
/// map's iteration order varies per construction and must not leak into
/// the output.
fn lookup(vocab: &StatementVocabulary, label: &str, threshold: f64) -> Option<SemanticTag> {
    if let Some(tag) = vocab.lookup(label) {
        return Some(tag);
    }
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }
    let mut best: Option<(f64, &str, SemanticTag)> = None;
    for (entry, tag) in vocab.entries() {
        let score = similarity(&normalized, entry);
        if score < threshold {
            continue;
        }
        let better = match best {
            None => true,
            Some((s, e, _)) => score > s || (score == s && entry < e),
        };
        if better {
            best = Some((score, entry, tag));
        }
    }
    best.map(|(_, _, tag)| tag)
}

/// Normalised similarity in `0..=1`: 1 minus the edit distance over the
/// longer length.
fn similarity(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    let longest = la.max(lb);
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Character-level edit distance, two-row DP.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut cur = vec![0usize; b_chars.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b_chars.len()]
}

fn parse_cell(
    cell: &Cell,
    tag: Option<SemanticTag>,
    column_unit: Option<Unit>,
    table_unit: Option<Unit>,
    table_index: usize,
    warnings: &mut Vec<LayoutWarning>,
) -> CellValue {
    if cell.is_empty() {
        return CellValue::Empty;
    }
    match parse_number(&cell.text) {
        Some(value) => {
            let unit = if cell.text.trim_end().ends_with('%') {
                Unit::Percent
            } else if let Some(u) = column_unit {
                u
            } else if let Some(u) = tag.and_then(tag_unit) {
                u
            } else {
                table_unit.unwrap_or(Unit::Yen)
            };
            CellValue::Number { value, unit }
        }
        None => {
            warnings.push(LayoutWarning::NumericParse {
                table: table_index,
                row: cell.row,
                column: cell.column,
                raw: cell.raw_text.clone(),
            });
            CellValue::Unparsed {
                raw: cell.raw_text.clone(),
            }
        }
    }
}

/// Units implied by the tag itself, independent of any annotation.
fn tag_unit(tag: SemanticTag) -> Option<Unit> {
    match tag {
        SemanticTag::EquityRatio => Some(Unit::Percent),
        SemanticTag::EarningsPerShare | SemanticTag::DividendPerShare => Some(Unit::YenPerShare),
        _ => None,
    }
}

/// Rows that annotate the table rather than carry data: every non-empty
/// cell is a period label or unit annotation and nothing parses as a
/// number.
fn header_rows(table: &Table) -> Vec<usize> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            let non_empty: Vec<&Cell> = row.iter().filter(|c| !c.is_empty()).collect();
            !non_empty.is_empty()
                && non_empty.iter().all(|c| {
                    parse_number(&c.text).is_none()
                        && (PERIOD_RE.is_match(&c.raw_text)
                            || UNIT_DECL_RE.is_match(&c.raw_text)
                            || COLUMN_UNIT_RE.is_match(&c.raw_text))
                })
        })
        .map(|(i, _)| i)
        .collect()
}

/// Period label per column, taken from the topmost header row that mentions
/// one for that column.
fn column_periods(table: &Table, headers: &[usize]) -> Vec<Option<String>> {
    let mut periods: Vec<Option<String>> = vec![None; table.column_count()];
    for &h in headers {
        for cell in &table.rows[h] {
            if periods[cell.column].is_none() {
                if let Some(m) = PERIOD_RE.find(&cell.raw_text) {
                    periods[cell.column] = Some(m.as_str().to_string());
                }
            }
        }
    }
    periods
}

/// Unit annotation per column from the header rows.
fn column_unit_annotations(table: &Table, headers: &[usize]) -> Vec<Option<Unit>> {
    let mut units: Vec<Option<Unit>> = vec![None; table.column_count()];
    for &h in headers {
        for cell in &table.rows[h] {
            if units[cell.column].is_none() {
                units[cell.column] = unit_from_text(&cell.raw_text);
            }
        }
    }
    units
}

/// Table-level unit from a `（単位：…）` declaration in any cell.
fn table_level_unit(table: &Table) -> Option<Unit> {
    table
        .rows
        .iter()
        .flatten()
        .find_map(|cell| declared_unit(&cell.raw_text))
}

/// Unit named by a `（単位：…）` declaration anywhere in `text`.
pub(crate) fn declared_unit(text: &str) -> Option<Unit> {
    UNIT_DECL_RE
        .captures(text)
        .and_then(|c| unit_token(c.get(1).map(|m| m.as_str()).unwrap_or("")))
}

/// Unit declared by a line directly above the table, e.g. a lone
/// `（単位：百万円）` between a statement title and the grid. Such lines do
/// not share the table's column alignment, so they sit outside the detected
/// region; only lines within two line heights of the table's top edge and
/// overlapping its horizontal extent count.
pub fn context_unit(table: &Table, lines: &[Line]) -> Option<Unit> {
    lines
        .iter()
        .filter(|line| {
            line.page_index == table.first_page
                && line.rect.y0 >= table.rect.y1
                && line.rect.y0 - table.rect.y1 <= 2.0 * line.rect.height()
                && line.rect.x0 < table.rect.x1
                && table.rect.x0 < line.rect.x1
        })
        .find_map(|line| declared_unit(&line.text()))
}

fn unit_from_text(text: &str) -> Option<Unit> {
    COLUMN_UNIT_RE
        .find(text)
        .and_then(|m| unit_token(m.as_str()))
}

fn unit_token(tok: &str) -> Option<Unit> {
    match tok {
        "百万円" => Some(Unit::MillionYen),
        "千円" => Some(Unit::ThousandYen),
        "円" => Some(Unit::Yen),
        "%" | "％" => Some(Unit::Percent),
        t if t.starts_with('円') && t.ends_with('銭') => Some(Unit::YenPerShare),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnBoundaries, LineRole, Rect, TextFragment};

    fn cell(row: usize, column: usize, text: &str) -> Cell {
        Cell {
            row,
            column,
            text: crate::pipeline::cells::canonicalize_numeric(text),
            raw_text: text.to_string(),
            rect: if text.is_empty() {
                None
            } else {
                Some(Rect::new(
                    72.0 + 150.0 * column as f32,
                    700.0 - 20.0 * row as f32,
                    140.0 + 150.0 * column as f32,
                    710.0 - 20.0 * row as f32,
                ))
            },
            warnings: Vec::new(),
        }
    }

    fn table(rows: Vec<Vec<&str>>) -> Table {
        let columns = rows[0].len();
        let edges: Vec<f32> = (0..columns).map(|c| 72.0 + 150.0 * c as f32).collect();
        Table {
            rows: rows
                .into_iter()
                .enumerate()
                .map(|(r, texts)| {
                    texts
                        .into_iter()
                        .enumerate()
                        .map(|(c, t)| cell(r, c, t))
                        .collect()
                })
                .collect(),
            boundaries: ColumnBoundaries::from_edges(edges, 4.0),
            rect: Rect::new(72.0, 600.0, 500.0, 710.0),
            first_page: 0,
            last_page: 0,
        }
    }

    fn vocab() -> StatementVocabulary {
        StatementVocabulary::japanese_quarterly()
    }

    fn context_line(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> Line {
        let rect = Rect::new(x0, y0, x1, y1);
        Line {
            fragments: vec![TextFragment::new(rect, text, y1 - y0, 0)],
            rect,
            page_index: 0,
            role: LineRole::Body,
        }
    }

    #[test]
    fn balance_sheet_rows_classify_with_normalized_values() {
        let t = table(vec![
            vec!["Total assets", "1,234,567"],
            vec!["Total liabilities", "(234,567)"],
            vec!["Net assets", "1,000,000"],
        ]);
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].tag, Some(SemanticTag::TotalAssets));
        assert_eq!(
            items[0].values[0].value,
            CellValue::Number {
                value: 1_234_567.0,
                unit: Unit::Yen
            }
        );
        assert_eq!(
            items[1].values[0].value,
            CellValue::Number {
                value: -234_567.0,
                unit: Unit::Yen
            }
        );
        assert_eq!(
            items[2].values[0].value,
            CellValue::Number {
                value: 1_000_000.0,
                unit: Unit::Yen
            }
        );
    }

    #[test]
    fn unknown_label_yields_unclassified_item() {
        let t = table(vec![
            vec!["売上高", "1,000"],
            vec!["脚注：記載金額は概算です", "123"],
        ]);
        let items = classify(&t, 3, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].tag, None);
        assert!(matches!(
            items[1].warnings.as_slice(),
            [LayoutWarning::UnclassifiedRow { table: 3, row: 1, .. }]
        ));
    }

    #[test]
    fn fuzzy_match_tolerates_annotation_noise() {
        // 「売上高　※１」 normalises to 売上高1: one edit away from the
        // three-character vocabulary entry.
        let t = table(vec![vec!["売上高 ※１", "500"]]);
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(items[0].tag, Some(SemanticTag::NetSales));
    }

    #[test]
    fn fuzzy_match_rejects_below_threshold() {
        let cfg = ExtractionConfig::builder()
            .fuzzy_match_threshold(0.9)
            .build()
            .unwrap();
        let t = table(vec![vec!["売上高 ※１", "500"]]);
        let items = classify(&t, 0, &vocab(), &cfg, None);
        assert_eq!(items[0].tag, None);
    }

    #[test]
    fn header_row_supplies_periods_and_is_not_emitted() {
        let t = table(vec![
            vec!["", "前年同四半期", "当四半期"],
            vec!["売上高", "900", "1,000"],
        ]);
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].values[0].period.as_deref(), Some("前年同四半期"));
        assert_eq!(items[0].values[1].period.as_deref(), Some("当四半期"));
    }

    #[test]
    fn table_unit_declaration_applies_to_values() {
        let t = table(vec![
            vec!["（単位：百万円）", ""],
            vec!["営業利益", "1,234"],
        ]);
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].values[0].value,
            CellValue::Number {
                value: 1234.0,
                unit: Unit::MillionYen
            }
        );
    }

    #[test]
    fn context_declaration_fills_in_the_table_unit() {
        // The declaration sits on its own line above the grid; the table
        // rows themselves carry no unit.
        let t = table(vec![vec!["営業利益", "1,234"]]);
        let above = context_line(300.0, 715.0, 450.0, 725.0, "（単位：千円）");
        let ctx = context_unit(&t, std::slice::from_ref(&above));
        assert_eq!(ctx, Some(Unit::ThousandYen));
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), ctx);
        assert_eq!(
            items[0].values[0].value,
            CellValue::Number {
                value: 1234.0,
                unit: Unit::ThousandYen
            }
        );
    }

    #[test]
    fn context_unit_ignores_distant_and_non_overlapping_lines() {
        let t = table(vec![vec!["営業利益", "1,234"]]);
        // Far above the table.
        let distant = context_line(300.0, 760.0, 450.0, 770.0, "（単位：千円）");
        // Adjacent but entirely right of the table's extent.
        let beside = context_line(520.0, 715.0, 580.0, 725.0, "（単位：千円）");
        assert_eq!(context_unit(&t, &[distant, beside]), None);
    }

    #[test]
    fn in_table_declaration_beats_context() {
        let t = table(vec![
            vec!["（単位：百万円）", ""],
            vec!["営業利益", "1,234"],
        ]);
        let items = classify(
            &t,
            0,
            &vocab(),
            &ExtractionConfig::default(),
            Some(Unit::ThousandYen),
        );
        assert_eq!(
            items[0].values[0].value,
            CellValue::Number {
                value: 1234.0,
                unit: Unit::MillionYen
            }
        );
    }

    #[test]
    fn fuzzy_ties_resolve_to_the_same_entry_every_run() {
        // Two entries equidistant from the label. The vocabulary map's
        // iteration order varies per construction; the winner must not.
        for _ in 0..32 {
            let v = StatementVocabulary::from_entries([
                ("営業収益A", SemanticTag::NetSales),
                ("営業収益B", SemanticTag::OperatingIncome),
            ]);
            assert_eq!(
                lookup(&v, "営業収益C", 0.75),
                Some(SemanticTag::NetSales),
                "tie must break on the smaller normalised label"
            );
        }
    }

    #[test]
    fn percent_suffix_overrides_unit_context() {
        let t = table(vec![
            vec!["（単位：百万円）", ""],
            vec!["自己資本比率", "45.6%"],
        ]);
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(
            items[0].values[0].value,
            CellValue::Number {
                value: 45.6,
                unit: Unit::Percent
            }
        );
    }

    #[test]
    fn per_share_tags_imply_yen_sen() {
        let t = table(vec![vec!["１株当たり四半期純利益", "123.45"]]);
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(items[0].tag, Some(SemanticTag::EarningsPerShare));
        assert_eq!(
            items[0].values[0].value,
            CellValue::Number {
                value: 123.45,
                unit: Unit::YenPerShare
            }
        );
    }

    #[test]
    fn unparseable_value_is_kept_raw_with_warning() {
        let t = table(vec![vec!["経常利益", "注記参照"]]);
        let items = classify(&t, 2, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(
            items[0].values[0].value,
            CellValue::Unparsed {
                raw: "注記参照".into()
            }
        );
        assert!(items[0]
            .warnings
            .iter()
            .any(|w| matches!(w, LayoutWarning::NumericParse { table: 2, .. })));
    }

    #[test]
    fn empty_cells_are_explicit_empty_values() {
        let t = table(vec![vec!["売上高", "", "1,000"]]);
        let items = classify(&t, 0, &vocab(), &ExtractionConfig::default(), None);
        assert_eq!(items[0].values[0].value, CellValue::Empty);
        assert_eq!(items[0].values[0].column, 1);
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("資産合計", "資産合計"), 0);
        assert_eq!(levenshtein("資産合計", "純資産合計"), 1);
        assert!(similarity("資産合計", "純資産合計") > 0.75);
    }
}
