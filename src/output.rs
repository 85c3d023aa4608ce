//! Output types: the extraction result handed to the caller, run
//! statistics, and the TSV adapter.
//!
//! The result is a plain in-memory structure; serialisation formats are
//! thin adapters on top (JSON via serde, TSV via [`ExtractionResult::to_tsv`])
//! rather than part of the core.

use crate::error::LayoutWarning;
use crate::model::{CellValue, LineItem, Table};
use crate::pipeline::overlay::OverlayPlan;
use serde::{Deserialize, Serialize};

/// Timing and volume statistics for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub pages: usize,
    pub fragments: usize,
    pub lines: usize,
    pub tables: usize,
    pub line_items: usize,
    pub decode_duration_ms: u64,
    pub layout_duration_ms: u64,
    pub classify_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one extraction run produced. Owned by the caller once
/// returned; nothing in here refers back to library state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Reconciled tables in page order.
    pub tables: Vec<Table>,
    /// Classified line items in table-then-row order.
    pub line_items: Vec<LineItem>,
    /// Roll-up of every warning attached to a cell or line item.
    pub warnings: Vec<LayoutWarning>,
    pub stats: ExtractionStats,
    /// Geometry for the debug overlay. Built during extraction so the
    /// renderer never needs the discarded page-scoped data; skipped in
    /// serialised output.
    #[serde(skip)]
    pub overlay: OverlayPlan,
}

impl ExtractionResult {
    /// Render the line items as tab-separated records, one per value
    /// column, with a header row.
    pub fn to_tsv(&self) -> String {
        let mut out = String::from(
            "table\trow\tlabel\ttag\tstatement\tcolumn\tperiod\tvalue\tunit\traw\n",
        );
        for item in &self.line_items {
            let tag = item
                .tag
                .map(|t| format!("{t:?}"))
                .unwrap_or_default();
            let statement = item
                .tag
                .map(|t| format!("{:?}", t.statement()))
                .unwrap_or_default();
            if item.values.is_empty() {
                out.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\t\t\t\t\t\n",
                    item.table_index,
                    item.row_index,
                    tsv_field(&item.label),
                    tag,
                    statement,
                ));
                continue;
            }
            for v in &item.values {
                let (value, unit, raw) = match &v.value {
                    CellValue::Number { value, unit } => {
                        (format_number(*value), format!("{unit:?}"), String::new())
                    }
                    CellValue::Unparsed { raw } => {
                        (String::new(), String::new(), tsv_field(raw))
                    }
                    CellValue::Empty => (String::new(), String::new(), String::new()),
                };
                out.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                    item.table_index,
                    item.row_index,
                    tsv_field(&item.label),
                    tag,
                    statement,
                    v.column,
                    tsv_field(v.period.as_deref().unwrap_or("")),
                    value,
                    unit,
                    raw,
                ));
            }
        }
        out
    }
}

/// Integral values print without a trailing `.0`.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn tsv_field(s: &str) -> String {
    s.replace(['\t', '\n'], " ")
}
