//! Statement vocabulary: the reference set of known financial-statement
//! line-item labels used for classification.
//!
//! Quarterly reports are not consistent about how they spell a label —
//! full-width versus half-width characters, stray whitespace inside
//! compound words, trailing annotation marks (`※１`) and so on. All lookups
//! therefore go through [`normalize_label`], and the map is keyed on
//! normalised strings.
//!
//! A [`StatementVocabulary`] is constructed once at startup and shared
//! read-only (behind an `Arc`) across all extraction calls; nothing mutates
//! it after construction.

use crate::model::SemanticTag;
use std::collections::HashMap;

/// Canonicalise a label for lookup: fold full-width ASCII to half-width,
/// drop all whitespace, strip punctuation and annotation marks, lowercase.
pub fn normalize_label(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let c = fold_width(c);
        if c.is_whitespace() {
            continue;
        }
        if is_label_punctuation(c) {
            continue;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Map full-width compatibility characters to their ASCII equivalents.
/// Digits, Latin letters and common punctuation cover everything financial
/// labels actually use; a full NFKC pass is not needed.
pub(crate) fn fold_width(c: char) -> char {
    match c {
        // Full-width ASCII block: ！(U+FF01) ..= ～(U+FF5E)
        '\u{FF01}'..='\u{FF5E}' => {
            char::from_u32(c as u32 - 0xFF01 + 0x21).unwrap_or(c)
        }
        '\u{3000}' => ' ', // ideographic space
        _ => c,
    }
}

fn is_label_punctuation(c: char) -> bool {
    matches!(
        c,
        '、' | '。'
            | '・'
            | '：'
            | ':'
            | '('
            | ')'
            | '（'
            | '）'
            | '【'
            | '】'
            | '「'
            | '」'
            | '※'
            | '*'
            | '－'
            | '―'
    )
}

/// Process-wide, read-only lookup from normalised label strings to semantic
/// tags.
#[derive(Debug, Clone)]
pub struct StatementVocabulary {
    map: HashMap<String, SemanticTag>,
}

impl StatementVocabulary {
    /// An empty vocabulary; every row will come out unclassified.
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Build from `(label, tag)` pairs; labels are normalised on insertion.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, SemanticTag)>,
        S: AsRef<str>,
    {
        let mut v = Self::empty();
        for (label, tag) in entries {
            v.insert(label.as_ref(), tag);
        }
        v
    }

    /// The built-in vocabulary for Japanese quarterly financial reports:
    /// balance sheet, P&L and cash-flow statement labels, plus the English
    /// renderings that appear in bilingual summaries.
    pub fn japanese_quarterly() -> Self {
        use SemanticTag::*;
        Self::from_entries([
            // ── 貸借対照表 ────────────────────────────────────────────
            ("流動資産合計", CurrentAssets),
            ("流動資産", CurrentAssets),
            ("固定資産合計", NonCurrentAssets),
            ("固定資産", NonCurrentAssets),
            ("資産合計", TotalAssets),
            ("総資産", TotalAssets),
            ("流動負債合計", CurrentLiabilities),
            ("流動負債", CurrentLiabilities),
            ("固定負債合計", NonCurrentLiabilities),
            ("固定負債", NonCurrentLiabilities),
            ("負債合計", TotalLiabilities),
            ("純資産合計", NetAssets),
            ("純資産", NetAssets),
            ("自己資本比率", EquityRatio),
            // ── 損益計算書 ────────────────────────────────────────────
            ("売上高", NetSales),
            ("営業収益", NetSales),
            ("営業利益", OperatingIncome),
            ("経常利益", OrdinaryIncome),
            ("当期純利益", NetIncome),
            ("四半期純利益", NetIncome),
            ("親会社株主に帰属する当期純利益", ProfitAttributableToOwners),
            ("親会社株主に帰属する四半期純利益", ProfitAttributableToOwners),
            // ── キャッシュ・フロー計算書 ──────────────────────────────
            ("営業活動によるキャッシュ・フロー", OperatingCashFlow),
            ("投資活動によるキャッシュ・フロー", InvestingCashFlow),
            ("財務活動によるキャッシュ・フロー", FinancingCashFlow),
            ("現金及び現金同等物の四半期末残高", CashAndEquivalents),
            ("現金及び現金同等物の期末残高", CashAndEquivalents),
            ("現金及び現金同等物", CashAndEquivalents),
            // ── １株当たり情報 ────────────────────────────────────────
            ("1株当たり当期純利益", EarningsPerShare),
            ("1株当たり四半期純利益", EarningsPerShare),
            ("１株当たり当期純利益", EarningsPerShare),
            ("1株当たり配当額", DividendPerShare),
            // ── English renderings (bilingual summaries) ─────────────
            ("Total assets", TotalAssets),
            ("Total liabilities", TotalLiabilities),
            ("Net assets", NetAssets),
            ("Current assets", CurrentAssets),
            ("Current liabilities", CurrentLiabilities),
            ("Net sales", NetSales),
            ("Operating income", OperatingIncome),
            ("Operating profit", OperatingIncome),
            ("Ordinary income", OrdinaryIncome),
            ("Ordinary profit", OrdinaryIncome),
            ("Net income", NetIncome),
            ("Profit attributable to owners of parent", ProfitAttributableToOwners),
            ("Cash and cash equivalents", CashAndEquivalents),
            ("Equity ratio", EquityRatio),
            ("Earnings per share", EarningsPerShare),
        ])
    }

    /// Add an entry; intended for setup before the vocabulary is shared.
    pub fn insert(&mut self, label: &str, tag: SemanticTag) {
        self.map.insert(normalize_label(label), tag);
    }

    /// Exact lookup after normalisation.
    pub fn lookup(&self, label: &str) -> Option<SemanticTag> {
        self.map.get(&normalize_label(label)).copied()
    }

    /// Iterate over `(normalized_label, tag)` pairs, for fuzzy matching.
    pub fn entries(&self) -> impl Iterator<Item = (&str, SemanticTag)> {
        self.map.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SemanticTag;

    #[test]
    fn normalization_folds_width_and_case() {
        assert_eq!(normalize_label("Ｔｏｔａｌ　Ａｓｓｅｔｓ"), "totalassets");
        assert_eq!(normalize_label("Total assets"), "totalassets");
    }

    #[test]
    fn normalization_strips_annotations() {
        assert_eq!(normalize_label("資産合計 ※１"), "資産合計1");
        assert_eq!(normalize_label("（単位）純資産合計"), "単位純資産合計");
    }

    #[test]
    fn builtin_lookup_japanese() {
        let v = StatementVocabulary::japanese_quarterly();
        assert_eq!(v.lookup("資産合計"), Some(SemanticTag::TotalAssets));
        assert_eq!(
            v.lookup("営業活動によるキャッシュ・フロー"),
            Some(SemanticTag::OperatingCashFlow)
        );
    }

    #[test]
    fn builtin_lookup_english_ignores_spacing() {
        let v = StatementVocabulary::japanese_quarterly();
        assert_eq!(v.lookup("Total  assets"), Some(SemanticTag::TotalAssets));
        assert_eq!(v.lookup("NET ASSETS"), Some(SemanticTag::NetAssets));
    }

    #[test]
    fn unknown_label_misses() {
        let v = StatementVocabulary::japanese_quarterly();
        assert_eq!(v.lookup("脚注テキスト"), None);
    }
}
