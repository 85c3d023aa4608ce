//! Configuration for an extraction run.
//!
//! All layout heuristics are controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Geometry-driven grouping is
//! inherently heuristic, so every proximity band and similarity threshold is
//! a tunable field rather than a hard-coded constant: document families with
//! unusual leading or spacing can be accommodated without code changes, and
//! two runs can be diffed by serialising their configs.
//!
//! Defaults come from the spacing conventions observed in real quarterly
//! reports (for example, a column split at just over two character widths
//! and a line band of a third of the glyph height).

use crate::error::ScrapError;
use crate::vocab::StatementVocabulary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a structured-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use jqfr_scrap::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .min_table_rows(4)
///     .fuzzy_match_threshold(0.8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Vertical merge tolerance as a fraction of glyph height. Default: 1/3.
    ///
    /// Two fragments belong to the same line when their vertical midpoints
    /// differ by less than `line_band_factor × max(height)`. Deriving the
    /// band from the fragments themselves (not a fixed point value) keeps
    /// mixed type sizes — a 14 pt heading next to 9 pt body text — grouped
    /// correctly.
    pub line_band_factor: f32,

    /// Horizontal gap, in multiples of the font size, below which two
    /// adjacent fragments on a line are re-joined into one text run.
    /// Default: 1.0. Decoders split words arbitrarily; this undoes it.
    pub intra_line_gap_factor: f32,

    /// Horizontal gap, in multiples of the preceding run's average glyph
    /// width, at or beyond which the next fragment starts a separate run
    /// (and hence a column candidate). Default: 2.125.
    pub column_gap_factor: f32,

    /// Nearest-neighbour merge radius (points) when clustering column left
    /// edges across the lines of a table candidate. Default: 4.0.
    pub column_cluster_tolerance_pts: f32,

    /// Minimum number of consecutive aligned lines required to accept a
    /// table candidate. Default: 3.
    ///
    /// Two aligned lines occur by accident in prose (a heading over a date,
    /// say); three or more almost never do.
    pub min_table_rows: usize,

    /// Header/footer band as a fraction of page height. Default: 0.05.
    /// Only the first and last line of a page can take those roles.
    pub margin_band_ratio: f32,

    /// Minimum normalised similarity (0..=1) for a fuzzy vocabulary match.
    /// Default: 0.75. Below this, a row is emitted unclassified rather than
    /// mislabelled.
    pub fuzzy_match_threshold: f64,

    /// Vertical gap, in multiples of the line height, beyond which stacked
    /// lines in one cell are joined with a newline instead of a space.
    /// Default: 0.6.
    pub newline_gap_factor: f32,

    /// Page-level worker fan-out for the per-page detection phase.
    /// Default: 4. Set to 1 for strictly sequential processing. Cross-page
    /// table merging always runs in a sequential pass afterwards.
    pub page_parallelism: usize,

    /// Vocabulary used by the classifier. Constructed once, shared
    /// read-only across page workers. Default:
    /// [`StatementVocabulary::japanese_quarterly`].
    #[serde(skip)]
    pub vocabulary: Option<Arc<StatementVocabulary>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            line_band_factor: 1.0 / 3.0,
            intra_line_gap_factor: 1.0,
            column_gap_factor: 2.125,
            column_cluster_tolerance_pts: 4.0,
            min_table_rows: 3,
            margin_band_ratio: 0.05,
            fuzzy_match_threshold: 0.75,
            newline_gap_factor: 0.6,
            page_parallelism: 4,
            vocabulary: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("line_band_factor", &self.line_band_factor)
            .field("intra_line_gap_factor", &self.intra_line_gap_factor)
            .field("column_gap_factor", &self.column_gap_factor)
            .field(
                "column_cluster_tolerance_pts",
                &self.column_cluster_tolerance_pts,
            )
            .field("min_table_rows", &self.min_table_rows)
            .field("margin_band_ratio", &self.margin_band_ratio)
            .field("fuzzy_match_threshold", &self.fuzzy_match_threshold)
            .field("newline_gap_factor", &self.newline_gap_factor)
            .field("page_parallelism", &self.page_parallelism)
            .field(
                "vocabulary",
                &self.vocabulary.as_ref().map(|v| v.len()),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The vocabulary for this run, falling back to the built-in Japanese
    /// quarterly-report set.
    pub fn resolve_vocabulary(&self) -> Arc<StatementVocabulary> {
        self.vocabulary
            .clone()
            .unwrap_or_else(|| Arc::new(StatementVocabulary::japanese_quarterly()))
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn line_band_factor(mut self, f: f32) -> Self {
        self.config.line_band_factor = f.clamp(0.05, 1.0);
        self
    }

    pub fn intra_line_gap_factor(mut self, f: f32) -> Self {
        self.config.intra_line_gap_factor = f.max(0.0);
        self
    }

    pub fn column_gap_factor(mut self, f: f32) -> Self {
        self.config.column_gap_factor = f.max(1.0);
        self
    }

    pub fn column_cluster_tolerance_pts(mut self, pts: f32) -> Self {
        self.config.column_cluster_tolerance_pts = pts.max(0.1);
        self
    }

    pub fn min_table_rows(mut self, n: usize) -> Self {
        self.config.min_table_rows = n.max(2);
        self
    }

    pub fn margin_band_ratio(mut self, r: f32) -> Self {
        self.config.margin_band_ratio = r.clamp(0.0, 0.25);
        self
    }

    pub fn fuzzy_match_threshold(mut self, t: f64) -> Self {
        self.config.fuzzy_match_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn newline_gap_factor(mut self, f: f32) -> Self {
        self.config.newline_gap_factor = f.max(0.0);
        self
    }

    pub fn page_parallelism(mut self, n: usize) -> Self {
        self.config.page_parallelism = n.max(1);
        self
    }

    pub fn vocabulary(mut self, vocab: Arc<StatementVocabulary>) -> Self {
        self.config.vocabulary = Some(vocab);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ScrapError> {
        let c = &self.config;
        if c.min_table_rows < 2 {
            return Err(ScrapError::InvalidConfig(
                "min_table_rows must be ≥ 2".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.fuzzy_match_threshold) {
            return Err(ScrapError::InvalidConfig(format!(
                "fuzzy_match_threshold must be 0..=1, got {}",
                c.fuzzy_match_threshold
            )));
        }
        if c.page_parallelism == 0 {
            return Err(ScrapError::InvalidConfig(
                "page_parallelism must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = ExtractionConfig::builder().build().unwrap();
        assert_eq!(c.min_table_rows, 3);
        assert!((c.column_gap_factor - 2.125).abs() < f32::EPSILON);
    }

    #[test]
    fn setters_clamp() {
        let c = ExtractionConfig::builder()
            .min_table_rows(0)
            .fuzzy_match_threshold(7.0)
            .page_parallelism(0)
            .build()
            .unwrap();
        assert_eq!(c.min_table_rows, 2);
        assert!((c.fuzzy_match_threshold - 1.0).abs() < f64::EPSILON);
        assert_eq!(c.page_parallelism, 1);
    }

    #[test]
    fn default_vocabulary_resolves() {
        let c = ExtractionConfig::default();
        assert!(c.resolve_vocabulary().len() > 0);
    }
}
