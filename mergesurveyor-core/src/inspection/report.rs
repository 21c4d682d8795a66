//! Report assembly.

use super::duplication::DuplicationStatistics;
use super::keys::KeyStatistics;
use super::matching::MatchStatistics;
use super::models::{KeyIssueMetrics, MergeReport, round_percentage};
use super::thresholds::ErrorFlags;

/// Assembles a [`MergeReport`] from the computed statistics.
///
/// Sections that are never supplied keep their zero defaults, so the
/// report always carries every key. Percentages are rounded to 2 decimals
/// here and nowhere earlier.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    report: MergeReport,
}

impl ReportBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the input row counts.
    pub fn with_row_counts(mut self, left: u64, right: u64) -> Self {
        self.report.left_number_of_rows_before_merge = left;
        self.report.right_number_of_rows_before_merge = right;
        self
    }

    /// Sets the left-side key statistics.
    pub fn with_left_keys(mut self, stats: KeyStatistics) -> Self {
        self.report.left_duplicated_keys_in_keys = rounded(stats.duplicated);
        self.report.left_null_keys_in_keys = rounded(stats.nulls);
        self
    }

    /// Sets the right-side key statistics.
    pub fn with_right_keys(mut self, stats: KeyStatistics) -> Self {
        self.report.right_duplicated_keys_in_keys = rounded(stats.duplicated);
        self.report.right_null_keys_in_keys = rounded(stats.nulls);
        self
    }

    /// Sets the joined row count.
    pub fn with_rows_after_merge(mut self, rows: u64) -> Self {
        self.report.number_of_rows_after_merge = rows;
        self
    }

    /// Sets the match statistics.
    pub fn with_matches(mut self, stats: MatchStatistics) -> Self {
        self.report.number_of_matched_keys = stats.number_of_matched_keys;
        self.report.percentage_of_matched_keys =
            round_percentage(stats.percentage_of_matched_keys);
        self.report.number_of_left_keys_without_match = stats.number_of_left_keys_without_match;
        self.report.number_of_right_keys_without_match = stats.number_of_right_keys_without_match;
        self
    }

    /// Sets the duplicated-row count.
    pub fn with_duplication(mut self, stats: &DuplicationStatistics) -> Self {
        self.report.number_of_rows_duplicated = stats.number_of_rows_duplicated;
        self
    }

    /// Sets the error flags.
    pub fn with_flags(mut self, flags: ErrorFlags) -> Self {
        self.report.duplicated_keys_error = flags.duplicated_keys_error;
        self.report.null_keys_error = flags.null_keys_error;
        self.report.percentage_of_matched_keys_error = flags.percentage_of_matched_keys_error;
        self.report.matched_keys_error = flags.matched_keys_error;
        self.report.rows_duplicated_error = flags.rows_duplicated_error;
        self
    }

    /// Finishes the report.
    pub fn build(self) -> MergeReport {
        self.report
    }
}

fn rounded(mut metrics: KeyIssueMetrics) -> KeyIssueMetrics {
    metrics.percentage = round_percentage(metrics.percentage);
    metrics
}
