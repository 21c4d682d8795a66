//! Threshold evaluation: converts metrics into the report's error flags.
//!
//! Upper-bound checks flag when the value is strictly greater than the
//! threshold; the lower-bound check flags when it is strictly smaller. An
//! unconfigured threshold never flags. Comparisons use the unrounded
//! percentages, so a rate below report precision still flags.

use super::config::{ErrorThresholds, ThresholdMetric};
use super::duplication::DuplicationStatistics;
use super::keys::KeyStatistics;
use super::matching::MatchStatistics;

/// True when `value` is above a configured upper bound.
pub fn exceeds_upper_bound(value: f64, threshold: Option<f64>) -> bool {
    threshold.is_some_and(|t| value > t)
}

/// True when `value` is below a configured lower bound.
pub fn below_lower_bound(value: f64, threshold: Option<f64>) -> bool {
    threshold.is_some_and(|t| value < t)
}

/// The five error flags of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorFlags {
    /// Either side's duplicated-key percentage is over its threshold
    pub duplicated_keys_error: bool,
    /// Either side's null-key percentage is over its threshold
    pub null_keys_error: bool,
    /// Matched-key percentage is under its threshold
    pub percentage_of_matched_keys_error: bool,
    /// No rows after the merge despite matched keys, or the percentage flag
    pub matched_keys_error: bool,
    /// Duplicated-row percentage is over its threshold
    pub rows_duplicated_error: bool,
}

/// Inputs of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    /// Left-side key statistics
    pub left_keys: &'a KeyStatistics,
    /// Right-side key statistics
    pub right_keys: &'a KeyStatistics,
    /// Key-set comparison
    pub matches: &'a MatchStatistics,
    /// Rows in the joined dataset
    pub rows_after_merge: u64,
    /// Duplicated rows in the joined dataset
    pub duplication: &'a DuplicationStatistics,
}

/// Applies the thresholds to the computed statistics.
pub fn evaluate_flags(thresholds: &ErrorThresholds, input: &EvaluationInput<'_>) -> ErrorFlags {
    let on_either_side = |metric: ThresholdMetric, pick: fn(&KeyStatistics) -> f64| {
        let threshold = thresholds.get(metric);
        exceeds_upper_bound(pick(input.left_keys), threshold)
            || exceeds_upper_bound(pick(input.right_keys), threshold)
    };

    let duplicated_keys_error =
        on_either_side(ThresholdMetric::DuplicatedKeys, |s| s.duplicated.percentage);
    let null_keys_error = on_either_side(ThresholdMetric::NullKeys, |s| s.nulls.percentage);

    let percentage_of_matched_keys_error = below_lower_bound(
        input.matches.percentage_of_matched_keys,
        thresholds.get(ThresholdMetric::PercentageMatchedKeys),
    );
    let lost_all_matches = input.rows_after_merge == 0 && input.matches.number_of_matched_keys > 0;
    if lost_all_matches {
        tracing::debug!(
            "Join produced no rows despite {} matched keys",
            input.matches.number_of_matched_keys
        );
    }

    let rows_duplicated_error = exceeds_upper_bound(
        input.duplication.percentage,
        thresholds.get(ThresholdMetric::RowsDuplicated),
    );

    ErrorFlags {
        duplicated_keys_error,
        null_keys_error,
        percentage_of_matched_keys_error,
        matched_keys_error: lost_all_matches || percentage_of_matched_keys_error,
        rows_duplicated_error,
    }
}
