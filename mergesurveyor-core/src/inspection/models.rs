//! Merge report models.
//!
//! The report is a fixed record: one field per report key, declared in
//! report order so that serialization preserves the key order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::KeySample;

use super::config::ErrorFlag;

/// Maximum number of sample cases attached to a key metric.
pub const SAMPLE_CASES_LIMIT: usize = 3;

/// `part / total * 100`, unrounded. A zero total yields 0.
///
/// Thresholds are checked against this exact value; the report carries it
/// through [`round_percentage`].
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}

/// Rounds a percentage to 2 decimals for the report.
pub fn round_percentage(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The `{number, percentage, cases}` triple for duplicated or null keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyIssueMetrics {
    /// Number of offending rows
    pub number: u64,
    /// Offending rows as a percentage of the dataset's rows
    pub percentage: f64,
    /// Up to three distinct offending key values
    pub cases: Vec<KeySample>,
}

/// Every report key, in report order.
pub const REPORT_KEYS: [&str; 17] = [
    "left_number_of_rows_before_merge",
    "right_number_of_rows_before_merge",
    "left_duplicated_keys_in_keys",
    "right_duplicated_keys_in_keys",
    "duplicated_keys_error",
    "left_null_keys_in_keys",
    "right_null_keys_in_keys",
    "null_keys_error",
    "number_of_rows_after_merge",
    "number_of_matched_keys",
    "percentage_of_matched_keys",
    "number_of_left_keys_without_match",
    "number_of_right_keys_without_match",
    "percentage_of_matched_keys_error",
    "matched_keys_error",
    "number_of_rows_duplicated",
    "rows_duplicated_error",
];

/// Diagnostic report of one merge.
///
/// Built once per inspection by [`super::ReportBuilder`]; the inspector only
/// hands out shared references or clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Rows in the left dataset
    pub left_number_of_rows_before_merge: u64,
    /// Rows in the right dataset
    pub right_number_of_rows_before_merge: u64,
    /// Duplicated keys on the left
    pub left_duplicated_keys_in_keys: KeyIssueMetrics,
    /// Duplicated keys on the right
    pub right_duplicated_keys_in_keys: KeyIssueMetrics,
    /// Either side exceeds the duplicated-keys threshold
    pub duplicated_keys_error: bool,
    /// Null keys on the left
    pub left_null_keys_in_keys: KeyIssueMetrics,
    /// Null keys on the right
    pub right_null_keys_in_keys: KeyIssueMetrics,
    /// Either side exceeds the null-keys threshold
    pub null_keys_error: bool,
    /// Rows in the joined dataset
    pub number_of_rows_after_merge: u64,
    /// Unique key values present on both sides
    pub number_of_matched_keys: u64,
    /// Matched keys as a percentage of all unique key values
    pub percentage_of_matched_keys: f64,
    /// Unique left key values absent on the right
    pub number_of_left_keys_without_match: u64,
    /// Unique right key values absent on the left
    pub number_of_right_keys_without_match: u64,
    /// Matched-key percentage is below its threshold
    pub percentage_of_matched_keys_error: bool,
    /// Matched-key threshold fired or the join lost every matched key
    pub matched_keys_error: bool,
    /// Joined rows that repeat an earlier joined row exactly
    pub number_of_rows_duplicated: u64,
    /// Duplicated-row percentage exceeds its threshold
    pub rows_duplicated_error: bool,
}

impl MergeReport {
    /// Reads one error flag.
    pub fn flag(&self, flag: ErrorFlag) -> bool {
        match flag {
            ErrorFlag::DuplicatedKeysError => self.duplicated_keys_error,
            ErrorFlag::NullKeysError => self.null_keys_error,
            ErrorFlag::PercentageOfMatchedKeysError => self.percentage_of_matched_keys_error,
            ErrorFlag::MatchedKeysError => self.matched_keys_error,
            ErrorFlag::RowsDuplicatedError => self.rows_duplicated_error,
        }
    }

    /// Flags that are true, in report order.
    pub fn raised_flags(&self) -> Vec<ErrorFlag> {
        ErrorFlag::ALL
            .into_iter()
            .filter(|flag| self.flag(*flag))
            .collect()
    }

    /// True when no flag is set.
    pub fn is_clean(&self) -> bool {
        self.raised_flags().is_empty()
    }

    /// The report as ordered `(key, value)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, Value)> {
        let triple = |m: &KeyIssueMetrics| {
            serde_json::to_value(m).unwrap_or_else(|e| {
                tracing::trace!("Failed to render key metrics: {}", e);
                Value::Null
            })
        };

        let values = [
            Value::from(self.left_number_of_rows_before_merge),
            Value::from(self.right_number_of_rows_before_merge),
            triple(&self.left_duplicated_keys_in_keys),
            triple(&self.right_duplicated_keys_in_keys),
            Value::from(self.duplicated_keys_error),
            triple(&self.left_null_keys_in_keys),
            triple(&self.right_null_keys_in_keys),
            Value::from(self.null_keys_error),
            Value::from(self.number_of_rows_after_merge),
            Value::from(self.number_of_matched_keys),
            Value::from(self.percentage_of_matched_keys),
            Value::from(self.number_of_left_keys_without_match),
            Value::from(self.number_of_right_keys_without_match),
            Value::from(self.percentage_of_matched_keys_error),
            Value::from(self.matched_keys_error),
            Value::from(self.number_of_rows_duplicated),
            Value::from(self.rows_duplicated_error),
        ];

        REPORT_KEYS.into_iter().zip(values).collect()
    }

    /// Pretty JSON, keys in report order.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::MergeInspectError::serialization("merge report", e))
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.entries().iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(2, 5), 40.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(round_percentage(percentage(1, 3)), 33.33);
        assert_eq!(round_percentage(percentage(2, 3)), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn test_percentage_is_exact_below_report_precision() {
        let tiny = percentage(1, 20_001);
        assert!(tiny > 0.0);
        assert_eq!(round_percentage(tiny), 0.0);
    }

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_report_serializes_keys_in_order() {
        let json = serde_json::to_value(MergeReport::default()).unwrap();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();

        // Value maps may reorder keys; ordering is checked on the text below
        assert_eq!(keys.len(), REPORT_KEYS.len());
        for key in REPORT_KEYS {
            assert!(keys.contains(&key), "missing {}", key);
        }

        let text = serde_json::to_string(&MergeReport::default()).unwrap();
        let positions: Vec<usize> = REPORT_KEYS
            .iter()
            .map(|k| text.find(&format!("\"{}\"", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_entries_match_report_keys() {
        let report = MergeReport {
            number_of_matched_keys: 2,
            percentage_of_matched_keys: 40.0,
            ..MergeReport::default()
        };
        let entries = report.entries();

        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, REPORT_KEYS.to_vec());
        assert_eq!(entries[9].1, Value::from(2u64));
        assert_eq!(entries[10].1, Value::from(40.0));
        assert_eq!(
            entries[2].1,
            serde_json::json!({"number": 0, "percentage": 0.0, "cases": []})
        );
    }

    #[test]
    fn test_flag_accessors() {
        let report = MergeReport {
            null_keys_error: true,
            matched_keys_error: true,
            ..MergeReport::default()
        };

        assert!(report.flag(ErrorFlag::NullKeysError));
        assert!(!report.flag(ErrorFlag::DuplicatedKeysError));
        assert_eq!(
            report.raised_flags(),
            vec![ErrorFlag::NullKeysError, ErrorFlag::MatchedKeysError]
        );
        assert!(!report.is_clean());
        assert!(MergeReport::default().is_clean());
    }

    #[test]
    fn test_display_lists_every_key() {
        let text = MergeReport::default().to_string();
        assert_eq!(text.lines().count(), REPORT_KEYS.len());
        assert!(text.starts_with("left_number_of_rows_before_merge: 0"));
        assert!(text.ends_with("rows_duplicated_error: false"));
    }

    #[test]
    fn test_report_serde_roundtrip() {
        let report = MergeReport {
            left_number_of_rows_before_merge: 4,
            right_duplicated_keys_in_keys: KeyIssueMetrics {
                number: 2,
                percentage: 40.0,
                cases: vec![
                    [("k".to_string(), serde_json::json!("L002"))]
                        .into_iter()
                        .collect(),
                ],
            },
            ..MergeReport::default()
        };

        let json = report.to_json_pretty().unwrap();
        let back: MergeReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
