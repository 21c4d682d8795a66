//! Key statistics: duplicated and null join keys on one side of a merge.
//!
//! Duplicates count every occurrence of a key value beyond its first one.
//! Null-bearing keys are reported as nulls and never as duplicates.

use std::collections::{HashMap, HashSet};

use crate::models::{Dataset, KeyValue, has_null_key, key_sample};

use super::models::{KeyIssueMetrics, SAMPLE_CASES_LIMIT, percentage};

/// Duplicate and null metrics for one dataset's key columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyStatistics {
    /// Rows whose key repeats an earlier row's key
    pub duplicated: KeyIssueMetrics,
    /// Rows with a null or missing key component
    pub nulls: KeyIssueMetrics,
}

#[derive(Debug)]
struct KeyTally {
    first_row: usize,
    occurrences: u64,
}

/// Computes key statistics for one dataset.
///
/// Percentages are relative to the dataset's total row count and left
/// unrounded. An empty dataset or an empty key list yields zero counts and
/// no cases.
pub fn analyze_keys(dataset: &Dataset, keys: &[String]) -> KeyStatistics {
    if dataset.is_empty() || keys.is_empty() {
        return KeyStatistics::default();
    }

    let total_rows = dataset.row_count() as u64;
    let mut tallies: HashMap<KeyValue, KeyTally> = HashMap::new();
    let mut null_rows: u64 = 0;
    let mut null_seen: HashSet<String> = HashSet::new();
    let mut null_cases = Vec::new();

    for (index, row) in dataset.rows.iter().enumerate() {
        if has_null_key(row, keys) {
            null_rows += 1;
            if null_cases.len() < SAMPLE_CASES_LIMIT {
                let sample = key_sample(row, keys);
                let fingerprint = serde_json::Value::Object(sample.clone()).to_string();
                if null_seen.insert(fingerprint) {
                    null_cases.push(sample);
                }
            }
            continue;
        }

        tallies
            .entry(KeyValue::of_row(row, keys))
            .and_modify(|t| t.occurrences += 1)
            .or_insert(KeyTally {
                first_row: index,
                occurrences: 1,
            });
    }

    let mut repeated: Vec<&KeyTally> = tallies.values().filter(|t| t.occurrences > 1).collect();
    repeated.sort_by_key(|t| t.first_row);

    let duplicate_rows: u64 = repeated.iter().map(|t| t.occurrences - 1).sum();
    let duplicate_cases = repeated
        .iter()
        .take(SAMPLE_CASES_LIMIT)
        .filter_map(|t| dataset.rows.get(t.first_row))
        .map(|row| key_sample(row, keys))
        .collect();

    KeyStatistics {
        duplicated: KeyIssueMetrics {
            number: duplicate_rows,
            percentage: percentage(duplicate_rows, total_rows),
            cases: duplicate_cases,
        },
        nulls: KeyIssueMetrics {
            number: null_rows,
            percentage: percentage(null_rows, total_rows),
            cases: null_cases,
        },
    }
}
