//! Match statistics between the unique key values of both sides.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{Dataset, KeySample, KeyValue, key_sample};

use super::models::{SAMPLE_CASES_LIMIT, percentage};

/// Sampled key values that have no partner on the other side.
///
/// Each side holds up to three distinct keys in the order their first row
/// appears in that side's dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedKeyCases {
    /// Left keys absent on the right
    pub left: Vec<KeySample>,
    /// Right keys absent on the left
    pub right: Vec<KeySample>,
}

/// Key-set comparison of the left and right datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchStatistics {
    /// Unique key values present on both sides
    pub number_of_matched_keys: u64,
    /// Matched keys relative to the union of unique key values
    pub percentage_of_matched_keys: f64,
    /// Unique left key values absent on the right
    pub number_of_left_keys_without_match: u64,
    /// Unique right key values absent on the left
    pub number_of_right_keys_without_match: u64,
    /// Samples of the unmatched keys on each side
    pub unmatched_cases: UnmatchedKeyCases,
}

/// Unique key values of a dataset, null-bearing tuples included.
pub fn unique_keys(dataset: &Dataset, keys: &[String]) -> BTreeSet<KeyValue> {
    dataset
        .rows
        .iter()
        .map(|row| KeyValue::of_row(row, keys))
        .collect()
}

/// Compares the unique key values of both sides.
///
/// Null components compare equal, so a null key present on both sides counts
/// as one matched key. Key columns are paired positionally, so `left_keys[i]`
/// is compared with `right_keys[i]`.
pub fn analyze_matches(
    left: &Dataset,
    left_keys: &[String],
    right: &Dataset,
    right_keys: &[String],
) -> MatchStatistics {
    if left_keys.is_empty() || right_keys.is_empty() {
        return MatchStatistics::default();
    }

    let left_set = unique_keys(left, left_keys);
    let right_set = unique_keys(right, right_keys);

    let matched = left_set.intersection(&right_set).count() as u64;
    let left_only = left_set.difference(&right_set).count() as u64;
    let right_only = right_set.difference(&left_set).count() as u64;
    let union = matched + left_only + right_only;

    tracing::trace!(
        "Key sets: {} left, {} right, {} matched",
        left_set.len(),
        right_set.len(),
        matched
    );

    MatchStatistics {
        number_of_matched_keys: matched,
        percentage_of_matched_keys: percentage(matched, union),
        number_of_left_keys_without_match: left_only,
        number_of_right_keys_without_match: right_only,
        unmatched_cases: UnmatchedKeyCases {
            left: sample_unmatched(left, left_keys, &right_set),
            right: sample_unmatched(right, right_keys, &left_set),
        },
    }
}

/// First distinct keys of `dataset`, in row order, that `other` lacks.
fn sample_unmatched(
    dataset: &Dataset,
    keys: &[String],
    other: &BTreeSet<KeyValue>,
) -> Vec<KeySample> {
    let mut sampled: BTreeSet<KeyValue> = BTreeSet::new();
    let mut cases = Vec::new();

    for row in &dataset.rows {
        if cases.len() >= SAMPLE_CASES_LIMIT {
            break;
        }
        let key = KeyValue::of_row(row, keys);
        if !other.contains(&key) && sampled.insert(key) {
            cases.push(key_sample(row, keys));
        }
    }
    cases
}
