//! Duplicated-row detection over the joined dataset.

use std::collections::HashSet;

use crate::models::Dataset;

use super::models::percentage;

/// Exact-duplicate rows in a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicationStatistics {
    /// Rows equal to an earlier row across every column
    pub number_of_rows_duplicated: u64,
    /// Duplicated rows relative to the dataset's row count, unrounded
    pub percentage: f64,
}

/// Counts rows that repeat an earlier row exactly.
///
/// Rows are compared over the dataset's full column list, with absent and
/// null values treated alike.
pub fn analyze_duplicate_rows(dataset: &Dataset) -> DuplicationStatistics {
    let total = dataset.row_count() as u64;
    let mut seen: HashSet<String> = HashSet::with_capacity(dataset.row_count());
    let mut duplicates: u64 = 0;

    for row in &dataset.rows {
        if !seen.insert(dataset.row_fingerprint(row)) {
            duplicates += 1;
        }
    }

    DuplicationStatistics {
        number_of_rows_duplicated: duplicates,
        percentage: percentage(duplicates, total),
    }
}
