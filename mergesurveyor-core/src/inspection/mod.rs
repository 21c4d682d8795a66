//! Merge inspection module.
//!
//! This module wraps a join with diagnostics computed before and after it:
//! - **Key statistics**: duplicated and null join keys on each side
//! - **Match statistics**: overlap of the unique key values of both sides
//! - **Duplicated rows**: exact full-row repeats in the joined output
//! - **Thresholds**: percentage bounds that turn metrics into error flags
//!
//! # Example
//! ```rust,ignore
//! use mergesurveyor_core::inspection::{ErrorFlag, ErrorThresholds, JoinConfig, MergeConfig, MergeInspector};
//! use mergesurveyor_core::JoinKind;
//!
//! let config = MergeConfig::new(JoinConfig::new(JoinKind::Inner).on(["loyalty_code"]))
//!     .with_error_thresholds(ErrorThresholds::disabled().with_rows_duplicated(1.0))
//!     .raise_on(ErrorFlag::RowsDuplicatedError);
//! let mut inspector = MergeInspector::new(&left, &right, config)?;
//! let joined = inspector.perform_merge()?;
//! ```

mod config;
mod duplication;
mod inspector;
mod keys;
mod matching;
mod models;
mod report;
mod thresholds;

// Re-export public API
pub use config::{ErrorFlag, ErrorThresholds, JoinConfig, MergeConfig, ThresholdMetric};
pub use duplication::{DuplicationStatistics, analyze_duplicate_rows};
pub use inspector::{InspectionState, MergeInspector};
pub use keys::{KeyStatistics, analyze_keys};
pub use matching::{MatchStatistics, UnmatchedKeyCases, analyze_matches, unique_keys};
pub use models::{
    KeyIssueMetrics, MergeReport, REPORT_KEYS, SAMPLE_CASES_LIMIT, percentage, round_percentage,
};
pub use report::ReportBuilder;
pub use thresholds::{
    ErrorFlags, EvaluationInput, below_lower_bound, evaluate_flags, exceeds_upper_bound,
};
