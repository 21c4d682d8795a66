//! Core library for mergesurveyor.
//!
//! This crate inspects a relational join between two tabular datasets and
//! produces a diagnostic report before the caller trusts the joined result.
//! It catches the failures a plain join hides: duplicated keys, null keys,
//! low match rates and row-count blowups.
//!
//! # Guarantees
//! - Input datasets are borrowed read-only and never modified
//! - Every report carries the full, fixed key set, even for empty inputs
//! - Diagnostic failures carry the complete report
//!
//! # Architecture
//! - `models`: the in-memory `Dataset` and canonical key encoding
//! - `join`: the `Joiner` trait and the bundled `HashJoiner`
//! - `inspection`: statistics, thresholds, report and the `MergeInspector`

pub mod error;
pub mod inspection;
pub mod join;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use error::{MergeDiagnosticFailure, MergeInspectError, Result};
pub use inspection::{
    ErrorFlag, ErrorThresholds, InspectionState, JoinConfig, KeyIssueMetrics, MergeConfig,
    MergeInspector, MergeReport, ThresholdMetric, UnmatchedKeyCases,
};
pub use join::{HashJoiner, JoinError, JoinKeys, JoinKind, JoinSpec, Joiner};
pub use logging::init_logging;
pub use models::{Dataset, KeySample, KeyValue, Row};
