//! Merge inspector.
//!
//! This module provides the `MergeInspector` that runs a join through a
//! [`Joiner`] and surrounds it with the key, match and duplicate-row
//! diagnostics, then classifies the results against the configured
//! thresholds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MergeDiagnosticFailure, MergeInspectError, Result};
use crate::join::{HashJoiner, JoinKind, JoinSpec, Joiner};
use crate::models::Dataset;

use super::config::{ErrorFlag, MergeConfig};
use super::duplication::analyze_duplicate_rows;
use super::keys::analyze_keys;
use super::matching::{UnmatchedKeyCases, analyze_matches};
use super::models::MergeReport;
use super::report::ReportBuilder;
use super::thresholds::{EvaluationInput, evaluate_flags};

/// Lifecycle of one inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionState {
    /// Inputs and configuration captured
    Initialized,
    /// Key statistics computed on both inputs
    PreStatsComputed,
    /// Join primitive invoked
    Joined,
    /// Match and duplicate-row statistics computed
    PostStatsComputed,
    /// Flags evaluated and report built
    Evaluated,
    /// No raise-set flag fired; the joined dataset was returned
    Completed,
    /// A raise-set flag fired or the join failed
    Failed,
}

impl InspectionState {
    /// State name.
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionState::Initialized => "INITIALIZED",
            InspectionState::PreStatsComputed => "PRE_STATS_COMPUTED",
            InspectionState::Joined => "JOINED",
            InspectionState::PostStatsComputed => "POST_STATS_COMPUTED",
            InspectionState::Evaluated => "EVALUATED",
            InspectionState::Completed => "COMPLETED",
            InspectionState::Failed => "FAILED",
        }
    }

    /// True once the report exists.
    pub fn has_report(&self) -> bool {
        matches!(
            self,
            InspectionState::Evaluated | InspectionState::Completed | InspectionState::Failed
        )
    }
}

impl fmt::Display for InspectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inspects one merge between two read-only datasets.
///
/// # Example
///
/// ```rust,ignore
/// use mergesurveyor_core::{Dataset, JoinConfig, JoinKind, MergeConfig, MergeInspector};
///
/// let config = MergeConfig::new(JoinConfig::new(JoinKind::Left).on(["loyalty_code"]));
/// let mut inspector = MergeInspector::new(&customers, &orders, config)?;
///
/// let joined = inspector.perform_merge()?;
/// println!("{}", inspector.get_report()?);
/// ```
#[derive(Debug)]
pub struct MergeInspector<'a, J: Joiner = HashJoiner> {
    left: &'a Dataset,
    right: &'a Dataset,
    config: MergeConfig,
    spec: JoinSpec,
    joiner: J,
    state: InspectionState,
    report: Option<MergeReport>,
    unmatched: Option<UnmatchedKeyCases>,
}

impl<'a> MergeInspector<'a, HashJoiner> {
    /// Creates an inspector using the bundled hash join.
    ///
    /// Key options are resolved against both datasets here, so a malformed
    /// key specification fails before any statistics run.
    pub fn new(left: &'a Dataset, right: &'a Dataset, config: MergeConfig) -> Result<Self> {
        Self::with_joiner(left, right, config, HashJoiner)
    }
}

impl<'a, J: Joiner> MergeInspector<'a, J> {
    /// Creates an inspector that delegates the join to `joiner`.
    pub fn with_joiner(
        left: &'a Dataset,
        right: &'a Dataset,
        config: MergeConfig,
        joiner: J,
    ) -> Result<Self> {
        let spec = config.join.resolve(left, right)?;

        tracing::debug!(
            "Inspector ready: {} join on {:?} / {:?}",
            spec.how,
            spec.keys.left,
            spec.keys.right
        );

        Ok(Self {
            left,
            right,
            config,
            spec,
            joiner,
            state: InspectionState::Initialized,
            report: None,
            unmatched: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InspectionState {
        self.state
    }

    /// The inspector configuration.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// The resolved join specification.
    pub fn join_spec(&self) -> &JoinSpec {
        &self.spec
    }

    /// Runs the merge and its diagnostics.
    ///
    /// Returns the joined dataset when no flag in the raise-set is true.
    /// Otherwise returns [`MergeInspectError::Diagnostic`] carrying the full
    /// report; the report also stays available through [`Self::get_report`].
    /// Join errors propagate unchanged. Each inspector runs once.
    pub fn perform_merge(&mut self) -> Result<Dataset> {
        if self.state != InspectionState::Initialized {
            return Err(MergeInspectError::InvalidState { state: self.state });
        }

        tracing::info!(
            "Inspecting {} join of {} left rows and {} right rows",
            self.spec.how,
            self.left.row_count(),
            self.right.row_count()
        );

        let left_keys = analyze_keys(self.left, &self.spec.keys.left);
        let right_keys = analyze_keys(self.right, &self.spec.keys.right);
        self.transition(InspectionState::PreStatsComputed);
        tracing::debug!(
            "Key statistics: left {} duplicated / {} null, right {} duplicated / {} null",
            left_keys.duplicated.number,
            left_keys.nulls.number,
            right_keys.duplicated.number,
            right_keys.nulls.number
        );

        let joined = match self.joiner.join(self.left, self.right, &self.spec) {
            Ok(joined) => joined,
            Err(e) => {
                self.transition(InspectionState::Failed);
                tracing::error!("Join failed: {}", e);
                return Err(e.into());
            }
        };
        self.transition(InspectionState::Joined);

        let rows_after_merge = joined.row_count() as u64;
        let mut matches = analyze_matches(
            self.left,
            &self.spec.keys.left,
            self.right,
            &self.spec.keys.right,
        );
        let duplication = analyze_duplicate_rows(&joined);
        self.transition(InspectionState::PostStatsComputed);
        tracing::debug!(
            "Match statistics: {} rows after merge, {} matched keys ({:.2}%), {} duplicated rows",
            rows_after_merge,
            matches.number_of_matched_keys,
            matches.percentage_of_matched_keys,
            duplication.number_of_rows_duplicated
        );
        self.warn_on_fan_out(rows_after_merge);
        let unmatched = std::mem::take(&mut matches.unmatched_cases);

        let flags = evaluate_flags(
            &self.config.error_thresholds,
            &EvaluationInput {
                left_keys: &left_keys,
                right_keys: &right_keys,
                matches: &matches,
                rows_after_merge,
                duplication: &duplication,
            },
        );

        let report = ReportBuilder::new()
            .with_row_counts(self.left.row_count() as u64, self.right.row_count() as u64)
            .with_left_keys(left_keys)
            .with_right_keys(right_keys)
            .with_rows_after_merge(rows_after_merge)
            .with_matches(matches)
            .with_duplication(&duplication)
            .with_flags(flags)
            .build();
        self.transition(InspectionState::Evaluated);

        for flag in report.raised_flags() {
            tracing::warn!("{} is true", flag);
        }

        let triggered: Vec<ErrorFlag> = report
            .raised_flags()
            .into_iter()
            .filter(|flag| self.config.raise_on_errors.contains(flag))
            .collect();

        self.report = Some(report.clone());
        self.unmatched = Some(unmatched);

        if triggered.is_empty() {
            self.transition(InspectionState::Completed);
            tracing::info!("Merge inspection completed: {} rows", rows_after_merge);
            Ok(joined)
        } else {
            self.transition(InspectionState::Failed);
            tracing::error!(
                "Merge rejected: {} configured error flag(s) raised",
                triggered.len()
            );
            Err(MergeInspectError::diagnostic(MergeDiagnosticFailure::new(
                triggered, report,
            )))
        }
    }

    /// The report of the evaluated merge.
    pub fn get_report(&self) -> Result<&MergeReport> {
        self.report.as_ref().ok_or(MergeInspectError::ReportNotReady)
    }

    /// Up to three sample keys per side that found no partner.
    ///
    /// Available in the same states as [`Self::get_report`].
    pub fn unmatched_key_cases(&self) -> Result<&UnmatchedKeyCases> {
        self.unmatched.as_ref().ok_or(MergeInspectError::ReportNotReady)
    }

    fn transition(&mut self, next: InspectionState) {
        tracing::debug!("Inspection state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Row count a join without fan-out would not exceed, when knowable.
    fn expected_row_count(&self) -> Option<usize> {
        let expected = match self.spec.how {
            JoinKind::Inner => self.left.row_count().min(self.right.row_count()),
            JoinKind::Left => self.left.row_count(),
            JoinKind::Right => self.right.row_count(),
            JoinKind::Outer | JoinKind::Cross => return None,
        };
        (expected > 0).then_some(expected)
    }

    fn warn_on_fan_out(&self, rows_after_merge: u64) {
        if let Some(expected) = self.expected_row_count()
            && rows_after_merge > expected as u64
        {
            tracing::warn!(
                "{} join produced {} rows, more than the {} expected without key fan-out",
                self.spec.how,
                rows_after_merge,
                expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspection::config::{ErrorThresholds, JoinConfig};
    use crate::join::JoinError;
    use serde_json::json;

    fn dataset(rows: Vec<serde_json::Value>) -> Dataset {
        Dataset::from_json_rows(rows).unwrap()
    }

    fn customers() -> Dataset {
        dataset(vec![
            json!({"loyalty_code": "L001", "name": "Alice"}),
            json!({"loyalty_code": "L002", "name": "Bob"}),
            json!({"loyalty_code": "L003", "name": "Carol"}),
            json!({"loyalty_code": "L004", "name": "Dan"}),
        ])
    }

    fn orders() -> Dataset {
        dataset(vec![
            json!({"loyalty_code": "L001", "total": 10}),
            json!({"loyalty_code": "L002", "total": 20}),
            json!({"loyalty_code": "L005", "total": 30}),
        ])
    }

    fn config(how: JoinKind) -> MergeConfig {
        MergeConfig::new(JoinConfig::new(how).on(["loyalty_code"]))
    }

    struct EmptyJoiner;

    impl Joiner for EmptyJoiner {
        fn join(&self, _: &Dataset, _: &Dataset, _: &JoinSpec) -> std::result::Result<Dataset, JoinError> {
            Ok(Dataset::with_columns(["loyalty_code"]))
        }
    }

    struct FailingJoiner;

    impl Joiner for FailingJoiner {
        fn join(&self, _: &Dataset, _: &Dataset, spec: &JoinSpec) -> std::result::Result<Dataset, JoinError> {
            Err(JoinError::InvalidKeys {
                how: spec.how,
                reason: "rejected".to_string(),
            })
        }
    }

    #[test]
    fn test_state_progression_on_success() {
        let (left, right) = (customers(), orders());
        let mut inspector = MergeInspector::new(&left, &right, config(JoinKind::Inner)).unwrap();
        assert_eq!(inspector.state(), InspectionState::Initialized);

        let joined = inspector.perform_merge().unwrap();
        assert_eq!(joined.row_count(), 2);
        assert_eq!(inspector.state(), InspectionState::Completed);
        assert!(inspector.state().has_report());
    }

    #[test]
    fn test_report_not_ready_before_merge() {
        let (left, right) = (customers(), orders());
        let inspector = MergeInspector::new(&left, &right, config(JoinKind::Inner)).unwrap();
        assert!(matches!(
            inspector.get_report(),
            Err(MergeInspectError::ReportNotReady)
        ));
    }

    #[test]
    fn test_second_merge_is_rejected() {
        let (left, right) = (customers(), orders());
        let mut inspector = MergeInspector::new(&left, &right, config(JoinKind::Inner)).unwrap();
        inspector.perform_merge().unwrap();

        let err = inspector.perform_merge().unwrap_err();
        assert!(matches!(
            err,
            MergeInspectError::InvalidState {
                state: InspectionState::Completed
            }
        ));
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_report_is_stable_across_reads() {
        let (left, right) = (customers(), orders());
        let mut inspector = MergeInspector::new(&left, &right, config(JoinKind::Left)).unwrap();
        inspector.perform_merge().unwrap();

        let first = inspector.get_report().unwrap().clone();
        let second = inspector.get_report().unwrap();
        assert_eq!(&first, second);
        assert_eq!(first.number_of_rows_after_merge, 4);
    }

    #[test]
    fn test_raise_set_turns_flag_into_failure() {
        let left = dataset(vec![json!({"loyalty_code": null}), json!({"loyalty_code": "L001"})]);
        let right = orders();
        let config = config(JoinKind::Inner).raise_on(ErrorFlag::NullKeysError);
        let mut inspector = MergeInspector::new(&left, &right, config).unwrap();

        let err = inspector.perform_merge().unwrap_err();
        assert_eq!(inspector.state(), InspectionState::Failed);
        assert!(!err.is_usage_error());
        let report = err.report().unwrap();
        assert!(report.null_keys_error);
        assert_eq!(report.left_null_keys_in_keys.percentage, 50.0);

        // report stays available after the failure
        assert_eq!(inspector.get_report().unwrap(), report);
    }

    #[test]
    fn test_flags_outside_raise_set_do_not_fail() {
        let left = dataset(vec![json!({"loyalty_code": "L001"}), json!({"loyalty_code": "L001"})]);
        let right = orders();
        let config = config(JoinKind::Inner).raise_on(ErrorFlag::NullKeysError);
        let mut inspector = MergeInspector::new(&left, &right, config).unwrap();

        inspector.perform_merge().unwrap();
        let report = inspector.get_report().unwrap();
        assert!(report.duplicated_keys_error);
        assert!(!report.null_keys_error);
    }

    #[test]
    fn test_empty_join_output_raises_matched_keys_error() {
        let (left, right) = (customers(), orders());
        let config = config(JoinKind::Inner)
            .with_error_thresholds(ErrorThresholds::disabled())
            .raise_on(ErrorFlag::MatchedKeysError);
        let mut inspector = MergeInspector::with_joiner(&left, &right, config, EmptyJoiner).unwrap();

        let err = inspector.perform_merge().unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.number_of_rows_after_merge, 0);
        assert_eq!(report.number_of_matched_keys, 2);
        assert!(report.matched_keys_error);
        assert!(!report.percentage_of_matched_keys_error);
    }

    #[test]
    fn test_join_errors_propagate_unchanged() {
        let (left, right) = (customers(), orders());
        let mut inspector =
            MergeInspector::with_joiner(&left, &right, config(JoinKind::Inner), FailingJoiner)
                .unwrap();

        let err = inspector.perform_merge().unwrap_err();
        assert!(matches!(err, MergeInspectError::Join(JoinError::InvalidKeys { .. })));
        assert!(err.is_usage_error());
        assert_eq!(inspector.state(), InspectionState::Failed);
        assert!(inspector.get_report().is_err());
    }

    #[test]
    fn test_malformed_keys_fail_at_construction() {
        let (left, right) = (customers(), orders());
        let config = MergeConfig::new(JoinConfig::new(JoinKind::Inner).on(["missing"]));
        let err = MergeInspector::new(&left, &right, config).unwrap_err();
        assert!(matches!(err, MergeInspectError::Configuration { .. }));
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let (left, right) = (customers(), orders());
        let (left_before, right_before) = (left.clone(), right.clone());
        let mut inspector = MergeInspector::new(&left, &right, config(JoinKind::Outer)).unwrap();
        inspector.perform_merge().unwrap();

        assert_eq!(left, left_before);
        assert_eq!(right, right_before);
    }

    #[test]
    fn test_fan_out_keeps_report_semantics() {
        let left = dataset(vec![json!({"loyalty_code": "L001", "name": "Alice"})]);
        let right = dataset(vec![
            json!({"loyalty_code": "L001", "total": 1}),
            json!({"loyalty_code": "L001", "total": 2}),
        ]);
        let mut inspector = MergeInspector::new(&left, &right, config(JoinKind::Left)).unwrap();
        inspector.perform_merge().unwrap();

        let report = inspector.get_report().unwrap();
        assert_eq!(report.number_of_rows_after_merge, 2);
        assert_eq!(report.number_of_rows_duplicated, 0);
        assert_eq!(report.right_duplicated_keys_in_keys.number, 1);
    }

    #[test]
    fn test_cross_join_reports_zero_key_metrics() {
        let (left, right) = (customers(), orders());
        let config = MergeConfig::new(JoinConfig::new(JoinKind::Cross));
        let mut inspector = MergeInspector::new(&left, &right, config).unwrap();
        let joined = inspector.perform_merge().unwrap();

        assert_eq!(joined.row_count(), 12);
        let report = inspector.get_report().unwrap();
        assert_eq!(report.number_of_matched_keys, 0);
        assert_eq!(report.left_duplicated_keys_in_keys.number, 0);
        assert!(!report.matched_keys_error);
    }

    #[test]
    fn test_unmatched_key_cases_after_merge() {
        let (left, right) = (customers(), orders());
        let mut inspector = MergeInspector::new(&left, &right, config(JoinKind::Inner)).unwrap();
        assert!(matches!(
            inspector.unmatched_key_cases(),
            Err(MergeInspectError::ReportNotReady)
        ));

        inspector.perform_merge().unwrap();

        let cases = inspector.unmatched_key_cases().unwrap();
        let codes = |samples: &[crate::models::KeySample]| {
            samples
                .iter()
                .filter_map(|s| s.get("loyalty_code").cloned())
                .collect::<Vec<_>>()
        };
        assert_eq!(codes(&cases.left), vec![json!("L003"), json!("L004")]);
        assert_eq!(codes(&cases.right), vec![json!("L005")]);
    }

    #[test]
    fn test_unmatched_key_cases_survive_a_rejected_merge() {
        let (left, right) = (customers(), orders());
        let config = config(JoinKind::Inner)
            .with_error_thresholds(ErrorThresholds::disabled().with_percentage_matched_keys(90.0))
            .raise_on(ErrorFlag::PercentageOfMatchedKeysError);
        let mut inspector = MergeInspector::new(&left, &right, config).unwrap();

        inspector.perform_merge().unwrap_err();

        assert_eq!(inspector.unmatched_key_cases().unwrap().left.len(), 2);
    }

    #[test]
    fn test_state_display_names() {
        assert_eq!(InspectionState::Joined.to_string(), "JOINED");
        assert_eq!(InspectionState::PreStatsComputed.to_string(), "PRE_STATS_COMPUTED");
        assert!(!InspectionState::PostStatsComputed.has_report());
    }
}
