//! Merge inspection configuration.
//!
//! Join options, error thresholds and the raise-set. Every option name is a
//! closed enumeration: unknown threshold names, flag names or join kinds are
//! rejected instead of being silently ignored.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MergeInspectError, Result};
use crate::join::{JoinKeys, JoinKind, JoinSpec, default_suffixes};
use crate::models::Dataset;

/// A configurable threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMetric {
    /// Upper bound on the duplicated-key percentage of either side
    DuplicatedKeys,
    /// Upper bound on the null-key percentage of either side
    NullKeys,
    /// Lower bound on the matched-key percentage
    PercentageMatchedKeys,
    /// Upper bound on the duplicated-row percentage after the merge
    RowsDuplicated,
}

impl ThresholdMetric {
    /// All threshold metrics.
    pub const ALL: [ThresholdMetric; 4] = [
        ThresholdMetric::DuplicatedKeys,
        ThresholdMetric::NullKeys,
        ThresholdMetric::PercentageMatchedKeys,
        ThresholdMetric::RowsDuplicated,
    ];

    /// Configuration name of the threshold.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdMetric::DuplicatedKeys => "duplicated_keys",
            ThresholdMetric::NullKeys => "null_keys",
            ThresholdMetric::PercentageMatchedKeys => "percentage_matched_keys",
            ThresholdMetric::RowsDuplicated => "rows_duplicated",
        }
    }

    /// True for metrics that flag when the value falls below the threshold.
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, ThresholdMetric::PercentageMatchedKeys)
    }
}

impl fmt::Display for ThresholdMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdMetric {
    type Err = MergeInspectError;

    fn from_str(s: &str) -> Result<Self> {
        ThresholdMetric::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| {
                MergeInspectError::configuration(format!(
                    "unknown error threshold '{}' (expected one of {})",
                    s,
                    names(ThresholdMetric::ALL.iter().map(ThresholdMetric::as_str))
                ))
            })
    }
}

/// An error flag of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorFlag {
    /// Either side's duplicated-key percentage exceeds its threshold
    DuplicatedKeysError,
    /// Either side's null-key percentage exceeds its threshold
    NullKeysError,
    /// The matched-key percentage is below its threshold
    PercentageOfMatchedKeysError,
    /// The matched-key threshold fired, or the join produced no rows despite matches
    MatchedKeysError,
    /// The duplicated-row percentage exceeds its threshold
    RowsDuplicatedError,
}

impl ErrorFlag {
    /// All flags, in report order.
    pub const ALL: [ErrorFlag; 5] = [
        ErrorFlag::DuplicatedKeysError,
        ErrorFlag::NullKeysError,
        ErrorFlag::PercentageOfMatchedKeysError,
        ErrorFlag::MatchedKeysError,
        ErrorFlag::RowsDuplicatedError,
    ];

    /// Report key of the flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorFlag::DuplicatedKeysError => "duplicated_keys_error",
            ErrorFlag::NullKeysError => "null_keys_error",
            ErrorFlag::PercentageOfMatchedKeysError => "percentage_of_matched_keys_error",
            ErrorFlag::MatchedKeysError => "matched_keys_error",
            ErrorFlag::RowsDuplicatedError => "rows_duplicated_error",
        }
    }
}

impl fmt::Display for ErrorFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorFlag {
    type Err = MergeInspectError;

    fn from_str(s: &str) -> Result<Self> {
        ErrorFlag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s.trim())
            .ok_or_else(|| {
                MergeInspectError::configuration(format!(
                    "unknown error flag '{}' (expected one of {})",
                    s,
                    names(ErrorFlag::ALL.iter().map(ErrorFlag::as_str))
                ))
            })
    }
}

fn names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Percentage thresholds, 0-100. `None` disables the check.
///
/// Values outside 0-100 are kept as configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorThresholds {
    /// Maximum duplicated-key percentage per side
    #[serde(default)]
    pub duplicated_keys: Option<f64>,
    /// Maximum null-key percentage per side
    #[serde(default)]
    pub null_keys: Option<f64>,
    /// Minimum matched-key percentage
    #[serde(default)]
    pub percentage_matched_keys: Option<f64>,
    /// Maximum duplicated-row percentage after the merge
    #[serde(default)]
    pub rows_duplicated: Option<f64>,
}

impl Default for ErrorThresholds {
    fn default() -> Self {
        Self {
            duplicated_keys: Some(0.0),
            null_keys: Some(0.0),
            percentage_matched_keys: None,
            rows_duplicated: Some(0.0),
        }
    }
}

impl ErrorThresholds {
    /// Creates thresholds with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Thresholds with every check disabled.
    pub fn disabled() -> Self {
        Self {
            duplicated_keys: None,
            null_keys: None,
            percentage_matched_keys: None,
            rows_duplicated: None,
        }
    }

    /// Builds thresholds from `(name, value)` pairs.
    ///
    /// Only the named checks are enabled; unknown names are rejected.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut thresholds = Self::disabled();
        for (name, value) in pairs {
            thresholds.set(name.parse()?, Some(value));
        }
        Ok(thresholds)
    }

    /// Returns the configured threshold for a metric.
    pub fn get(&self, metric: ThresholdMetric) -> Option<f64> {
        match metric {
            ThresholdMetric::DuplicatedKeys => self.duplicated_keys,
            ThresholdMetric::NullKeys => self.null_keys,
            ThresholdMetric::PercentageMatchedKeys => self.percentage_matched_keys,
            ThresholdMetric::RowsDuplicated => self.rows_duplicated,
        }
    }

    /// Sets or clears the threshold for a metric.
    pub fn set(&mut self, metric: ThresholdMetric, value: Option<f64>) {
        if let Some(v) = value
            && !(0.0..=100.0).contains(&v)
        {
            tracing::warn!(
                "{} threshold {} is outside the 0-100 percentage range",
                metric,
                v
            );
        }
        match metric {
            ThresholdMetric::DuplicatedKeys => self.duplicated_keys = value,
            ThresholdMetric::NullKeys => self.null_keys = value,
            ThresholdMetric::PercentageMatchedKeys => self.percentage_matched_keys = value,
            ThresholdMetric::RowsDuplicated => self.rows_duplicated = value,
        }
    }

    /// Builder method to set the duplicated-keys threshold.
    pub fn with_duplicated_keys(mut self, threshold: f64) -> Self {
        self.set(ThresholdMetric::DuplicatedKeys, Some(threshold));
        self
    }

    /// Builder method to set the null-keys threshold.
    pub fn with_null_keys(mut self, threshold: f64) -> Self {
        self.set(ThresholdMetric::NullKeys, Some(threshold));
        self
    }

    /// Builder method to set the matched-keys lower bound.
    pub fn with_percentage_matched_keys(mut self, threshold: f64) -> Self {
        self.set(ThresholdMetric::PercentageMatchedKeys, Some(threshold));
        self
    }

    /// Builder method to set the duplicated-rows threshold.
    pub fn with_rows_duplicated(mut self, threshold: f64) -> Self {
        self.set(ThresholdMetric::RowsDuplicated, Some(threshold));
        self
    }
}

/// Join options, passed through to the join primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfig {
    /// Join kind
    #[serde(default)]
    pub how: JoinKind,
    /// Key columns shared by both sides
    #[serde(default)]
    pub on: Option<Vec<String>>,
    /// Key columns on the left side
    #[serde(default)]
    pub left_on: Option<Vec<String>>,
    /// Key columns on the right side
    #[serde(default)]
    pub right_on: Option<Vec<String>>,
    /// Suffixes for overlapping non-key columns
    #[serde(default = "default_suffixes")]
    pub suffixes: (String, String),
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            how: JoinKind::Inner,
            on: None,
            left_on: None,
            right_on: None,
            suffixes: default_suffixes(),
        }
    }
}

impl JoinConfig {
    /// Creates a join config for the given kind, keys inferred.
    pub fn new(how: JoinKind) -> Self {
        Self {
            how,
            ..Self::default()
        }
    }

    /// Builder method to join on shared column names.
    pub fn on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to join on distinct column names per side.
    pub fn left_right_on<L, R, S, T>(mut self, left: L, right: R) -> Self
    where
        L: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.left_on = Some(left.into_iter().map(Into::into).collect());
        self.right_on = Some(right.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to set the overlap suffixes.
    pub fn with_suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.suffixes = (left.into(), right.into());
        self
    }

    /// Resolves the key options against both datasets.
    ///
    /// Any malformed combination is a configuration error.
    pub fn resolve(&self, left: &Dataset, right: &Dataset) -> Result<JoinSpec> {
        let keys = self.resolve_keys(left, right)?;

        for (dataset, side, columns) in [(left, "left", &keys.left), (right, "right", &keys.right)]
        {
            if let Some(missing) = columns.iter().find(|c| !dataset.has_column(c)) {
                return Err(MergeInspectError::configuration(format!(
                    "key column '{}' not found in {} dataset",
                    missing, side
                )));
            }
        }

        Ok(JoinSpec {
            how: self.how,
            keys,
            suffixes: self.suffixes.clone(),
        })
    }

    fn resolve_keys(&self, left: &Dataset, right: &Dataset) -> Result<JoinKeys> {
        if self.how == JoinKind::Cross {
            if self.on.is_some() || self.left_on.is_some() || self.right_on.is_some() {
                return Err(MergeInspectError::configuration(
                    "cross join does not accept on, left_on or right_on",
                ));
            }
            return Ok(JoinKeys::default());
        }

        match (&self.on, &self.left_on, &self.right_on) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(
                MergeInspectError::configuration("use either on or left_on/right_on, not both"),
            ),
            (Some(on), None, None) => {
                non_empty("on", on)?;
                Ok(JoinKeys::shared(on.clone()))
            }
            (None, Some(_), None) | (None, None, Some(_)) => Err(
                MergeInspectError::configuration("left_on and right_on must be given together"),
            ),
            (None, Some(left_on), Some(right_on)) => {
                non_empty("left_on", left_on)?;
                non_empty("right_on", right_on)?;
                if left_on.len() != right_on.len() {
                    return Err(MergeInspectError::configuration(format!(
                        "left_on has {} column(s) but right_on has {}",
                        left_on.len(),
                        right_on.len()
                    )));
                }
                if left_on == right_on {
                    Ok(JoinKeys::shared(left_on.clone()))
                } else {
                    Ok(JoinKeys::distinct(left_on.clone(), right_on.clone()))
                }
            }
            (None, None, None) => {
                let common: Vec<String> = left
                    .columns
                    .iter()
                    .filter(|c| right.has_column(c))
                    .cloned()
                    .collect();
                if common.is_empty() {
                    return Err(MergeInspectError::configuration(
                        "no key columns given and the datasets share no column names",
                    ));
                }
                tracing::debug!("No join keys configured, using common columns {:?}", common);
                Ok(JoinKeys::shared(common))
            }
        }
    }
}

fn non_empty(option: &str, columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(MergeInspectError::configuration(format!(
            "{} must name at least one column",
            option
        )));
    }
    if let Some(blank) = columns.iter().find(|c| c.trim().is_empty()) {
        return Err(MergeInspectError::configuration(format!(
            "{} contains an empty column name '{}'",
            option, blank
        )));
    }
    Ok(())
}

/// Complete inspector configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Join options
    #[serde(default)]
    pub join: JoinConfig,
    /// Error thresholds; a missing mapping means the defaults
    #[serde(default)]
    pub error_thresholds: ErrorThresholds,
    /// Flags that turn a completed inspection into a failure
    #[serde(default)]
    pub raise_on_errors: BTreeSet<ErrorFlag>,
}

impl MergeConfig {
    /// Creates a config with default thresholds and an empty raise-set.
    pub fn new(join: JoinConfig) -> Self {
        Self {
            join,
            ..Self::default()
        }
    }

    /// Parses a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MergeInspectError::serialization("invalid merge configuration", e))
    }

    /// Builder method to set the error thresholds.
    pub fn with_error_thresholds(mut self, thresholds: ErrorThresholds) -> Self {
        self.error_thresholds = thresholds;
        self
    }

    /// Builder method to set the raise-set.
    pub fn with_raise_on_errors<I>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = ErrorFlag>,
    {
        self.raise_on_errors = flags.into_iter().collect();
        self
    }

    /// Builder method to add one flag to the raise-set.
    pub fn raise_on(mut self, flag: ErrorFlag) -> Self {
        self.raise_on_errors.insert(flag);
        self
    }
}
