//! Join primitive.
//!
//! The inspector never joins rows itself; it hands both datasets to a
//! [`Joiner`] and records whatever comes back. [`HashJoiner`] is the bundled
//! implementation: a hash join on canonical key encodings supporting inner,
//! left, right, outer and cross joins over single or composite keys.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Dataset, KeyValue, Row, column_value};

/// Join kind, with the usual relational semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Only rows whose key exists on both sides
    #[default]
    Inner,
    /// Every left row, matched right rows where available
    Left,
    /// Every right row, matched left rows where available
    Right,
    /// Every row from both sides
    Outer,
    /// Cartesian product, no keys
    Cross,
}

impl JoinKind {
    /// All join kinds, in declaration order.
    pub const ALL: [JoinKind; 5] = [
        JoinKind::Inner,
        JoinKind::Left,
        JoinKind::Right,
        JoinKind::Outer,
        JoinKind::Cross,
    ];

    /// Wire name of the join kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Outer => "outer",
            JoinKind::Cross => "cross",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown join kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown join kind '{0}' (expected one of inner, left, right, outer, cross)")]
pub struct ParseJoinKindError(pub String);

impl FromStr for JoinKind {
    type Err = ParseJoinKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JoinKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseJoinKindError(s.to_string()))
    }
}

/// Resolved key columns for both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKeys {
    /// Key columns on the left dataset
    pub left: Vec<String>,
    /// Key columns on the right dataset
    pub right: Vec<String>,
    /// True when both sides use the same column names (`on`)
    pub shared: bool,
}

impl JoinKeys {
    /// Same key columns on both sides.
    pub fn shared(columns: Vec<String>) -> Self {
        Self {
            left: columns.clone(),
            right: columns,
            shared: true,
        }
    }

    /// Distinct key columns per side.
    pub fn distinct(left: Vec<String>, right: Vec<String>) -> Self {
        Self {
            left,
            right,
            shared: false,
        }
    }

    /// True when no key columns are configured (cross join).
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Everything the join primitive needs, passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Join kind
    pub how: JoinKind,
    /// Key columns
    pub keys: JoinKeys,
    /// Suffixes for overlapping non-key columns (left, right)
    pub suffixes: (String, String),
}

impl JoinSpec {
    /// Creates a join spec with the default `_x`/`_y` suffixes.
    pub fn new(how: JoinKind, keys: JoinKeys) -> Self {
        Self {
            how,
            keys,
            suffixes: default_suffixes(),
        }
    }
}

/// Default suffixes for overlapping column names.
pub fn default_suffixes() -> (String, String) {
    ("_x".to_string(), "_y".to_string())
}

/// Which side a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left dataset
    Left,
    /// Right dataset
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Errors raised by the join primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// A key column does not exist in its dataset
    #[error("Join failed: key column '{column}' not found in {side} dataset")]
    MissingColumn { side: Side, column: String },

    /// Left and right key lists have different lengths
    #[error("Join failed: {left} left key column(s) but {right} right key column(s)")]
    KeyArityMismatch { left: usize, right: usize },

    /// A cross join was given key columns, or a keyed join was given none
    #[error("Join failed: {how} join {reason}")]
    InvalidKeys { how: JoinKind, reason: String },

    /// Key columns hold values of kinds that can never compare equal
    #[error(
        "Join failed: cannot join {left_kind} column '{left_column}' with {right_kind} column '{right_column}'"
    )]
    IncompatibleKeyTypes {
        left_column: String,
        right_column: String,
        left_kind: String,
        right_kind: String,
    },
}

/// A join primitive.
pub trait Joiner {
    /// Joins two datasets. Inputs are read-only.
    fn join(&self, left: &Dataset, right: &Dataset, spec: &JoinSpec) -> Result<Dataset, JoinError>;
}

/// In-memory hash join.
///
/// Null key components compare equal to each other, so a null key on the
/// left matches a null key in the same position on the right. Output columns
/// are the left columns followed by the right columns; shared key columns
/// appear once and overlapping non-key names get the configured suffixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashJoiner;

/// Where an output column takes its value from.
#[derive(Debug, Clone)]
enum ColumnSource {
    Left(String),
    Right(String),
    /// Shared key column: left value, or right value on right-only rows
    SharedKey(String),
}

#[derive(Debug, Clone)]
struct OutputColumn {
    name: String,
    source: ColumnSource,
}

impl Joiner for HashJoiner {
    fn join(&self, left: &Dataset, right: &Dataset, spec: &JoinSpec) -> Result<Dataset, JoinError> {
        validate_keys(left, right, spec)?;

        let plan = output_plan(left, right, spec);
        let columns: Vec<String> = plan.iter().map(|c| c.name.clone()).collect();
        let combine = |l: Option<&Row>, r: Option<&Row>| combine_rows(&plan, l, r);

        let rows = match spec.how {
            JoinKind::Cross => {
                let mut rows = Vec::with_capacity(left.row_count().saturating_mul(right.row_count()));
                for l in &left.rows {
                    for r in &right.rows {
                        rows.push(combine(Some(l), Some(r)));
                    }
                }
                rows
            }
            JoinKind::Inner | JoinKind::Left | JoinKind::Outer => {
                let right_index = build_index(right, &spec.keys.right);
                let mut matched_right: HashSet<usize> = HashSet::new();
                let mut rows = Vec::new();

                for l in &left.rows {
                    let matches = right_index.get(&KeyValue::of_row(l, &spec.keys.left));
                    match matches {
                        Some(positions) => {
                            for &pos in positions {
                                matched_right.insert(pos);
                                rows.push(combine(Some(l), right.rows.get(pos)));
                            }
                        }
                        None if spec.how != JoinKind::Inner => rows.push(combine(Some(l), None)),
                        None => {}
                    }
                }

                if spec.how == JoinKind::Outer {
                    for (pos, r) in right.rows.iter().enumerate() {
                        if !matched_right.contains(&pos) {
                            rows.push(combine(None, Some(r)));
                        }
                    }
                }
                rows
            }
            JoinKind::Right => {
                let left_index = build_index(left, &spec.keys.left);
                let mut rows = Vec::new();

                for r in &right.rows {
                    let matches = left_index.get(&KeyValue::of_row(r, &spec.keys.right));
                    match matches {
                        Some(positions) => {
                            for &pos in positions {
                                rows.push(combine(left.rows.get(pos), Some(r)));
                            }
                        }
                        None => rows.push(combine(None, Some(r))),
                    }
                }
                rows
            }
        };

        tracing::trace!(
            "{} join produced {} rows from {} x {}",
            spec.how,
            rows.len(),
            left.row_count(),
            right.row_count()
        );

        Ok(Dataset::new(columns, rows))
    }
}

fn validate_keys(left: &Dataset, right: &Dataset, spec: &JoinSpec) -> Result<(), JoinError> {
    let keys = &spec.keys;

    if spec.how == JoinKind::Cross {
        if !keys.is_empty() {
            return Err(JoinError::InvalidKeys {
                how: spec.how,
                reason: "does not accept key columns".to_string(),
            });
        }
        return Ok(());
    }

    if keys.left.len() != keys.right.len() {
        return Err(JoinError::KeyArityMismatch {
            left: keys.left.len(),
            right: keys.right.len(),
        });
    }
    if keys.is_empty() {
        return Err(JoinError::InvalidKeys {
            how: spec.how,
            reason: "requires at least one key column".to_string(),
        });
    }

    for (dataset, side, columns) in [
        (left, Side::Left, &keys.left),
        (right, Side::Right, &keys.right),
    ] {
        if let Some(missing) = columns.iter().find(|c| !dataset.has_column(c)) {
            return Err(JoinError::MissingColumn {
                side,
                column: missing.clone(),
            });
        }
    }

    for (left_column, right_column) in keys.left.iter().zip(&keys.right) {
        let left_kinds = value_kinds(left, left_column);
        let right_kinds = value_kinds(right, right_column);
        if !left_kinds.is_empty()
            && !right_kinds.is_empty()
            && left_kinds.is_disjoint(&right_kinds)
        {
            return Err(JoinError::IncompatibleKeyTypes {
                left_column: left_column.clone(),
                right_column: right_column.clone(),
                left_kind: describe_kinds(&left_kinds),
                right_kind: describe_kinds(&right_kinds),
            });
        }
    }

    Ok(())
}

/// JSON kinds of the non-null values in a column.
fn value_kinds(dataset: &Dataset, column: &str) -> BTreeSet<&'static str> {
    dataset
        .rows
        .iter()
        .filter_map(|row| match column_value(row, column) {
            Value::Null => None,
            Value::Bool(_) => Some("boolean"),
            Value::Number(_) => Some("number"),
            Value::String(_) => Some("string"),
            Value::Array(_) => Some("array"),
            Value::Object(_) => Some("object"),
        })
        .collect()
}

fn describe_kinds(kinds: &BTreeSet<&'static str>) -> String {
    kinds.iter().copied().collect::<Vec<_>>().join("/")
}

/// Key -> row positions, in row order.
fn build_index(dataset: &Dataset, keys: &[String]) -> HashMap<KeyValue, Vec<usize>> {
    let mut index: HashMap<KeyValue, Vec<usize>> = HashMap::new();
    for (pos, row) in dataset.rows.iter().enumerate() {
        index
            .entry(KeyValue::of_row(row, keys))
            .or_default()
            .push(pos);
    }
    index
}

fn output_plan(left: &Dataset, right: &Dataset, spec: &JoinSpec) -> Vec<OutputColumn> {
    let shared_keys: HashSet<&str> = if spec.keys.shared {
        spec.keys.left.iter().map(String::as_str).collect()
    } else {
        HashSet::new()
    };

    let left_rest: HashSet<&str> = left
        .columns
        .iter()
        .map(String::as_str)
        .filter(|c| !shared_keys.contains(c))
        .collect();
    let right_rest: HashSet<&str> = right
        .columns
        .iter()
        .map(String::as_str)
        .filter(|c| !shared_keys.contains(c))
        .collect();

    let (left_suffix, right_suffix) = &spec.suffixes;
    let mut plan = Vec::with_capacity(left.columns.len().saturating_add(right.columns.len()));

    for column in &left.columns {
        let (name, source) = if shared_keys.contains(column.as_str()) {
            (column.clone(), ColumnSource::SharedKey(column.clone()))
        } else if right_rest.contains(column.as_str()) {
            (
                format!("{}{}", column, left_suffix),
                ColumnSource::Left(column.clone()),
            )
        } else {
            (column.clone(), ColumnSource::Left(column.clone()))
        };
        plan.push(OutputColumn { name, source });
    }

    for column in &right.columns {
        if shared_keys.contains(column.as_str()) {
            continue;
        }
        let name = if left_rest.contains(column.as_str()) {
            format!("{}{}", column, right_suffix)
        } else {
            column.clone()
        };
        plan.push(OutputColumn {
            name,
            source: ColumnSource::Right(column.clone()),
        });
    }

    plan
}

fn combine_rows(plan: &[OutputColumn], left_row: Option<&Row>, right_row: Option<&Row>) -> Row {
    let pick = |row: Option<&Row>, column: &str| {
        row.map_or(Value::Null, |r| column_value(r, column).clone())
    };

    plan.iter()
        .map(|output| {
            let value = match &output.source {
                ColumnSource::Left(column) => pick(left_row, column),
                ColumnSource::Right(column) => pick(right_row, column),
                ColumnSource::SharedKey(column) => match left_row {
                    Some(_) => pick(left_row, column),
                    None => pick(right_row, column),
                },
            };
            (output.name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(rows: Vec<Value>) -> Dataset {
        Dataset::from_json_rows(rows).unwrap()
    }

    fn customers() -> Dataset {
        dataset(vec![
            json!({"id": "C1", "name": "Alice"}),
            json!({"id": "C2", "name": "Bob"}),
            json!({"id": "C3", "name": "Carol"}),
        ])
    }

    fn orders() -> Dataset {
        dataset(vec![
            json!({"id": "C1", "amount": 10}),
            json!({"id": "C1", "amount": 20}),
            json!({"id": "C4", "amount": 30}),
        ])
    }

    fn on_id(how: JoinKind) -> JoinSpec {
        JoinSpec::new(how, JoinKeys::shared(vec!["id".to_string()]))
    }

    #[test]
    fn test_join_kind_parse_and_display() {
        assert_eq!("outer".parse::<JoinKind>().unwrap(), JoinKind::Outer);
        assert_eq!("LEFT".parse::<JoinKind>().unwrap(), JoinKind::Left);
        assert!("semi".parse::<JoinKind>().is_err());
        assert_eq!(JoinKind::Cross.to_string(), "cross");
        assert_eq!(JoinKind::default(), JoinKind::Inner);
    }

    #[test]
    fn test_inner_join_fans_out_duplicates() {
        let joined = HashJoiner
            .join(&customers(), &orders(), &on_id(JoinKind::Inner))
            .unwrap();

        assert_eq!(joined.row_count(), 2);
        assert_eq!(joined.columns, vec!["id", "name", "amount"]);
        assert_eq!(joined.rows[0].get("amount"), Some(&json!(10)));
        assert_eq!(joined.rows[1].get("amount"), Some(&json!(20)));
    }

    #[test]
    fn test_left_join_keeps_unmatched_left_rows() {
        let joined = HashJoiner
            .join(&customers(), &orders(), &on_id(JoinKind::Left))
            .unwrap();

        assert_eq!(joined.row_count(), 4);
        let bob = &joined.rows[2];
        assert_eq!(bob.get("id"), Some(&json!("C2")));
        assert_eq!(bob.get("amount"), Some(&Value::Null));
    }

    #[test]
    fn test_right_join_follows_right_order() {
        let joined = HashJoiner
            .join(&customers(), &orders(), &on_id(JoinKind::Right))
            .unwrap();

        assert_eq!(joined.row_count(), 3);
        let last = &joined.rows[2];
        assert_eq!(last.get("id"), Some(&json!("C4")));
        assert_eq!(last.get("name"), Some(&Value::Null));
        assert_eq!(last.get("amount"), Some(&json!(30)));
    }

    #[test]
    fn test_outer_join_appends_unmatched_right_rows() {
        let joined = HashJoiner
            .join(&customers(), &orders(), &on_id(JoinKind::Outer))
            .unwrap();

        // C1 x2, C2, C3, then C4 from the right
        assert_eq!(joined.row_count(), 5);
        assert_eq!(joined.rows[4].get("id"), Some(&json!("C4")));
    }

    #[test]
    fn test_cross_join_is_cartesian() {
        let spec = JoinSpec::new(JoinKind::Cross, JoinKeys::default());
        let joined = HashJoiner.join(&customers(), &orders(), &spec).unwrap();

        assert_eq!(joined.row_count(), 9);
        assert!(joined.has_column("id_x"));
        assert!(joined.has_column("id_y"));
    }

    #[test]
    fn test_cross_join_rejects_keys() {
        let spec = JoinSpec::new(JoinKind::Cross, JoinKeys::shared(vec!["id".to_string()]));
        let err = HashJoiner.join(&customers(), &orders(), &spec).unwrap_err();
        assert!(matches!(err, JoinError::InvalidKeys { .. }));
    }

    #[test]
    fn test_distinct_key_names_keep_both_columns() {
        let left = dataset(vec![json!({"customer": "C1", "v": 1})]);
        let right = dataset(vec![json!({"client": "C1", "v": 2})]);
        let spec = JoinSpec::new(
            JoinKind::Inner,
            JoinKeys::distinct(vec!["customer".to_string()], vec!["client".to_string()]),
        );

        let joined = HashJoiner.join(&left, &right, &spec).unwrap();
        assert_eq!(joined.columns, vec!["customer", "v_x", "client", "v_y"]);
        assert_eq!(joined.rows[0].get("v_y"), Some(&json!(2)));
    }

    #[test]
    fn test_null_keys_match_each_other() {
        let left = dataset(vec![json!({"k": null, "a": 1}), json!({"k": "a", "a": 2})]);
        let right = dataset(vec![json!({"k": null, "b": 1}), json!({"k": "b", "b": 2})]);

        let inner = HashJoiner.join(&left, &right, &on_k(JoinKind::Inner)).unwrap();
        assert_eq!(inner.row_count(), 1);
        assert_eq!(inner.rows[0].get("k"), Some(&Value::Null));
        assert_eq!(inner.rows[0].get("a"), Some(&json!(1)));
        assert_eq!(inner.rows[0].get("b"), Some(&json!(1)));

        let outer = HashJoiner.join(&left, &right, &on_k(JoinKind::Outer)).unwrap();
        assert_eq!(outer.row_count(), 3);
    }

    #[test]
    fn test_missing_key_column_joins_like_null() {
        let left = dataset(vec![json!({"k": "a", "a": 1}), json!({"a": 2})]);
        let right = dataset(vec![json!({"k": null, "b": 9})]);

        let joined = HashJoiner.join(&left, &right, &on_k(JoinKind::Inner)).unwrap();
        assert_eq!(joined.row_count(), 1);
        assert_eq!(joined.rows[0].get("a"), Some(&json!(2)));
    }

    fn on_k(how: JoinKind) -> JoinSpec {
        JoinSpec::new(how, JoinKeys::shared(vec!["k".to_string()]))
    }

    #[test]
    fn test_composite_keys() {
        let left = dataset(vec![
            json!({"a": 1, "b": "x", "l": true}),
            json!({"a": 1, "b": "y", "l": false}),
        ]);
        let right = dataset(vec![json!({"a": 1, "b": "y", "r": 9})]);
        let spec = JoinSpec::new(
            JoinKind::Inner,
            JoinKeys::shared(vec!["a".to_string(), "b".to_string()]),
        );

        let joined = HashJoiner.join(&left, &right, &spec).unwrap();
        assert_eq!(joined.row_count(), 1);
        assert_eq!(joined.rows[0].get("l"), Some(&json!(false)));
    }

    #[test]
    fn test_missing_key_column() {
        let spec = JoinSpec::new(
            JoinKind::Inner,
            JoinKeys::shared(vec!["missing".to_string()]),
        );
        let err = HashJoiner.join(&customers(), &orders(), &spec).unwrap_err();
        assert_eq!(
            err,
            JoinError::MissingColumn {
                side: Side::Left,
                column: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_key_arity_mismatch() {
        let spec = JoinSpec::new(
            JoinKind::Inner,
            JoinKeys::distinct(vec!["id".to_string()], vec![]),
        );
        let err = HashJoiner.join(&customers(), &orders(), &spec).unwrap_err();
        assert!(matches!(err, JoinError::KeyArityMismatch { left: 1, right: 0 }));
    }

    #[test]
    fn test_incompatible_key_types() {
        let left = dataset(vec![json!({"k": 1}), json!({"k": 2})]);
        let right = dataset(vec![json!({"k": "1"})]);

        let err = HashJoiner.join(&left, &right, &on_k(JoinKind::Inner)).unwrap_err();
        assert!(matches!(err, JoinError::IncompatibleKeyTypes { .. }));
        assert!(err.to_string().contains("number"));
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn test_empty_inputs() {
        let left = Dataset::with_columns(["k"]);
        let right = Dataset::with_columns(["k", "v"]);

        let joined = HashJoiner.join(&left, &right, &on_k(JoinKind::Outer)).unwrap();
        assert!(joined.is_empty());
        assert_eq!(joined.columns, vec!["k", "v"]);
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let left = customers();
        let right = orders();
        let before = (left.clone(), right.clone());

        let _ = HashJoiner.join(&left, &right, &on_id(JoinKind::Outer)).unwrap();
        assert_eq!((left, right), before);
    }
}
