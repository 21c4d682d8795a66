//! Tabular data models shared by the join primitive and the statistics.
//!
//! A `Dataset` is an ordered list of JSON object rows plus the ordered list
//! of column names. Rows may omit columns; a missing column reads as null.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MergeInspectError, Result};

/// A single row: column name to value.
pub type Row = Map<String, Value>;

/// One sampled key case: key column name to value.
pub type KeySample = Map<String, Value>;

/// Shared null used for columns a row does not carry.
static NULL: Value = Value::Null;

/// An ordered, read-only table of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Column names in output order
    pub columns: Vec<String>,
    /// Rows in input order
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Creates a dataset from an explicit column list and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Creates an empty dataset with the given columns.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a dataset from JSON objects.
    ///
    /// The column list is the union of all object keys, in first-seen order.
    /// Any element that is not an object is rejected.
    pub fn from_json_rows(values: Vec<Value>) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(values.len());

        for (index, value) in values.into_iter().enumerate() {
            let Value::Object(row) = value else {
                return Err(MergeInspectError::configuration(format!(
                    "row {} is not a JSON object",
                    index
                )));
            };

            for name in row.keys() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.clone());
                }
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Parses a JSON array of objects.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let values: Vec<Value> = serde_json::from_str(json)
            .map_err(|e| MergeInspectError::serialization("dataset is not a JSON array", e))?;
        Self::from_json_rows(values)
    }

    /// Renders the rows back as JSON objects, one per row.
    ///
    /// Every row carries every column; missing values become null.
    pub fn to_json_rows(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let full: Row = self
                    .columns
                    .iter()
                    .map(|column| (column.clone(), column_value(row, column).clone()))
                    .collect();
                Value::Object(full)
            })
            .collect()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the column is part of the schema.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Canonical full-row encoding over the dataset's column list.
    pub fn row_fingerprint(&self, row: &Row) -> String {
        let values: Vec<&Value> = self.columns.iter().map(|c| column_value(row, c)).collect();
        encode(&values)
    }
}

/// Canonical, hashable encoding of a key tuple.
///
/// Equality follows JSON equality of the encoded values, so `1` and `"1"`
/// are distinct keys. Nulls are encoded like any other value: two tuples
/// holding null in the same positions compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyValue(String);

impl KeyValue {
    /// Encodes a key tuple.
    pub fn from_values(values: &[&Value]) -> Self {
        Self(encode(values))
    }

    /// Encodes the key of a row.
    pub fn of_row(row: &Row, keys: &[String]) -> Self {
        Self::from_values(&key_values(row, keys))
    }

    /// The canonical encoding.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reads a column from a row, treating an absent column as null.
pub fn column_value<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

/// Extracts the key tuple of a row for the given key columns.
pub fn key_values<'a>(row: &'a Row, keys: &[String]) -> Vec<&'a Value> {
    keys.iter().map(|k| column_value(row, k)).collect()
}

/// Renders a key tuple as a sample case, columns in key order.
pub fn key_sample(row: &Row, keys: &[String]) -> KeySample {
    keys.iter()
        .map(|k| (k.clone(), column_value(row, k).clone()))
        .collect()
}

/// True when any key component of the row is null or missing.
pub fn has_null_key(row: &Row, keys: &[String]) -> bool {
    keys.iter().any(|k| column_value(row, k).is_null())
}

fn encode(values: &[&Value]) -> String {
    serde_json::to_string(values).unwrap_or_else(|e| {
        tracing::trace!("Failed to encode values for comparison: {}", e);
        "__SERIALIZE_ERROR__".to_string()
    })
}
