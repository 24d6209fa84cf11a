//! Result reducers: turn an ordered outcome sequence into the caller-facing shape.
//!
//! Two shapes are provided: a flat record list ([`flatten_records`],
//! [`flatten_pages`]) and a column-oriented [`Table`]. What happens to failed
//! jobs is decided here through a [`FailurePolicy`], never by the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{Outcome, OutcomeStatus};

/// What a reducer does with failed outcomes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed job fails the whole request (default)
    #[default]
    FailFast,
    /// Failed jobs are logged and left out of the aggregate
    SkipFailures,
}

/// Concatenate each success payload's `key` array, in outcome order
///
/// Payloads without `key` (or where it is not an array) contribute nothing.
///
/// # Errors
///
/// With [`FailurePolicy::FailFast`], returns [`Error::Fetch`] for the first
/// failed outcome.
pub fn flatten_records(outcomes: Vec<Outcome>, key: &str, policy: FailurePolicy) -> Result<Vec<Value>> {
    flatten_pages(outcomes, policy, |mut payload| match payload.get_mut(key) {
        Some(Value::Array(items)) => std::mem::take(items),
        _ => Vec::new(),
    })
}

/// Concatenate the records `extract` pulls out of each success payload, in outcome order
///
/// # Errors
///
/// With [`FailurePolicy::FailFast`], returns [`Error::Fetch`] for the first
/// failed outcome.
pub fn flatten_pages<F>(outcomes: Vec<Outcome>, policy: FailurePolicy, mut extract: F) -> Result<Vec<Value>>
where
    F: FnMut(Value) -> Vec<Value>,
{
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for outcome in outcomes {
        match outcome.status {
            OutcomeStatus::Success(payload) => records.extend(extract(payload)),
            OutcomeStatus::Failure(error) => match policy {
                FailurePolicy::FailFast => {
                    return Err(Error::Fetch {
                        index: outcome.sequence_index,
                        source: error,
                    });
                }
                FailurePolicy::SkipFailures => {
                    tracing::warn!(
                        sequence_index = outcome.sequence_index,
                        kind = error.kind(),
                        error = %error,
                        "Skipping failed job"
                    );
                    skipped += 1;
                }
            },
        }
    }

    if skipped > 0 {
        tracing::info!(skipped, records = records.len(), "Reduced batch with failures skipped");
    }
    Ok(records)
}

/// Column-oriented table built from API records
///
/// Rows are kept in insertion order; cells missing from a row are `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names
    pub columns: Vec<String>,
    /// Row values, one per column
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of a column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Build a table from a list of JSON objects, one row per object
    ///
    /// Columns appear in first-seen order. Non-object records are skipped.
    pub fn from_records(records: &[Value]) -> Self {
        let mut table = Table::new();
        for record in records {
            if let Value::Object(map) = record {
                table.push_object(map);
            }
        }
        table
    }

    /// Build a table from a `[[period, value], ...]` data array
    ///
    /// Every scalar entry of `metadata` is broadcast into its own column.
    pub fn from_series_data(data: &[Value], metadata: &Map<String, Value>) -> Self {
        let mut columns = vec!["period".to_string(), "value".to_string()];
        let broadcast: Vec<(&String, &Value)> = metadata
            .iter()
            .filter(|(_, v)| !v.is_array() && !v.is_object())
            .collect();
        columns.extend(broadcast.iter().map(|(k, _)| (*k).clone()));

        let rows = data
            .iter()
            .map(|point| {
                let mut row = match point {
                    Value::Array(pair) => vec![
                        pair.first().cloned().unwrap_or(Value::Null),
                        pair.get(1).cloned().unwrap_or(Value::Null),
                    ],
                    _ => vec![Value::Null, Value::Null],
                };
                row.extend(broadcast.iter().map(|(_, v)| (*v).clone()));
                row
            })
            .collect();

        Table { columns, rows }
    }

    /// Set `name` to `value` on every row, adding the column if needed
    pub fn broadcast(&mut self, name: &str, value: &Value) {
        let index = self.ensure_column(name);
        for row in &mut self.rows {
            row[index] = value.clone();
        }
    }

    /// Append another table, taking the union of columns
    pub fn append(&mut self, other: Table) {
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|name| self.ensure_column(name))
            .collect();
        let width = self.columns.len();
        for row in other.rows {
            let mut aligned = vec![Value::Null; width];
            for (value, &target) in row.into_iter().zip(&mapping) {
                aligned[target] = value;
            }
            self.rows.push(aligned);
        }
    }

    /// Concatenate tables in order, taking the union of columns
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        tables.into_iter().fold(Table::new(), |mut acc, table| {
            acc.append(table);
            acc
        })
    }

    fn push_object(&mut self, map: &Map<String, Value>) {
        for key in map.keys() {
            self.ensure_column(key);
        }
        let row = self
            .columns
            .iter()
            .map(|c| map.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        self.rows.push(row);
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        self.columns.len() - 1
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use serde_json::json;

    fn mixed_outcomes() -> Vec<Outcome> {
        vec![
            Outcome::success(0, json!({"series": [{"id": "a"}, {"id": "b"}]})),
            Outcome::failure(1, FetchError::Transport("reset".into())),
            Outcome::success(2, json!({"series": [{"id": "c"}]})),
        ]
    }

    #[test]
    fn test_flatten_preserves_outcome_order() {
        let outcomes = vec![
            Outcome::success(0, json!({"series": [1, 2]})),
            Outcome::success(1, json!({"other": true})),
            Outcome::success(2, json!({"series": [3]})),
        ];
        let records = flatten_records(outcomes, "series", FailurePolicy::FailFast).unwrap();
        assert_eq!(records, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_fail_fast_reports_first_failure() {
        let err = flatten_records(mixed_outcomes(), "series", FailurePolicy::FailFast).unwrap_err();
        match err {
            Error::Fetch { index, source } => {
                assert_eq!(index, 1);
                assert_eq!(source.kind(), "transport");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_skip_failures_keeps_successes() {
        let records = flatten_records(mixed_outcomes(), "series", FailurePolicy::SkipFailures).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_all_failures_skip_to_empty() {
        let outcomes = vec![
            Outcome::failure(0, FetchError::Cancelled),
            Outcome::failure(1, FetchError::Cancelled),
        ];
        let records = flatten_records(outcomes, "series", FailurePolicy::SkipFailures).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_table_from_records_unions_columns() {
        let table = Table::from_records(&[
            json!({"series_id": "A", "name": "first"}),
            json!({"series_id": "B", "units": "MW"}),
        ]);
        assert_eq!(table.columns, vec!["series_id", "name", "units"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("units").unwrap(), vec![&Value::Null, &json!("MW")]);
    }

    #[test]
    fn test_table_from_series_data_broadcasts_metadata() {
        let meta = json!({"series_id": "PET.RWTC.A", "units": "$/bbl", "data": [], "geo": {}});
        let table = Table::from_series_data(
            &[json!(["2020", 39.2]), json!(["2021", 68.1])],
            meta.as_object().unwrap(),
        );
        assert_eq!(table.columns, vec!["period", "value", "series_id", "units"]);
        assert_eq!(table.rows[1], vec![json!("2021"), json!(68.1), json!("PET.RWTC.A"), json!("$/bbl")]);
    }

    #[test]
    fn test_concat_aligns_columns() {
        let a = Table::from_records(&[json!({"x": 1})]);
        let b = Table::from_records(&[json!({"y": 2, "x": 3})]);
        let table = Table::concat([a, b]);
        assert_eq!(table.columns, vec!["x", "y"]);
        assert_eq!(table.rows, vec![vec![json!(1), Value::Null], vec![json!(3), json!(2)]]);
    }

    #[test]
    fn test_broadcast_adds_column() {
        let mut table = Table::from_records(&[json!({"a": 1}), json!({"a": 2})]);
        table.broadcast("series_id", &json!("S"));
        assert_eq!(table.column("series_id").unwrap(), vec![&json!("S"), &json!("S")]);
    }
}
