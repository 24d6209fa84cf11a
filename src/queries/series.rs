//! Series data by id.

use std::sync::Arc;

use serde_json::Value;

use crate::client::EndpointClient;
use crate::config::Config;
use crate::error::Result;
use crate::planner::{SERIES_ID_SEPARATOR, chunk_ids};
use crate::reducer::{Table, flatten_records};

use super::BatchedEndpoint;

/// Series data for a list of series ids
///
/// Ids are sent in chunks (100 per request by default) through the fetch
/// engine; the result is every returned series, in id order.
pub struct Series {
    batched: BatchedEndpoint,
}

impl Series {
    /// Endpoint path relative to the API host
    pub const ENDPOINT: &'static str = "series/";

    /// Create the query type and start its engine
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for an invalid engine configuration.
    pub fn new(config: &Config, client: Arc<dyn EndpointClient>) -> Result<Self> {
        Ok(Self {
            batched: BatchedEndpoint::new(config, client)?,
        })
    }

    /// Fetch the series records (each with its `data` array) for `series_ids`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`](crate::Error::Fetch) if a chunk fails under
    /// the fail-fast policy.
    pub async fn query<S: AsRef<str>>(&self, series_ids: &[S]) -> Result<Vec<Value>> {
        let query = self.batched.query_config();
        let jobs = chunk_ids(series_ids, query.id_chunk_size, "series_id", SERIES_ID_SEPARATOR)?;
        tracing::debug!(ids = series_ids.len(), jobs = jobs.len(), "Querying series");
        let outcomes = self.batched.run(jobs).await?;
        flatten_records(outcomes, "series", query.failure_policy)
    }

    /// Fetch the series as one table of `period`, `value` plus each series' metadata
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub async fn query_table<S: AsRef<str>>(&self, series_ids: &[S]) -> Result<Table> {
        let records = self.query(series_ids).await?;
        Ok(Table::concat(records.into_iter().map(series_table)))
    }

    /// Stop the engine
    pub async fn shutdown(&self) {
        self.batched.shutdown().await;
    }
}

/// One series record as a table, metadata broadcast over its data points
pub(crate) fn series_table(mut record: Value) -> Table {
    let data = match record.get_mut("data") {
        Some(Value::Array(points)) => std::mem::take(points),
        _ => Vec::new(),
    };
    match record.as_object() {
        Some(meta) => Table::from_series_data(&data, meta),
        None => Table::new(),
    }
}
