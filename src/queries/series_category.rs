//! Categories a series belongs to.

use std::sync::Arc;

use serde_json::Value;

use crate::client::EndpointClient;
use crate::config::Config;
use crate::error::Result;
use crate::planner::{SERIES_ID_SEPARATOR, chunk_ids};
use crate::reducer::{Table, flatten_records};

use super::BatchedEndpoint;

/// Category membership for a list of series ids, chunked like [`Series`](super::Series)
pub struct SeriesCategory {
    batched: BatchedEndpoint,
}

impl SeriesCategory {
    /// Endpoint path relative to the API host
    pub const ENDPOINT: &'static str = "series/categories/";

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

    /// Fetch one `{series_id, categories}` record per series
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`](crate::Error::Fetch) if a chunk fails under
    /// the fail-fast policy.
    pub async fn query<S: AsRef<str>>(&self, series_ids: &[S]) -> Result<Vec<Value>> {
        let query = self.batched.query_config();
        let jobs = chunk_ids(series_ids, query.id_chunk_size, "series_id", SERIES_ID_SEPARATOR)?;
        let outcomes = self.batched.run(jobs).await?;
        flatten_records(outcomes, "series_categories", query.failure_policy)
    }

    /// One row per (series, category) pair, with a `series_id` column
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub async fn query_table<S: AsRef<str>>(&self, series_ids: &[S]) -> Result<Table> {
        let records = self.query(series_ids).await?;
        Ok(Table::concat(records.into_iter().map(|record| {
            let categories = record
                .get("categories")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let mut table = Table::from_records(categories);
            if let Some(series_id) = record.get("series_id") {
                table.broadcast("series_id", series_id);
            }
            table
        })))
    }

    /// Stop the engine
    pub async fn shutdown(&self) {
        self.batched.shutdown().await;
    }
}
