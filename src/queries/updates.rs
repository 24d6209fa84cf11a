//! Recently updated series, paged by rows.

use std::sync::Arc;

use serde_json::Value;

use crate::client::EndpointClient;
use crate::config::Config;
use crate::error::Result;
use crate::planner::plan_row_pages;
use crate::reducer::{Table, flatten_records};
use crate::types::Params;

use super::{BatchedEndpoint, count_at};

/// Rows fetched when the caller does not ask for a limit
pub const DEFAULT_UPDATE_ROWS: usize = 50;

/// Parameters of an updates query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdatesRequest {
    /// Restrict to one category (None = all)
    pub category_id: Option<u64>,
    /// Maximum number of rows (default: 50); `None` or `Some(0)` fetches
    /// everything available
    pub rows: Option<usize>,
    /// Include child categories
    pub deep: bool,
}

impl Default for UpdatesRequest {
    fn default() -> Self {
        Self {
            category_id: None,
            rows: Some(DEFAULT_UPDATE_ROWS),
            deep: false,
        }
    }
}

/// Series updates
///
/// A one-row probe reads how many rows are available; the rows are then
/// fetched in pages (10,000 by default) through the fetch engine.
pub struct Updates {
    batched: BatchedEndpoint,
}

impl Updates {
    /// Endpoint path relative to the API host
    pub const ENDPOINT: &'static str = "updates/";

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

    /// Fetch update records
    ///
    /// The requested row limit is clipped to the rows the probe reports; no
    /// limit (or a limit of zero) fetches every available row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`](crate::Error::Request) if the probe fails,
    /// [`Error::UnexpectedPayload`](crate::Error::UnexpectedPayload) if it has
    /// no row count, and [`Error::Fetch`](crate::Error::Fetch) if a page fails
    /// under the fail-fast policy.
    pub async fn query(&self, request: &UpdatesRequest) -> Result<Vec<Value>> {
        let mut base = Params::new().with("deep", request.deep);
        base.insert_opt("category_id", request.category_id);

        let probe = self
            .batched
            .call(&base.clone().with("rows", 1).with("firstrow", 0))
            .await?;
        let available = count_at(&probe, "/data/rows_available")?;
        let total = match request.rows {
            Some(rows) if rows > 0 => rows.min(available),
            _ => available,
        };

        let query = self.batched.query_config();
        let jobs = plan_row_pages(&base, total, query.row_page_size)?;
        tracing::debug!(available, total, pages = jobs.len(), "Querying updates");

        let outcomes = self.batched.run(jobs).await?;
        flatten_records(outcomes, "updates", query.failure_policy)
    }

    /// Fetch update records as a table
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub async fn query_table(&self, request: &UpdatesRequest) -> Result<Table> {
        Ok(Table::from_records(&self.query(request).await?))
    }

    /// Stop the engine
    pub async fn shutdown(&self) {
        self.batched.shutdown().await;
    }
}
