//! Series search.

use std::sync::Arc;

use serde_json::Value;

use crate::client::EndpointClient;
use crate::config::Config;
use crate::error::Result;
use crate::planner::{SearchValue, clean_search_params, plan_search_pages};
use crate::reducer::{Table, flatten_pages};

use super::{BatchedEndpoint, count_at};

/// How many results to return
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowsPerPage {
    /// Every match, fetched in pages through the engine
    All,
    /// One page of results, fetched with a single call
    Page {
        /// Results per page; 0 fetches every match like [`RowsPerPage::All`]
        rows: usize,
        /// 1-based page number
        page_num: usize,
    },
}

impl Default for RowsPerPage {
    fn default() -> Self {
        RowsPerPage::Page {
            rows: 10,
            page_num: 1,
        }
    }
}

/// Series search by id, name, or last update time
pub struct Search {
    batched: BatchedEndpoint,
}

impl Search {
    /// Endpoint path relative to the API host
    pub const ENDPOINT: &'static str = "search/";

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

    /// Search and return the matching documents
    ///
    /// `term` is one of `series_id`, `name`, `last_updated`; see
    /// [`clean_search_params`] for how `value` is normalized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Planner`](crate::Error::Planner) for an invalid term
    /// or date before any request is made, [`Error::Request`](crate::Error::Request)
    /// if the probe or single page fails, and [`Error::Fetch`](crate::Error::Fetch)
    /// if a page fails under the fail-fast policy.
    pub async fn query(
        &self,
        term: &str,
        value: impl Into<SearchValue>,
        rows: RowsPerPage,
    ) -> Result<Vec<Value>> {
        let base = clean_search_params(term, &value.into())?;

        match rows {
            RowsPerPage::Page { rows, page_num } if rows > 0 => {
                let payload = self
                    .batched
                    .call(&base.clone().with("page_num", page_num).with("rows_per_page", rows))
                    .await?;
                Ok(docs(payload))
            }
            // Zero rows per page means every match
            RowsPerPage::All | RowsPerPage::Page { .. } => {
                let probe = self
                    .batched
                    .call(&base.clone().with("page_num", 1).with("rows_per_page", 1))
                    .await?;
                let total = count_at(&probe, "/response/numFound")?;

                let query = self.batched.query_config();
                let jobs = plan_search_pages(&base, total, query.search_page_size)?;
                tracing::debug!(total, pages = jobs.len(), "Fetching all search results");

                let outcomes = self.batched.run(jobs).await?;
                flatten_pages(outcomes, query.failure_policy, docs)
            }
        }
    }

    /// Search and return the documents as a table
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub async fn query_table(
        &self,
        term: &str,
        value: impl Into<SearchValue>,
        rows: RowsPerPage,
    ) -> Result<Table> {
        Ok(Table::from_records(&self.query(term, value, rows).await?))
    }

    /// Stop the engine
    pub async fn shutdown(&self) {
        self.batched.shutdown().await;
    }
}

fn docs(mut payload: Value) -> Vec<Value> {
    match payload.pointer_mut("/response/docs") {
        Some(Value::Array(docs)) => std::mem::take(docs),
        _ => Vec::new(),
    }
}
