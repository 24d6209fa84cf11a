//! Geosets: one series per region for a geoset id.

use std::sync::Arc;

use serde_json::Value;

use crate::client::EndpointClient;
use crate::error::{Error, Result};
use crate::reducer::Table;
use crate::types::Params;

use super::series::series_table;
use super::take_field;

/// A geoset for a list of regions, fetched with a single call
pub struct Geoset {
    client: Arc<dyn EndpointClient>,
}

impl Geoset {
    /// Endpoint path relative to the API host
    pub const ENDPOINT: &'static str = "geoset/";

    /// Create the query type
    pub fn new(client: Arc<dyn EndpointClient>) -> Self {
        Self { client }
    }

    /// Fetch the `geoset` object for `geoset_id` restricted to `regions`
    ///
    /// `extra` is merged into the request (e.g. `start`, `end`, `num`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] if the call fails and
    /// [`Error::UnexpectedPayload`] if the response has no geoset.
    pub async fn query<S: AsRef<str>>(
        &self,
        geoset_id: &str,
        regions: &[S],
        extra: &Params,
    ) -> Result<Value> {
        let regions = regions.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
        let mut params = Params::new()
            .with("geoset_id", geoset_id)
            .with("regions", regions);
        params.extend(extra);

        let payload = self.client.execute(&params).await.map_err(Error::Request)?;
        take_field(payload, "geoset")
    }

    /// Fetch the geoset as a table: one row per data point of every region's
    /// series, with series and geoset metadata as columns
    ///
    /// Series appear in the order the response lists them.
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub async fn query_table<S: AsRef<str>>(
        &self,
        geoset_id: &str,
        regions: &[S],
        extra: &Params,
    ) -> Result<Table> {
        let mut geoset = self.query(geoset_id, regions, extra).await?;

        let series = match geoset.get_mut("series") {
            Some(Value::Object(map)) => std::mem::take(map),
            _ => return Err(Error::UnexpectedPayload("geoset has no series map".to_string())),
        };

        let mut table = Table::concat(series.into_iter().map(|(_, record)| series_table(record)));
        if let Some(meta) = geoset.as_object() {
            for (key, value) in meta {
                if key != "series" && !value.is_array() && !value.is_object() {
                    table.broadcast(key, value);
                }
            }
        }
        Ok(table)
    }
}
