//! Category browsing.

use std::sync::Arc;

use serde_json::Value;

use crate::client::EndpointClient;
use crate::error::{Error, Result};
use crate::types::Params;

use super::take_field;

/// One category with its child categories and series, fetched with a single call
pub struct Category {
    client: Arc<dyn EndpointClient>,
}

impl Category {
    /// Endpoint path relative to the API host
    pub const ENDPOINT: &'static str = "category/";

    /// Create the query type
    pub fn new(client: Arc<dyn EndpointClient>) -> Self {
        Self { client }
    }

    /// Fetch the `category` object; `None` fetches the API's root category
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] if the call fails and
    /// [`Error::UnexpectedPayload`] if the response has no category.
    pub async fn query(&self, category_id: Option<u64>, extra: &Params) -> Result<Value> {
        let mut params = Params::new();
        params.insert_opt("category_id", category_id);
        params.extend(extra);

        let payload = self.client.execute(&params).await.map_err(Error::Request)?;
        take_field(payload, "category")
    }
}
