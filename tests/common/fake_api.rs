//! In-process stand-in for the series endpoint

use async_trait::async_trait;
use eia_fetch::{EndpointClient, FetchError, Params};
use rand::Rng;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Series id that makes its whole chunk fail with a 400
pub const BAD_SERIES_ID: &str = "BAD.SERIES";

/// Answers `series_id=A;B;...` requests with one record per id after a random delay
#[derive(Default)]
pub struct FakeSeriesApi {
    /// Number of requests served (including failures)
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    /// Highest number of requests seen executing at once
    pub max_in_flight: AtomicUsize,
}

impl FakeSeriesApi {
    /// Record served for one series id
    pub fn record(series_id: &str) -> Value {
        json!({
            "series_id": series_id,
            "units": "Thousand Barrels",
            "f": "A",
            "data": [["2020", 1.5], ["2019", 1.25]],
        })
    }
}

#[async_trait]
impl EndpointClient for FakeSeriesApi {
    async fn execute(&self, params: &Params) -> Result<Value, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = rand::thread_rng().gen_range(1..15);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let ids: Vec<&str> = params
            .get("series_id")
            .map(|joined| joined.split(';').collect())
            .unwrap_or_default();
        if ids.contains(&BAD_SERIES_ID) {
            return Err(FetchError::Response {
                status: 400,
                message: format!("invalid series_id {BAD_SERIES_ID}"),
            });
        }

        let series: Vec<Value> = ids.into_iter().map(Self::record).collect();
        Ok(json!({ "series": series }))
    }
}

/// `n` distinct series ids
pub fn series_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("PET.SERIES{i:04}.A")).collect()
}
