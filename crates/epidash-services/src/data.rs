//! Historical case counts (`GET /data`).

use std::sync::Arc;

use tracing::instrument;

use crate::error::HttpError;
use crate::http::HttpClient;
use crate::types::{Dataset, DateRange, TimeSeriesPoint};

#[derive(Debug, Clone)]
pub struct DataClient {
    http: Arc<HttpClient>,
}

impl DataClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// Fetch the daily series for `dataset` over `range`.
    ///
    /// Points are returned exactly as the backend sent them.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(
        &self,
        dataset: Dataset,
        range: DateRange,
    ) -> Result<Vec<TimeSeriesPoint>, HttpError> {
        let [begin, end] = range.query();
        let params = [begin, end, ("ds_name", dataset.as_str().to_string())];

        let points: Vec<TimeSeriesPoint> = self.http.get_json("/data", &params).await?;
        tracing::debug!("Fetched {} points", points.len());
        Ok(points)
    }
}
