use epidash_services::{DataClient, Dataset, DateRange, ForecastError, TimeSeriesPoint};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error_mapping::request_error_text;

struct DataState {
    date_from: String,
    date_to: String,
    dataset: Dataset,
    points: Vec<TimeSeriesPoint>,
    error_message: Option<String>,
    loading: bool,
    // Token of the fetch allowed to write results
    current: CancellationToken,
}

/// Historical data screen.
pub struct DataModel {
    client: DataClient,
    state: Mutex<DataState>,
}

impl DataModel {
    pub fn new(client: DataClient, dataset: Dataset) -> Self {
        Self {
            client,
            state: Mutex::new(DataState {
                date_from: String::new(),
                date_to: String::new(),
                dataset,
                points: Vec::new(),
                error_message: None,
                loading: false,
                current: CancellationToken::new(),
            }),
        }
    }

    pub fn set_date_from(&self, date: impl Into<String>) {
        self.state.lock().date_from = date.into();
    }

    pub fn set_date_to(&self, date: impl Into<String>) {
        self.state.lock().date_to = date.into();
    }

    pub fn set_dataset(&self, dataset: Dataset) {
        self.state.lock().dataset = dataset;
    }

    pub fn dataset(&self) -> Dataset {
        self.state.lock().dataset
    }

    pub fn points(&self) -> Vec<TimeSeriesPoint> {
        self.state.lock().points.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.lock().error_message.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Load the series for the current form.
    ///
    /// Dates are checked before any request. A newer call supersedes an
    /// older one still in flight; only the newest may write the chart. On
    /// failure the previous chart stays in place.
    pub async fn fetch(&self) -> Result<usize, ForecastError> {
        let (dataset, range, cancel) = {
            let mut state = self.state.lock();
            let range = match DateRange::parse(&state.date_from, &state.date_to) {
                Ok(range) => range,
                Err(e) => {
                    state.error_message = Some(e.to_string());
                    return Err(e.into());
                }
            };
            state.current.cancel();
            state.current = CancellationToken::new();
            state.loading = true;
            state.error_message = None;
            (state.dataset, range, state.current.clone())
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ForecastError::Superseded),
            result = self.client.fetch(dataset, range) => result,
        };

        let mut state = self.state.lock();
        if cancel.is_cancelled() {
            return Err(ForecastError::Superseded);
        }
        state.loading = false;
        match result {
            Ok(points) => {
                let count = points.len();
                state.points = points;
                Ok(count)
            }
            Err(e) => {
                tracing::warn!("Data request failed: {}", e);
                let err = ForecastError::Http(e);
                state.error_message = Some(request_error_text(&err));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use epidash_auth::{MemoryTokenStorage, SessionStore};
    use epidash_services::HttpClient;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model(uri: &str) -> DataModel {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryTokenStorage::with_token(
            "abc123",
        ))));
        let http = Arc::new(HttpClient::new(uri, session).unwrap());
        DataModel::new(DataClient::new(http), Dataset::Covid19)
    }

    #[tokio::test]
    async fn fetch_replaces_chart_with_response() {
        let mock_server = MockServer::start().await;
        let body = serde_json::json!([
            {"date": "2024-01-01", "value": 3},
            {"date": "2024-01-02", "value": 7}
        ]);
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("date_begin", "2024-01-01"))
            .and(query_param("date_end", "2024-01-10"))
            .and(query_param("ds_name", "covid19"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let model = model(&mock_server.uri());
        model.set_date_from("2024-01-01");
        model.set_date_to("2024-01-10");

        assert_eq!(model.fetch().await.unwrap(), 2);
        let expected: Vec<TimeSeriesPoint> = serde_json::from_value(body).unwrap();
        assert_eq!(model.points(), expected);
        assert!(!model.loading());
        assert_eq!(model.error_message(), None);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected_before_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let model = model(&mock_server.uri());
        model.set_date_from("2024-02-01");
        model.set_date_to("2024-01-01");

        let err = model.fetch().await.unwrap_err();
        assert!(matches!(err, ForecastError::Validation(_)));
        assert!(model.error_message().unwrap().starts_with("date_end"));
        assert!(!model.loading());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_chart() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("ds_name", "covid19"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"date": "2024-01-01", "value": 1}
            ])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("ds_name", "pneumania"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": "csv missing"
            })))
            .mount(&mock_server)
            .await;

        let model = model(&mock_server.uri());
        model.set_date_from("2024-01-01");
        model.set_date_to("2024-01-01");
        model.fetch().await.unwrap();

        model.set_dataset(Dataset::Pneumania);
        assert!(model.fetch().await.is_err());
        assert_eq!(model.points().len(), 1);
        assert_eq!(model.error_message().as_deref(), Some("csv missing"));
    }

    #[tokio::test]
    async fn newer_fetch_supersedes_older() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("ds_name", "covid19"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"date": "2024-01-01", "value": 1}]))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(query_param("ds_name", "pneumania"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"date": "2024-01-01", "value": 2},
                {"date": "2024-01-02", "value": 4}
            ])))
            .mount(&mock_server)
            .await;

        let model = Arc::new(model(&mock_server.uri()));
        model.set_date_from("2024-01-01");
        model.set_date_to("2024-01-02");

        let slow = {
            let model = model.clone();
            tokio::spawn(async move { model.fetch().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        model.set_dataset(Dataset::Pneumania);
        assert_eq!(model.fetch().await.unwrap(), 2);

        let older = slow.await.unwrap();
        assert!(older.unwrap_err().is_superseded());
        assert_eq!(model.points().len(), 2);
        assert_eq!(model.points()[0].value, 2.0);
    }
}
