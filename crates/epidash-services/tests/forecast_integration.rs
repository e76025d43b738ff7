//! Integration tests for the forecast flow using wiremock.
//!
//! These tests run the two-step flow (history window, then prediction)
//! against a mock backend and check ordering, payloads and cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use epidash_auth::{MemoryTokenStorage, SessionStore};
use epidash_services::{
    AuthEvent, Dataset, ForecastClient, ForecastError, ForecastPlan, HttpClient, HttpError,
    TimeSeriesPoint,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn history(begin: NaiveDate, days: u64) -> (serde_json::Value, Vec<f64>) {
    let values: Vec<f64> = (0..days).map(|i| (i % 7) as f64).collect();
    let body = values
        .iter()
        .zip(0u64..)
        .map(|(v, i)| {
            serde_json::json!({
                "date": (begin + chrono::Days::new(i)).to_string(),
                "value": v
            })
        })
        .collect::<Vec<_>>();
    (serde_json::Value::Array(body), values)
}

fn client_for(server: &MockServer) -> (ForecastClient, Arc<HttpClient>) {
    let session = Arc::new(SessionStore::new(Arc::new(MemoryTokenStorage::with_token(
        "abc123",
    ))));
    let http = Arc::new(HttpClient::new(&server.uri(), session).unwrap());
    (ForecastClient::new(http.clone()), http)
}

#[tokio::test]
async fn test_forecast_flow_horizon_three() {
    let mock_server = MockServer::start().await;
    let today = date("2024-06-15");
    let (body, values) = history(date("2024-03-08"), 100);

    Mock::given(method("GET"))
        .and(path("/data"))
        .and(query_param("date_begin", "2024-03-08"))
        .and(query_param("date_end", "2024-06-15"))
        .and(query_param("ds_name", "covid19"))
        .and(header("Authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(query_param("date_begin", "2024-06-15"))
        .and(query_param("date_end", "2024-06-17"))
        .and(query_param("model", "covid19_model"))
        .and(body_json(serde_json::json!({ "X": values })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "forecast": [40, 42, 45]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = client_for(&mock_server);
    let plan = ForecastPlan::new(Dataset::Covid19, today, 100, 3, 31).unwrap();

    let points = client.run(&plan).await.unwrap();

    assert_eq!(
        points,
        vec![
            TimeSeriesPoint::new(date("2024-06-15"), 40.0),
            TimeSeriesPoint::new(date("2024-06-16"), 42.0),
            TimeSeriesPoint::new(date("2024-06-17"), 45.0),
        ]
    );
}

#[tokio::test]
async fn test_prediction_not_requested_when_history_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "csv missing"})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _) = client_for(&mock_server);
    let plan = ForecastPlan::new(Dataset::Pneumania, date("2024-06-15"), 100, 1, 31).unwrap();

    let err = client.run(&plan).await.unwrap_err();
    assert!(
        matches!(&err, ForecastError::Http(HttpError::Status { status: 500, .. })),
        "unexpected error: {:?}",
        err
    );
    if let ForecastError::Http(http) = &err {
        assert_eq!(http.message(), Some("csv missing"));
    }
}

#[tokio::test]
async fn test_cancelled_flow_is_superseded() {
    let mock_server = MockServer::start().await;
    let (body, _) = history(date("2024-03-08"), 100);

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "forecast": [1]
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _) = client_for(&mock_server);
    let plan = ForecastPlan::new(Dataset::Covid19, date("2024-06-15"), 100, 1, 31).unwrap();
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let result = client.run_cancellable(&plan, &cancel).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(ForecastError::Superseded)));
}

#[tokio::test]
async fn test_expired_token_mid_flow_signals_redirect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "msg": "Token has expired"
        })))
        .mount(&mock_server)
        .await;

    let (client, http) = client_for(&mock_server);
    let mut events = http.subscribe();
    let plan = ForecastPlan::new(Dataset::Covid19, date("2024-06-15"), 100, 2, 31).unwrap();

    let err = client.run(&plan).await.unwrap_err();

    assert!(matches!(
        err,
        ForecastError::Http(HttpError::Unauthorized { .. })
    ));
    assert!(!http.session().is_authenticated());
    assert_eq!(events.recv().await.unwrap(), AuthEvent::SessionExpired);
}
