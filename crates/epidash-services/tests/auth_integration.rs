//! Integration tests for the session lifecycle across the auth controller and
//! the HTTP client, using wiremock.

use std::sync::Arc;

use epidash_auth::{Credentials, MemoryTokenStorage, SessionStatus, SessionStore, TokenStorage};
use epidash_services::{AuthController, AuthEvent, DataClient, DateRange, Dataset, HttpClient};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    storage: Arc<MemoryTokenStorage>,
    http: Arc<HttpClient>,
    auth: AuthController,
}

fn harness(server: &MockServer) -> Harness {
    let storage = Arc::new(MemoryTokenStorage::new());
    let session = Arc::new(SessionStore::new(storage.clone()));
    let http = Arc::new(HttpClient::new(&server.uri(), session).unwrap());
    let auth = AuthController::new(http.clone());
    Harness {
        storage,
        http,
        auth,
    }
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_then_authenticated_data_request() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "abc123").await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"date": "2024-01-01", "value": 5}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    h.auth
        .login(&Credentials::new("alice", "secret"))
        .await
        .unwrap();
    assert_eq!(h.storage.load().unwrap().as_deref(), Some("abc123"));

    let data = DataClient::new(h.http.clone());
    let points = data
        .fetch(
            Dataset::Covid19,
            DateRange::parse("2024-01-01", "2024-01-01").unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
}

#[tokio::test]
async fn test_concurrent_401s_clear_once_and_redirect_once() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "abc123").await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    let mut events = h.http.subscribe();
    h.auth
        .login(&Credentials::new("alice", "secret"))
        .await
        .unwrap();

    let data = DataClient::new(h.http.clone());
    let range = DateRange::parse("2024-01-01", "2024-01-10").unwrap();
    let (a, b, c) = tokio::join!(
        data.fetch(Dataset::Covid19, range),
        data.fetch(Dataset::Covid19, range),
        data.fetch(Dataset::Pneumania, range),
    );

    // Every caller still sees its own failure
    assert!(a.unwrap_err().is_unauthorized());
    assert!(b.unwrap_err().is_unauthorized());
    assert!(c.unwrap_err().is_unauthorized());

    assert_eq!(h.http.session().status(), SessionStatus::Idle);
    assert_eq!(h.storage.load().unwrap(), None);
    assert_eq!(events.try_recv().unwrap(), AuthEvent::SessionExpired);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_then_successful_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "Invalid credentials"
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_login(&mock_server, "second").await;

    let h = harness(&mock_server);

    assert!(h
        .auth
        .login(&Credentials::new("alice", "wrong"))
        .await
        .is_err());
    assert_eq!(h.http.session().status(), SessionStatus::Failed);

    h.auth
        .login(&Credentials::new("alice", "secret"))
        .await
        .unwrap();
    assert_eq!(h.http.session().status(), SessionStatus::Authenticated);
    assert_eq!(h.http.session().error(), None);
}
