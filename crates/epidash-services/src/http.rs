//! HTTP client adapter for the prediction backend.
//!
//! Every backend call goes through [`HttpClient::request`], which attaches
//! the session's bearer token and handles 401 centrally: the session is
//! expired and an [`AuthEvent`] is broadcast for the navigation layer. The
//! failure itself is always returned to the caller. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use epidash_auth::SessionStore;
use epidash_core::{BackendConfig, ReqwestErrorExt};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::instrument;
use url::Url;

use crate::error::{ErrorPayload, HttpError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Signals the HTTP layer emits for the navigation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// An authenticated request came back 401 and the session was cleared.
    SessionExpired,
}

pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl HttpClient {
    pub fn new(base_url: &str, session: Arc<SessionStore>) -> Result<Self, HttpError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS), session)
    }

    pub fn from_config(config: &BackendConfig, session: Arc<SessionStore>) -> Result<Self, HttpError> {
        Self::with_timeout(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
            session,
        )
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        session: Arc<SessionStore>,
    ) -> Result<Self, HttpError> {
        let parsed =
            Url::parse(base_url).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(HttpError::InvalidUrl(format!(
                "{}: unsupported scheme",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport(e.into_network_error()))?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Subscribe to authentication events (401 handling).
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Send a request and return the raw success response.
    ///
    /// The bearer token is attached only when the session holds one.
    #[instrument(skip(self, body, params), fields(base = %self.base_url), level = "debug")]
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        params: &[(&str, String)],
    ) -> Result<Response, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self.client.request(method.clone(), &url);
        if !params.is_empty() {
            builder = builder.query(params);
        }

        let token = self.session.token();
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("{} {} failed: {}", method, path, e);
            HttpError::Transport(e.into_network_error())
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("{} {} -> {}", method, path, status);
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = ErrorPayload::parse(&text);

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("{} {} -> 401", method, path);
            if let Some(token) = token {
                if self.session.expire(&token) {
                    // No receivers just means nothing is navigating right now
                    let _ = self.events.send(AuthEvent::SessionExpired);
                }
            }
            return Err(HttpError::Unauthorized { message });
        }

        tracing::warn!("{} {} -> {}", method, path, status);
        Err(HttpError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// `GET path?params`, decoding a JSON body.
    pub async fn get_json<T>(&self, path: &str, params: &[(&str, String)]) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let response = self.request::<()>(Method::GET, path, None, params).await?;
        decode(response).await
    }

    /// `POST path?params` with a JSON body, decoding a JSON response.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        params: &[(&str, String)],
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::POST, path, Some(body), params).await?;
        decode(response).await
    }

    /// `DELETE path`, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<(), HttpError> {
        self.request::<()>(Method::DELETE, path, None, &[]).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, HttpError> {
    response
        .json()
        .await
        .map_err(|e| HttpError::Decode(e.to_string()))
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
