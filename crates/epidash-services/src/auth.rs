//! Auth controller: login, logout and registration against the backend.

use std::sync::Arc;

use epidash_auth::{Credentials, Registration, RememberedLoginStore, SessionError, SessionStore};
use tracing::instrument;

use crate::error::{AuthFailure, HttpError};
use crate::http::HttpClient;
use crate::types::{LoginResponse, MessageResponse};

/// Shown when a failed login carries no message of its own.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Shown when a failed registration carries no message of its own.
pub const REGISTER_FAILED_MESSAGE: &str = "Registration failed";

pub struct AuthController {
    http: Arc<HttpClient>,
    remembered: Option<RememberedLoginStore>,
}

impl AuthController {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            remembered: None,
        }
    }

    /// Remember the last successful login name in `store`.
    pub fn with_remembered_login(mut self, store: RememberedLoginStore) -> Self {
        self.remembered = Some(store);
        self
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.http.session()
    }

    /// Login name to prefill the login form with.
    pub fn remembered_login(&self) -> Option<String> {
        let store = self.remembered.as_ref()?;
        match store.load() {
            Ok(login) => login,
            Err(e) => {
                tracing::warn!("Ignoring unreadable remembered login: {}", e);
                None
            }
        }
    }

    /// Authenticate with the backend.
    ///
    /// Moves the session through `Loading` to `Authenticated` (returning the
    /// token) or `Failed` (returning the message shown to the user). Invalid
    /// input is rejected before the session or the network is touched.
    #[instrument(skip(self, credentials), fields(login = %credentials.login), level = "info")]
    pub async fn login(&self, credentials: &Credentials) -> Result<String, AuthFailure> {
        credentials.validate()?;

        let session = self.session();
        session.begin_login().map_err(|e| match e {
            SessionError::LoginInFlight => AuthFailure::LoginInFlight,
            other => AuthFailure::Rejected(other.to_string()),
        })?;

        let result: Result<LoginResponse, HttpError> =
            self.http.post_json("/login", credentials, &[]).await;

        match result {
            Ok(LoginResponse { access_token }) => {
                if let Err(e) = session.complete_login(access_token.clone()) {
                    // Session was reset (logout) while the request was in flight
                    tracing::warn!("Discarding login result: {}", e);
                    return Err(AuthFailure::Rejected(LOGIN_FAILED_MESSAGE.to_string()));
                }
                self.remember(&credentials.login);
                tracing::info!("Login succeeded");
                Ok(access_token)
            }
            Err(e) => {
                let message = match &e {
                    HttpError::Decode(_) => LOGIN_FAILED_MESSAGE.to_string(),
                    other => other.message_or(LOGIN_FAILED_MESSAGE),
                };
                tracing::warn!("Login failed: {}", e);
                if let Err(e) = session.fail_login(message.clone()) {
                    tracing::warn!("Discarding login failure: {}", e);
                }
                Err(AuthFailure::Rejected(message))
            }
        }
    }

    /// End the session.
    ///
    /// The backend call is best-effort: the local session is cleared whether
    /// or not it succeeds, and its error is returned only for reporting.
    #[instrument(skip(self), level = "info")]
    pub async fn logout(&self) -> Result<(), AuthFailure> {
        let result = if self.session().token().is_some() {
            self.http.delete("/logout").await
        } else {
            Ok(())
        };

        self.session().logout();

        result.map_err(|e| {
            tracing::warn!("Backend logout failed, session cleared locally: {}", e);
            AuthFailure::Request(e)
        })
    }

    /// Create a backend account. Does not sign in.
    #[instrument(skip(self, registration), fields(login = %registration.login), level = "info")]
    pub async fn register(&self, registration: &Registration) -> Result<String, AuthFailure> {
        registration.validate()?;

        let response: MessageResponse = self
            .http
            .post_json("/register", registration, &[])
            .await
            .map_err(|e| {
                tracing::warn!("Registration failed: {}", e);
                AuthFailure::Rejected(e.message_or(REGISTER_FAILED_MESSAGE))
            })?;

        Ok(response
            .message
            .unwrap_or_else(|| "User registered successfully".to_string()))
    }

    fn remember(&self, login: &str) {
        if let Some(store) = &self.remembered {
            if let Err(e) = store.save(login) {
                tracing::warn!("Failed to remember login name: {}", e);
            }
        }
    }
}
