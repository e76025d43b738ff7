//! Application services container.
//!
//! Builds the shared session, HTTP client and service clients from
//! [`Config`], wires the navigator to the HTTP layer's auth events and owns
//! the three screen models.

use std::sync::Arc;
use std::time::Duration;

use epidash_auth::{RememberedLoginStore, SessionStore};
use epidash_core::{AppError, Config};
use epidash_services::{AuthController, DataClient, Dataset, ForecastClient, HttpClient};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error_mapping::ToAppError;
use crate::models::{DataModel, ForecastModel, LoginModel};
use crate::router::{Decision, Navigator, Route};

pub struct AppServices {
    config: Config,
    session: Arc<SessionStore>,
    http: Arc<HttpClient>,
    auth: Arc<AuthController>,
    navigator: Arc<Navigator>,
    login: LoginModel,
    data: DataModel,
    forecast: ForecastModel,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AppServices {
    /// Build everything with a fresh in-memory session.
    ///
    /// Must be called from inside a tokio runtime; the auth event listener
    /// is spawned here.
    pub fn new(config: Config) -> Result<Self, AppError> {
        Self::with_session(config, Arc::new(SessionStore::in_memory()))
    }

    pub fn with_session(config: Config, session: Arc<SessionStore>) -> Result<Self, AppError> {
        let http = Arc::new(
            HttpClient::from_config(&config.backend, session.clone())
                .map_err(|e| e.to_app_error())?,
        );

        let auth = Arc::new(
            AuthController::new(http.clone())
                .with_remembered_login(RememberedLoginStore::new(&config.config_dir)),
        );

        let navigator = Arc::new(Navigator::new(session.clone()));
        let listener = navigator.clone().spawn_listener(http.subscribe());

        let dataset = config
            .forecast
            .default_dataset
            .parse::<Dataset>()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to {}: {}", Dataset::Covid19, e);
                Dataset::Covid19
            });

        let login = LoginModel::new(auth.clone(), navigator.clone());
        let data = DataModel::new(DataClient::new(http.clone()), dataset);
        let forecast = ForecastModel::new(ForecastClient::new(http.clone()), &config.forecast, dataset);

        tracing::info!(
            "AppServices ready (backend {}, start at {})",
            http.base_url(),
            navigator.current()
        );

        Ok(Self {
            config,
            session,
            http,
            auth,
            navigator,
            login,
            data,
            forecast,
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    pub fn login(&self) -> &LoginModel {
        &self.login
    }

    pub fn data(&self) -> &DataModel {
        &self.data
    }

    pub fn forecast(&self) -> &ForecastModel {
        &self.forecast
    }

    // =========== Header actions ===========

    pub fn show_data(&self) -> Decision {
        self.navigator.navigate(Route::Data.path())
    }

    pub fn show_forecast(&self) -> Decision {
        self.navigator.navigate(Route::Forecast.path())
    }

    /// Sign out and return to the login screen.
    ///
    /// The session is cleared even if the backend call fails; that failure
    /// is only logged.
    pub async fn logout(&self) -> Route {
        if let Err(e) = self.auth.logout().await {
            tracing::warn!("Logout: {}", e);
        }
        self.navigator.navigate(Route::Login.path()).target()
    }

    /// Current route, once any pending expiry redirect has been applied.
    ///
    /// The 401 redirect runs on the listener task, so right after a failed
    /// request the navigator can still show a protected route for a moment.
    pub async fn settle_route(&self) -> Route {
        let current = self.navigator.current();
        if self.session.is_authenticated() || current == Route::Login {
            return current;
        }

        let mut routes = self.navigator.subscribe();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(250),
            routes.wait_for(|route| *route == Route::Login),
        )
        .await
        .is_err();
        if timed_out {
            tracing::debug!("No redirect arrived for signed-out session on {}", current);
        }
        self.navigator.current()
    }

    /// Stop the auth event listener.
    pub fn shutdown(&self) {
        tracing::info!("AppServices shutdown initiated");
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}
