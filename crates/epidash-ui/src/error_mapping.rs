//! Maps service errors to epidash_core::AppError for consistent user-facing messages.

use epidash_core::{AppError, AuthError, ConfigError, NetworkError};
use epidash_services::{AuthFailure, ForecastError, HttpError};

/// Conversion into the application error type.
///
/// `AppError` and the service errors live in different crates, so the
/// mapping is a local trait rather than `From` impls.
pub trait ToAppError {
    fn to_app_error(&self) -> AppError;
}

impl ToAppError for HttpError {
    fn to_app_error(&self) -> AppError {
        match self {
            HttpError::Unauthorized { .. } => AppError::Auth(AuthError::SessionExpired),
            HttpError::Status { status, message } => AppError::Network(NetworkError::ServerError {
                status: *status,
                message: message.clone().unwrap_or_default(),
            }),
            HttpError::Transport(e) => AppError::Network(e.clone()),
            HttpError::Decode(s) => AppError::Network(NetworkError::InvalidResponse(s.clone())),
            HttpError::InvalidUrl(s) => AppError::Config(ConfigError::Invalid(s.clone())),
        }
    }
}

impl ToAppError for AuthFailure {
    fn to_app_error(&self) -> AppError {
        match self {
            AuthFailure::Validation(e) => AppError::Validation(e.clone()),
            AuthFailure::LoginInFlight => AppError::Auth(AuthError::LoginInFlight),
            AuthFailure::Rejected(msg) => AppError::Auth(AuthError::LoginRejected(msg.clone())),
            AuthFailure::Request(e) => e.to_app_error(),
        }
    }
}

impl ToAppError for ForecastError {
    fn to_app_error(&self) -> AppError {
        match self {
            ForecastError::Validation(e) => AppError::Validation(e.clone()),
            ForecastError::Http(e) => e.to_app_error(),
            ForecastError::Superseded => AppError::Service(self.to_string()),
        }
    }
}

/// Text for a failed data or forecast request.
///
/// A message sent by the backend is shown as-is; otherwise the generic
/// message for the error's category.
pub fn request_error_text(err: &ForecastError) -> String {
    if let ForecastError::Http(http) = err {
        if let Some(message) = http.message() {
            return message.to_string();
        }
    }
    err.to_app_error().user_message()
}
