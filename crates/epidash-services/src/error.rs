//! Error types for backend calls.

use epidash_core::{NetworkError, ValidationError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    /// The backend answered 401.
    #[error("Unauthorized{}", suffix(.message))]
    Unauthorized { message: Option<String> },

    /// Any other non-success status.
    #[error("HTTP {status}{}", suffix(.message))]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// The request never completed (connect failure, timeout, ...).
    #[error(transparent)]
    Transport(#[from] NetworkError),

    /// A success response whose body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

fn suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {}", m),
        None => String::new(),
    }
}

impl HttpError {
    /// Message the backend put in the error body, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Backend message, or `fallback` when the body carried none.
    pub fn message_or(&self, fallback: &str) -> String {
        self.message().unwrap_or(fallback).to_string()
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error body returned by the backend.
///
/// Handlers answer with either `{"message": ..}` or `{"error": ..}`;
/// `message` wins when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorPayload {
    /// Extract the human-readable message from a raw error body.
    ///
    /// Returns `None` for empty, non-JSON or message-less bodies.
    pub fn parse(body: &str) -> Option<String> {
        let payload: ErrorPayload = serde_json::from_str(body).ok()?;
        payload
            .message
            .or(payload.error)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

/// Failures of the auth controller.
#[derive(Error, Debug)]
pub enum AuthFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A login attempt is already in progress")]
    LoginInFlight,

    /// The backend refused the request; carries the text to show the user.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Request(#[from] HttpError),
}

impl AuthFailure {
    /// Text for the login screen.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::LoginInFlight => "Signing in, please wait.".to_string(),
            Self::Rejected(msg) => msg.clone(),
            Self::Request(e) => e.to_string(),
        }
    }
}

/// Failures of the data and forecast flows.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Http(#[from] HttpError),

    /// A newer request replaced this one before it finished.
    #[error("Request superseded by a newer one")]
    Superseded,
}

impl ForecastError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_prefers_message_field() {
        assert_eq!(
            ErrorPayload::parse(r#"{"message": "Bad login", "error": "other"}"#).as_deref(),
            Some("Bad login")
        );
    }

    #[test]
    fn payload_falls_back_to_error_field() {
        assert_eq!(
            ErrorPayload::parse(r#"{"error": "Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
    }

    #[test]
    fn payload_without_message_is_none() {
        assert_eq!(ErrorPayload::parse(""), None);
        assert_eq!(ErrorPayload::parse("<html>502</html>"), None);
        assert_eq!(ErrorPayload::parse(r#"{"msg": "x"}"#), None);
        assert_eq!(ErrorPayload::parse(r#"{"message": "   "}"#), None);
        assert_eq!(ErrorPayload::parse(r#"[1, 2]"#), None);
    }

    #[test]
    fn message_or_applies_fallback() {
        let with = HttpError::Status {
            status: 400,
            message: Some("Неверное имя датасета".into()),
        };
        let without = HttpError::Unauthorized { message: None };
        let transport = HttpError::Transport(NetworkError::Timeout);

        assert_eq!(with.message_or("fallback"), "Неверное имя датасета");
        assert_eq!(without.message_or("Login failed"), "Login failed");
        assert_eq!(transport.message_or("Login failed"), "Login failed");
    }

    #[test]
    fn display_includes_status_and_message() {
        let err = HttpError::Status {
            status: 500,
            message: Some("boom".into()),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert_eq!(HttpError::Unauthorized { message: None }.to_string(), "Unauthorized");
        assert_eq!(err.status(), Some(500));
    }
}
