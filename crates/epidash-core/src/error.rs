//! Centralized error types for the EpiDash application.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Service crates keep their own error enums; the UI layer maps them into
/// this type. Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Service-level errors that have no finer classification.
    #[error("Service error: {0}")]
    Service(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    ///
    /// Validation and login failures carry their own text since that text is
    /// what the user has to act on; everything else maps to a fixed message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(e) => e.user_message().to_string(),
            AppError::Auth(e) => e.user_message(),
            AppError::Config(e) => e.user_message().to_string(),
            AppError::Storage(e) => e.user_message().to_string(),
            AppError::Validation(e) => e.to_string(),
            AppError::Io(_) => "A file operation failed. Please try again.".to_string(),
            AppError::Service(_) => "Something went wrong. Please try again.".to_string(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to reach the forecast server. Check your connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request was rejected by the server.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Authentication errors (login, session tokens).
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected a login attempt.
    #[error("Login rejected: {0}")]
    LoginRejected(String),

    /// A request carrying a token came back 401.
    #[error("Session expired")]
    SessionExpired,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("A login attempt is already in progress")]
    LoginInFlight,
}

impl AuthError {
    pub fn user_message(&self) -> String {
        match self {
            AuthError::LoginRejected(msg) => msg.clone(),
            AuthError::SessionExpired => "Your session has expired. Please sign in again.".into(),
            AuthError::NotAuthenticated => "Not signed in. Please sign in first.".into(),
            AuthError::LoginInFlight => "Signing in, please wait.".into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Local persistence errors (token and remembered-login storage).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {0}")]
    ReadFailed(String),

    #[error("Failed to write {0}")]
    WriteFailed(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::ReadFailed(_) => "Saved settings could not be read.",
            StorageError::WriteFailed(_) => "Settings could not be saved.",
        }
    }
}

/// Malformed form input, rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
