//! Credential types collected by the login screen.
//!
//! Neither type is ever persisted; `Debug` output hides the password.

use epidash_core::ValidationError;
use serde::Serialize;

const LOGIN_LEN: std::ops::RangeInclusive<usize> = 5..=32;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=32;

/// Body of `POST /login`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Both fields are required.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.login.trim().is_empty() {
            return Err(ValidationError::new("login", "is required"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::new("password", "is required"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /register`.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub login: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fio: Option<String>,
}

impl Registration {
    /// Length limits match what the backend enforces.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let login_len = self.login.chars().count();
        if !LOGIN_LEN.contains(&login_len) {
            return Err(ValidationError::new(
                "login",
                format!("must be {}-{} characters", LOGIN_LEN.start(), LOGIN_LEN.end()),
            ));
        }

        let password_len = self.password.chars().count();
        if !PASSWORD_LEN.contains(&password_len) {
            return Err(ValidationError::new(
                "password",
                format!(
                    "must be {}-{} characters",
                    PASSWORD_LEN.start(),
                    PASSWORD_LEN.end()
                ),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("fio", &self.fio)
            .finish()
    }
}
