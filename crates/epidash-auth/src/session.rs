//! Session store: the single source of truth for authentication state.
//!
//! The store is an explicit object shared through `Arc`, handed to the HTTP
//! client, the auth controller and the view models. State only changes
//! through the transition methods below, and every transition into or out of
//! `Authenticated` is mirrored into the token storage.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::watch;

use crate::storage::{MemoryTokenStorage, TokenStorage};

/// Authentication status of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No session attempted, or the last session ended
    #[default]
    Idle,
    /// A login request is in flight
    Loading,
    /// A token is held
    Authenticated,
    /// The last login attempt was rejected
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the session.
///
/// `token` is `Some` exactly when `status` is `Authenticated`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub token: Option<String>,
    pub status: SessionStatus,
    pub error: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("status", &self.status)
            .field("error", &self.error)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("A login attempt is already in progress")]
    LoginInFlight,

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
}

pub struct SessionStore {
    state: RwLock<Session>,
    storage: Arc<dyn TokenStorage>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionStore {
    /// Create the store, starting `Authenticated` if `storage` already holds a token.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let session = match storage.load() {
            Ok(Some(token)) => {
                tracing::info!("Restored session token from session storage");
                Session {
                    token: Some(token),
                    status: SessionStatus::Authenticated,
                    error: None,
                }
            }
            Ok(None) => Session::default(),
            Err(e) => {
                tracing::warn!("Could not read session storage, starting signed out: {}", e);
                Session::default()
            }
        };

        let (status_tx, _) = watch::channel(session.status);

        Self {
            state: RwLock::new(session),
            storage,
            status_tx,
        }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStorage::new()))
    }

    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// `Idle | Failed | Authenticated → Loading`.
    ///
    /// Rejects re-entry while a login is already in flight. Starting a new
    /// login from `Authenticated` drops the current token.
    pub fn begin_login(&self) -> Result<(), SessionError> {
        let mut state = self.state.write();
        if state.status == SessionStatus::Loading {
            return Err(SessionError::LoginInFlight);
        }

        let had_token = state.token.take().is_some();
        state.status = SessionStatus::Loading;
        state.error = None;
        drop(state);

        if had_token {
            self.clear_persisted();
        }
        self.publish(SessionStatus::Loading);
        Ok(())
    }

    /// `Loading → Authenticated`, persisting `token`.
    pub fn complete_login(&self, token: String) -> Result<(), SessionError> {
        let mut state = self.state.write();
        if state.status != SessionStatus::Loading {
            return Err(SessionError::InvalidTransition {
                from: state.status,
                to: SessionStatus::Authenticated,
            });
        }

        if let Err(e) = self.storage.store(&token) {
            tracing::warn!("Failed to persist session token: {}", e);
        }
        state.token = Some(token);
        state.status = SessionStatus::Authenticated;
        state.error = None;
        drop(state);

        tracing::info!("Session authenticated");
        self.publish(SessionStatus::Authenticated);
        Ok(())
    }

    /// `Loading → Failed`, recording `message` for the login screen.
    pub fn fail_login(&self, message: impl Into<String>) -> Result<(), SessionError> {
        let mut state = self.state.write();
        if state.status != SessionStatus::Loading {
            return Err(SessionError::InvalidTransition {
                from: state.status,
                to: SessionStatus::Failed,
            });
        }

        state.token = None;
        state.status = SessionStatus::Failed;
        state.error = Some(message.into());
        drop(state);

        tracing::info!("Login attempt failed");
        self.publish(SessionStatus::Failed);
        Ok(())
    }

    /// Any state `→ Idle`, dropping the token and any error.
    pub fn logout(&self) {
        let mut state = self.state.write();
        state.token = None;
        state.status = SessionStatus::Idle;
        state.error = None;
        drop(state);

        // Cleared unconditionally so a stale persisted token can never survive a logout
        self.clear_persisted();
        tracing::info!("Session cleared");
        self.publish(SessionStatus::Idle);
    }

    /// `Authenticated → Idle` after the backend rejected `token`.
    ///
    /// Only clears the session if it still holds that exact token. Returns
    /// true for the single call that performed the clear, so concurrent
    /// failures of the same token report it once.
    pub fn expire(&self, token: &str) -> bool {
        let mut state = self.state.write();
        if state.status != SessionStatus::Authenticated || state.token.as_deref() != Some(token) {
            return false;
        }

        state.token = None;
        state.status = SessionStatus::Idle;
        state.error = None;
        drop(state);

        self.clear_persisted();
        tracing::warn!("Session token rejected by backend, session expired");
        self.publish(SessionStatus::Idle);
        true
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.storage.clear() {
            tracing::warn!("Failed to clear persisted session token: {}", e);
        }
    }

    fn publish(&self, status: SessionStatus) {
        self.status_tx.send_replace(status);
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.state.read())
            .finish()
    }
}
