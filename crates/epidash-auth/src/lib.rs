//! Session lifecycle for EpiDash: the session store, its token storage and
//! the credential types the login screen collects.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::{Credentials, Registration};
pub use session::{Session, SessionError, SessionStatus, SessionStore};
pub use storage::{MemoryTokenStorage, RememberedLoginStore, TokenStorage};
