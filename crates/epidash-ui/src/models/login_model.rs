use std::sync::Arc;

use epidash_auth::{Credentials, Registration, SessionStatus};
use epidash_core::{AppError, AuthError};
use epidash_services::AuthController;
use parking_lot::Mutex;

use crate::error_mapping::ToAppError;
use crate::router::{Navigator, Route};

#[derive(Default)]
struct LoginForm {
    login: String,
    password: String,
    error_message: Option<String>,
}

/// Login screen.
pub struct LoginModel {
    auth: Arc<AuthController>,
    navigator: Arc<Navigator>,
    form: Mutex<LoginForm>,
}

impl LoginModel {
    /// The login field starts with the last name that signed in successfully.
    pub fn new(auth: Arc<AuthController>, navigator: Arc<Navigator>) -> Self {
        let form = LoginForm {
            login: auth.remembered_login().unwrap_or_default(),
            ..LoginForm::default()
        };
        Self {
            auth,
            navigator,
            form: Mutex::new(form),
        }
    }

    pub fn login(&self) -> String {
        self.form.lock().login.clone()
    }

    pub fn set_login(&self, login: impl Into<String>) {
        self.form.lock().login = login.into();
    }

    pub fn set_password(&self, password: impl Into<String>) {
        self.form.lock().password = password.into();
    }

    pub fn error_message(&self) -> Option<String> {
        self.form.lock().error_message.clone()
    }

    pub fn loading(&self) -> bool {
        self.auth.session().status() == SessionStatus::Loading
    }

    /// Sign in with the current form contents.
    ///
    /// Does nothing while a login is already running. On success the
    /// password is cleared and the navigator moves to the data view.
    pub async fn submit(&self) -> Result<Route, AppError> {
        if self.loading() {
            tracing::debug!("Ignoring login submit while signing in");
            return Err(AppError::Auth(AuthError::LoginInFlight));
        }

        let credentials = {
            let form = self.form.lock();
            Credentials::new(form.login.trim(), form.password.clone())
        };

        match self.auth.login(&credentials).await {
            Ok(_) => {
                {
                    let mut form = self.form.lock();
                    form.password.clear();
                    form.error_message = None;
                }
                Ok(self.navigator.navigate(Route::Data.path()).target())
            }
            Err(e) => {
                let err = e.to_app_error();
                self.form.lock().error_message = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Create an account with the current form contents.
    ///
    /// Returns the backend's confirmation; the session is left as it was.
    pub async fn register(&self, fio: Option<String>) -> Result<String, AppError> {
        let registration = {
            let form = self.form.lock();
            Registration {
                login: form.login.trim().to_string(),
                password: form.password.clone(),
                fio: fio.filter(|f| !f.trim().is_empty()),
            }
        };

        match self.auth.register(&registration).await {
            Ok(message) => {
                self.form.lock().error_message = None;
                Ok(message)
            }
            Err(e) => {
                let err = e.to_app_error();
                self.form.lock().error_message = Some(err.user_message());
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for LoginModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let form = self.form.lock();
        f.debug_struct("LoginModel")
            .field("login", &form.login)
            .field("password", &"<redacted>")
            .field("error_message", &form.error_message)
            .finish()
    }
}
