//! Route guard and navigator.
//!
//! `RouteGuard::resolve` is a pure function of authentication state and the
//! requested path. `Navigator` owns the current route, applies the guard on
//! every navigation and reacts to `AuthEvent`s from the HTTP layer.

use std::sync::Arc;

use epidash_auth::SessionStore;
use epidash_services::AuthEvent;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Data,
    Forecast,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Data => "/data",
            Route::Forecast => "/forecast",
        }
    }

    /// Match a path, ignoring any query string and trailing slash.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        match path {
            "/login" => Some(Route::Login),
            "/data" => Some(Route::Data),
            "/forecast" => Some(Route::Forecast),
            _ => None,
        }
    }

    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Route),
    Redirect(Route),
}

impl Decision {
    /// Route the user ends up on
    pub fn target(self) -> Route {
        match self {
            Decision::Allow(route) | Decision::Redirect(route) => route,
        }
    }
}

pub struct RouteGuard;

impl RouteGuard {
    /// Default view for signed-in users
    pub const HOME: Route = Route::Data;

    pub fn resolve(authenticated: bool, path: &str) -> Decision {
        match (authenticated, Route::from_path(path)) {
            (false, Some(Route::Login)) => Decision::Allow(Route::Login),
            (false, _) => Decision::Redirect(Route::Login),
            (true, Some(route)) if route.is_protected() => Decision::Allow(route),
            (true, _) => Decision::Redirect(Self::HOME),
        }
    }
}

pub struct Navigator {
    session: Arc<SessionStore>,
    current: Mutex<Route>,
    route_tx: watch::Sender<Route>,
}

impl Navigator {
    /// Start on whatever the guard allows for `/`.
    pub fn new(session: Arc<SessionStore>) -> Self {
        let start = RouteGuard::resolve(session.is_authenticated(), "/").target();
        let (route_tx, _) = watch::channel(start);
        Self {
            session,
            current: Mutex::new(start),
            route_tx,
        }
    }

    pub fn current(&self) -> Route {
        *self.current.lock()
    }

    /// Watch route changes.
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.route_tx.subscribe()
    }

    /// Navigate to `path`, landing wherever the guard sends us.
    pub fn navigate(&self, path: &str) -> Decision {
        let decision = RouteGuard::resolve(self.session.is_authenticated(), path);
        if let Decision::Redirect(to) = decision {
            tracing::debug!("Redirecting {} -> {}", path, to);
        }
        self.set(decision.target());
        decision
    }

    /// React to a signal from the HTTP layer.
    ///
    /// An expiry that arrives after the user has signed in again is stale
    /// and leaves the current route alone.
    pub fn handle_event(&self, event: AuthEvent) -> Route {
        match event {
            AuthEvent::SessionExpired => {
                if self.session.is_authenticated() {
                    tracing::debug!("Ignoring stale session expiry");
                    return self.current();
                }
                tracing::info!("Session expired, redirecting to {}", Route::Login);
                self.navigate(Route::Login.path()).target()
            }
        }
    }

    /// Consume auth events until the sender goes away.
    pub fn spawn_listener(self: Arc<Self>, mut events: broadcast::Receiver<AuthEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.handle_event(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Navigator missed {} auth events", skipped);
                        // Anything missed can only have been an expiry
                        self.handle_event(AuthEvent::SessionExpired);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn set(&self, route: Route) {
        *self.current.lock() = route;
        self.route_tx.send_replace(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epidash_auth::MemoryTokenStorage;

    #[test]
    fn unauthenticated_users_are_sent_to_login() {
        assert_eq!(
            RouteGuard::resolve(false, "/data"),
            Decision::Redirect(Route::Login)
        );
        assert_eq!(
            RouteGuard::resolve(false, "/forecast"),
            Decision::Redirect(Route::Login)
        );
        assert_eq!(
            RouteGuard::resolve(false, "/nowhere"),
            Decision::Redirect(Route::Login)
        );
        assert_eq!(RouteGuard::resolve(false, "/login"), Decision::Allow(Route::Login));
    }

    #[test]
    fn authenticated_users_skip_login_and_unknown_paths() {
        assert_eq!(RouteGuard::resolve(true, "/login"), Decision::Redirect(Route::Data));
        assert_eq!(RouteGuard::resolve(true, "/"), Decision::Redirect(Route::Data));
        assert_eq!(RouteGuard::resolve(true, "/admin"), Decision::Redirect(Route::Data));
        assert_eq!(RouteGuard::resolve(true, "/data"), Decision::Allow(Route::Data));
        assert_eq!(
            RouteGuard::resolve(true, "/forecast"),
            Decision::Allow(Route::Forecast)
        );
    }

    #[test]
    fn paths_ignore_query_and_trailing_slash() {
        assert_eq!(Route::from_path("/data/"), Some(Route::Data));
        assert_eq!(Route::from_path("/forecast?horizon=3"), Some(Route::Forecast));
        assert_eq!(Route::from_path("/datax"), None);
        assert_eq!(Route::from_path(""), None);
    }

    #[test]
    fn navigator_starts_according_to_session() {
        let signed_out = Navigator::new(Arc::new(SessionStore::in_memory()));
        assert_eq!(signed_out.current(), Route::Login);

        let signed_in = Navigator::new(Arc::new(SessionStore::new(Arc::new(
            MemoryTokenStorage::with_token("t"),
        ))));
        assert_eq!(signed_in.current(), Route::Data);
    }

    #[test]
    fn navigator_applies_guard() {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryTokenStorage::with_token("t"))));
        let nav = Navigator::new(session.clone());

        assert_eq!(nav.navigate("/forecast"), Decision::Allow(Route::Forecast));
        assert_eq!(nav.current(), Route::Forecast);

        session.logout();
        assert_eq!(nav.navigate("/data"), Decision::Redirect(Route::Login));
        assert_eq!(nav.current(), Route::Login);
    }

    #[tokio::test]
    async fn listener_redirects_on_session_expiry() {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryTokenStorage::with_token("t"))));
        let nav = Arc::new(Navigator::new(session.clone()));
        nav.navigate("/forecast");
        let mut routes = nav.subscribe();
        assert!(session.expire("t"));

        let (tx, rx) = broadcast::channel(4);
        let handle = nav.clone().spawn_listener(rx);

        tx.send(AuthEvent::SessionExpired).unwrap();
        routes.changed().await.unwrap();
        assert_eq!(*routes.borrow(), Route::Login);

        drop(tx);
        handle.await.unwrap();
        assert_eq!(nav.current(), Route::Login);
    }

    #[test]
    fn stale_expiry_after_relogin_keeps_route() {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryTokenStorage::with_token("old"))));
        let nav = Navigator::new(session.clone());
        nav.navigate("/forecast");

        assert!(session.expire("old"));
        session.begin_login().unwrap();
        session.complete_login("fresh".into()).unwrap();

        assert_eq!(nav.handle_event(AuthEvent::SessionExpired), Route::Forecast);
        let current = nav.current();
        assert_eq!(
            current,
            RouteGuard::resolve(session.is_authenticated(), current.path()).target()
        );
    }

    #[tokio::test]
    async fn lagged_listener_still_redirects() {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryTokenStorage::with_token("t"))));
        let nav = Arc::new(Navigator::new(session.clone()));
        nav.navigate("/data");
        assert!(session.expire("t"));

        // Capacity 1 and two sends: the listener's first recv reports a lag
        let (tx, rx) = broadcast::channel(1);
        tx.send(AuthEvent::SessionExpired).unwrap();
        tx.send(AuthEvent::SessionExpired).unwrap();

        let mut routes = nav.subscribe();
        let handle = nav.clone().spawn_listener(rx);
        routes.wait_for(|r| *r == Route::Login).await.unwrap();

        drop(tx);
        handle.await.unwrap();
        assert_eq!(nav.current(), Route::Login);
    }
}
