use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::auth::SessionStore;

use super::{Guard, Location, Navigation, Navigator, DEFAULT_AUTHENTICATED_PATH, LOGIN_PATH, REGISTER_PATH};

/// Redirect hops allowed for a single navigation
const MAX_REDIRECTS: usize = 8;

const APP_TITLE: &str = "BerrySend";
const DEFAULT_TITLE: &str = "BerrySend - Route Optimization Platform";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    pub path: &'static str,
    pub name: &'static str,
    pub title: Option<&'static str>,
    pub guard: Guard,
    pub redirect: Option<&'static str>,
}

pub const ROUTES: &[RouteDef] = &[
    RouteDef {
        path: "/",
        name: "Root",
        title: None,
        guard: Guard::None,
        redirect: Some(DEFAULT_AUTHENTICATED_PATH),
    },
    RouteDef {
        path: DEFAULT_AUTHENTICATED_PATH,
        name: "PortManagement",
        title: Some("Port Management"),
        guard: Guard::RequireAuth,
        redirect: None,
    },
    RouteDef {
        path: LOGIN_PATH,
        name: "Login",
        title: Some("Login"),
        guard: Guard::RequireGuest,
        redirect: None,
    },
    RouteDef {
        path: REGISTER_PATH,
        name: "Register",
        title: Some("Register"),
        guard: Guard::RequireGuest,
        redirect: None,
    },
];

/// Catch-all for unknown paths
static NOT_FOUND: RouteDef = RouteDef {
    path: "*",
    name: "NotFound",
    title: None,
    guard: Guard::None,
    redirect: Some(DEFAULT_AUTHENTICATED_PATH),
};

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Too many redirects navigating to {0}")]
    RedirectLoop(String),
}

pub fn resolve(path: &str) -> &'static RouteDef {
    ROUTES.iter().find(|r| r.path == path).unwrap_or(&NOT_FOUND)
}

/// Page title for a route
pub fn page_title(route: &RouteDef) -> String {
    match route.title {
        Some(title) => format!("{} - {}", title, APP_TITLE),
        None => DEFAULT_TITLE.to_string(),
    }
}

struct RouterState {
    current: Location,
    title: String,
}

/// Client-side router: resolves redirects, runs guards, tracks the current
/// location. Also the `Navigator` the API interceptor redirects through.
pub struct Router {
    session: Arc<SessionStore>,
    state: Mutex<RouterState>,
}

impl Router {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            state: Mutex::new(RouterState {
                current: Location::parse("/"),
                title: DEFAULT_TITLE.to_string(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Location {
        self.state().current.clone()
    }

    pub fn title(&self) -> String {
        self.state().title.clone()
    }

    /// Navigate to `raw`, following route redirects and guard decisions.
    /// Returns the location that was finally entered.
    pub async fn push(&self, raw: &str) -> Result<Location, RouterError> {
        let from = self.current();
        let mut target = Location::parse(raw);

        for _ in 0..MAX_REDIRECTS {
            let route = resolve(&target.path);

            if let Some(redirect) = route.redirect {
                debug!(from = %target, to = redirect, "Route redirect");
                target = Location::parse(redirect);
                continue;
            }

            match route.guard.check(&self.session, &target, &from).await {
                Navigation::Proceed => {
                    self.enter(target.clone(), route);
                    info!(route = route.name, path = %target, "Navigated");
                    return Ok(target);
                }
                Navigation::Redirect(next) => target = next,
            }
        }

        Err(RouterError::RedirectLoop(raw.to_string()))
    }

    fn enter(&self, location: Location, route: &RouteDef) {
        let mut state = self.state();
        state.current = location;
        state.title = page_title(route);
    }
}

impl Navigator for Router {
    fn current_path(&self) -> String {
        self.state().current.path.clone()
    }

    fn redirect(&self, path: &str) {
        let location = Location::parse(path);
        let route = resolve(&location.path);
        info!(path = %location, "Forced redirect");
        self.enter(location, route);
    }
}
