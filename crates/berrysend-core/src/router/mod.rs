//! Client-side routing with auth-gated routes.
//!
//! - `Location`: path plus query, with the `redirect` parameter used after login
//! - `require_auth` / `require_guest`: navigation guards consulting the session
//! - `Router`: route table, redirects, page titles and the current location
//! - `Navigator`: the seam the API interceptor uses to force a redirect

pub mod guard;
pub mod location;
pub mod routes;

pub use guard::{require_auth, require_guest, Guard, Navigation};
pub use location::Location;
pub use routes::{page_title, resolve, RouteDef, Router, RouterError, ROUTES};

/// Login entry point, also the target of forced logouts
pub const LOGIN_PATH: &str = "/login";

pub const REGISTER_PATH: &str = "/register";

/// Landing route for authenticated users
pub const DEFAULT_AUTHENTICATED_PATH: &str = "/management";

/// Pages reachable without a session. A 401 seen on one of these does not
/// trigger another redirect.
pub const GUEST_PATHS: &[&str] = &[LOGIN_PATH, REGISTER_PATH];

/// Query parameter carrying the originally requested path
pub const REDIRECT_QUERY_KEY: &str = "redirect";

/// Where the application currently is, and how to force it elsewhere.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    /// Move to `path` without running guards
    fn redirect(&self, path: &str);
}
