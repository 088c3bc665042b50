use std::sync::{Arc, Weak};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, StatusCode};
use tracing::{debug, info};

use crate::auth::SessionStore;
use crate::router::{Navigator, GUEST_PATHS, LOGIN_PATH};

use super::ApiError;

/// Attaches the session's bearer credential to outbound requests and turns
/// a 401 into a forced logout plus a redirect to the login page.
///
/// Holds weak references: the session reaches the API client through its
/// credential exchange, and the client owns this interceptor.
pub struct AuthInterceptor {
    session: Weak<SessionStore>,
    navigator: Weak<dyn Navigator>,
}

impl AuthInterceptor {
    pub fn new<N: Navigator + 'static>(session: &Arc<SessionStore>, navigator: &Arc<N>) -> Self {
        let navigator: Weak<dyn Navigator> = Arc::downgrade(navigator) as Weak<dyn Navigator>;
        Self {
            session: Arc::downgrade(session),
            navigator,
        }
    }

    /// Outbound phase: set `Authorization: Bearer <token>` when a token exists.
    pub fn on_request(&self, request: &mut Request) -> Result<(), ApiError> {
        let Some(session) = self.session.upgrade() else {
            return Ok(());
        };
        if let Some(token) = session.token() {
            if !token.access_token.is_empty() {
                let value = HeaderValue::from_str(&token.authorization_value())?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }
        Ok(())
    }

    /// Inbound phase. Returns `true` when the response forced a logout.
    pub async fn on_response(&self, status: StatusCode) -> bool {
        if status != StatusCode::UNAUTHORIZED {
            return false;
        }

        let Some(navigator) = self.navigator.upgrade() else {
            return false;
        };
        let current_path = navigator.current_path();
        if GUEST_PATHS.contains(&current_path.as_str()) {
            debug!(path = %current_path, "401 on an auth page, not redirecting");
            return false;
        }

        info!(path = %current_path, "Authorization failure, forcing logout");
        if let Some(session) = self.session.upgrade() {
            session.logout().await;
        }
        navigator.redirect(LOGIN_PATH);
        true
    }
}
