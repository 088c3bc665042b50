use tracing::debug;

use crate::auth::SessionStore;

use super::{Location, DEFAULT_AUTHENTICATED_PATH, LOGIN_PATH, REDIRECT_QUERY_KEY};

/// Decision returned by a navigation guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(Location),
}

/// Guard attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    None,
    RequireAuth,
    RequireGuest,
}

impl Guard {
    pub async fn check(self, session: &SessionStore, to: &Location, from: &Location) -> Navigation {
        match self {
            Guard::None => Navigation::Proceed,
            Guard::RequireAuth => require_auth(session, to, from).await,
            Guard::RequireGuest => require_guest(session, to, from).await,
        }
    }
}

/// Load the stored session on first use and drop it if it has expired.
async fn authenticated(session: &SessionStore) -> bool {
    if session.token().is_none() {
        session.initialize();
    }
    session.check_and_enforce_expiry().await
}

/// Protected routes: unauthenticated users go to the login page, carrying
/// the intended path so they can be sent back after signing in.
pub async fn require_auth(session: &SessionStore, to: &Location, from: &Location) -> Navigation {
    if authenticated(session).await {
        return Navigation::Proceed;
    }
    debug!(to = %to, from = %from, "Not authenticated, redirecting to login");
    Navigation::Redirect(Location::with_query(LOGIN_PATH, REDIRECT_QUERY_KEY, &to.full_path()))
}

/// Guest-only routes (login, register): authenticated users go to the
/// landing page instead.
pub async fn require_guest(session: &SessionStore, to: &Location, from: &Location) -> Navigation {
    if authenticated(session).await {
        debug!(to = %to, from = %from, "Already authenticated, redirecting");
        return Navigation::Redirect(Location::parse(DEFAULT_AUTHENTICATED_PATH));
    }
    Navigation::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{authenticated_session, FakeExchange, ACCESS};
    use crate::auth::AuthToken;
    use crate::storage::{DurableStorage, MemoryStorage, TOKEN_STORAGE_KEY};
    use std::sync::Arc;

    fn anonymous_session(storage: Arc<MemoryStorage>) -> SessionStore {
        SessionStore::new(storage, Arc::new(FakeExchange::new(ACCESS)))
    }

    #[tokio::test]
    async fn test_require_auth_redirects_with_intended_path() {
        let session = anonymous_session(Arc::new(MemoryStorage::new()));
        let to = Location::parse("/management?tab=ports");

        let decision = require_auth(&session, &to, &Location::parse("/")).await;

        let Navigation::Redirect(target) = decision else {
            panic!("expected redirect, got {:?}", decision);
        };
        assert_eq!(target.path, "/login");
        assert_eq!(target.query_value("redirect"), Some("/management?tab=ports"));
    }

    #[tokio::test]
    async fn test_require_auth_initializes_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let token = AuthToken::issued_now("stored-access", "", 3600);
        storage
            .set(TOKEN_STORAGE_KEY, &serde_json::to_string(&token).unwrap())
            .unwrap();
        let session = anonymous_session(storage);
        assert!(!session.is_initialized());

        let decision = require_auth(&session, &Location::parse("/management"), &Location::parse("/")).await;

        assert_eq!(decision, Navigation::Proceed);
        assert!(session.is_initialized());
        assert_eq!(session.access_token().as_deref(), Some("stored-access"));
    }

    #[tokio::test]
    async fn test_require_guest_redirects_authenticated_users() {
        let (session, _storage, _exchange) = authenticated_session(ACCESS).await;

        let decision = require_guest(&session, &Location::parse("/login"), &Location::parse("/")).await;

        assert_eq!(decision, Navigation::Redirect(Location::parse("/management")));
    }

    #[tokio::test]
    async fn test_require_guest_lets_anonymous_through() {
        let session = anonymous_session(Arc::new(MemoryStorage::new()));
        let decision = require_guest(&session, &Location::parse("/register"), &Location::parse("/")).await;
        assert_eq!(decision, Navigation::Proceed);
    }

    #[tokio::test]
    async fn test_guard_none_always_proceeds() {
        let session = anonymous_session(Arc::new(MemoryStorage::new()));
        let to = Location::parse("/anywhere");
        assert_eq!(Guard::None.check(&session, &to, &to).await, Navigation::Proceed);
    }
}
