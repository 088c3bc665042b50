//! Scripted collaborators shared by the session, interceptor and router tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::router::Navigator;
use crate::storage::MemoryStorage;

use super::{AuthError, AuthOutcome, AuthToken, CredentialExchange, Principal, Registration, SessionStore};

pub(crate) const EMAIL: &str = "ops@berrysend.com";
pub(crate) const PASSWORD: &str = "correct-horse";
pub(crate) const TAKEN_EMAIL: &str = "taken@berrysend.com";
pub(crate) const ACCESS: &str = "mock_token_access";

pub(crate) struct FakeExchange {
    access_token: String,
    holding: AtomicBool,
    parked: AtomicUsize,
    release: Notify,
    refresh_fails: AtomicBool,
    logout_fails: AtomicBool,
    current_user_unauthorized: AtomicBool,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl FakeExchange {
    pub(crate) fn new(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            holding: AtomicBool::new(false),
            parked: AtomicUsize::new(0),
            release: Notify::new(),
            refresh_fails: AtomicBool::new(false),
            logout_fails: AtomicBool::new(false),
            current_user_unauthorized: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    /// Make the next call wait until `release` is called
    pub(crate) fn hold(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    /// Number of calls that have reached the exchange while it was held
    pub(crate) fn parked(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }

    async fn wait_if_held(&self) {
        if self.holding.load(Ordering::SeqCst) {
            self.parked.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
        }
    }

    pub(crate) fn release(&self) {
        self.holding.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub(crate) fn fail_refresh(&self) {
        self.refresh_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_logout(&self) {
        self.logout_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reject_current_user(&self) {
        self.current_user_unauthorized.store(true, Ordering::SeqCst);
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    fn principal(email: &str, name: &str) -> Principal {
        Principal::new(Some("42".to_string()), email, name)
    }
}

#[async_trait]
impl CredentialExchange for FakeExchange {
    async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let call = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.wait_if_held().await;
        if email != EMAIL || password != PASSWORD {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(AuthOutcome {
            token: Some(AuthToken::issued_now(self.access_token.clone(), format!("refresh-{}", call), 3600)),
            principal: Self::principal(email, "Ops Team"),
        })
    }

    async fn register(&self, registration: &Registration) -> Result<AuthOutcome, AuthError> {
        if registration.email == TAKEN_EMAIL {
            return Err(AuthError::EmailAlreadyRegistered);
        }
        Ok(AuthOutcome {
            token: None,
            principal: Self::principal(&registration.email, &registration.name),
        })
    }

    async fn logout(&self, _access_token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected("sign-out unavailable".to_string()));
        }
        Ok(())
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<AuthToken, AuthError> {
        self.wait_if_held().await;
        if self.refresh_fails.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected("refresh rejected".to_string()));
        }
        Ok(AuthToken::issued_now("refreshed-access", "refreshed-refresh", 3600))
    }

    async fn current_user(&self, principal_id: &str) -> Result<Principal, AuthError> {
        self.wait_if_held().await;
        if self.current_user_unauthorized.load(Ordering::SeqCst) {
            return Err(AuthError::Unauthorized);
        }
        let mut principal = Principal::new(Some(principal_id.to_string()), EMAIL, "Updated Name");
        principal.role = "admin".to_string();
        Ok(principal)
    }
}

/// A session logged in through the fake exchange with the given access token.
pub(crate) async fn authenticated_session(
    access_token: &str,
) -> (Arc<SessionStore>, Arc<MemoryStorage>, Arc<FakeExchange>) {
    let storage = Arc::new(MemoryStorage::new());
    let exchange = Arc::new(FakeExchange::new(access_token));
    let session = Arc::new(SessionStore::new(storage.clone(), exchange.clone()));
    session
        .login(EMAIL, PASSWORD)
        .await
        .expect("fake login succeeds");
    (session, storage, exchange)
}

/// Navigator that records forced redirects.
pub(crate) struct RecordingNavigator {
    current: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub(crate) fn at(path: &str) -> Self {
        Self {
            current: Mutex::new(path.to_string()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    fn redirect(&self, path: &str) {
        *self.current.lock().unwrap() = path.to_string();
        self.redirects.lock().unwrap().push(path.to_string());
    }
}
