use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::storage::{DurableStorage, StorageError, TOKEN_STORAGE_KEY, USER_STORAGE_KEY};

use super::principal::DEFAULT_ROLE;
use super::{AuthError, AuthOutcome, AuthToken, CredentialExchange, OperationKind, Principal, Registration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    /// Last credential exchange failed; carries the message shown to the user
    Error(String),
}

/// Token and principal currently held by the client
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub token: Option<AuthToken>,
    pub principal: Option<Principal>,
}

#[derive(Debug)]
struct Inner {
    data: SessionData,
    state: SessionState,
    last_error: Option<String>,
    loading: bool,
    initialized: bool,
}

/// Single source of truth for whether this client is authenticated.
///
/// The in-memory session is authoritative; durable storage is a mirror that
/// is read once by `initialize`. Shared as `Arc<SessionStore>` between the
/// router, the API interceptor and the front end.
///
/// The inner lock is never held across an `.await`: every transition
/// completes before the task yields.
pub struct SessionStore {
    storage: Arc<dyn DurableStorage>,
    exchange: Arc<dyn CredentialExchange>,
    inner: Mutex<Inner>,
    authenticate_flight: tokio::sync::Mutex<()>,
    refresh_flight: tokio::sync::Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn DurableStorage>, exchange: Arc<dyn CredentialExchange>) -> Self {
        Self {
            storage,
            exchange,
            inner: Mutex::new(Inner {
                data: SessionData::default(),
                state: SessionState::Anonymous,
                last_error: None,
                loading: false,
                initialized: false,
            }),
            authenticate_flight: tokio::sync::Mutex::new(()),
            refresh_flight: tokio::sync::Mutex::new(()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Restore the session from durable storage. Runs once; later calls are
    /// no-ops. Expired or corrupt entries are cleared, never fatal.
    pub fn initialize(&self) {
        let mut inner = self.inner();
        if inner.initialized {
            return;
        }
        inner.initialized = true;

        let (token, principal) = match self.read_storage() {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Error initializing session from storage");
                drop(inner);
                self.clear_storage();
                return;
            }
        };

        let Some(token) = token else {
            if principal.is_some() {
                debug!("Stored user without a token, discarding");
                drop(inner);
                self.clear_storage();
            }
            return;
        };

        if token.is_expired() {
            info!("Stored token expired, starting anonymous");
            drop(inner);
            self.clear_storage();
            return;
        }

        debug!(has_principal = principal.is_some(), "Session restored from storage");
        inner.data = SessionData {
            token: Some(token),
            principal,
        };
        inner.state = SessionState::Authenticated;
    }

    fn read_storage(&self) -> Result<(Option<AuthToken>, Option<Principal>), StorageError> {
        let token = match self.storage.get(TOKEN_STORAGE_KEY)? {
            Some(raw) => Some(serde_json::from_str::<AuthToken>(&raw)?),
            None => None,
        };
        let principal = match self.storage.get(USER_STORAGE_KEY)? {
            Some(raw) => Some(serde_json::from_str::<Principal>(&raw)?),
            None => None,
        };
        Ok((token, principal))
    }

    pub fn is_initialized(&self) -> bool {
        self.inner().initialized
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Token present and not expired. Never mutates; call
    /// `check_and_enforce_expiry` to act on an expired token.
    pub fn is_authenticated(&self) -> bool {
        self.inner()
            .data
            .token
            .as_ref()
            .map(|t| !t.is_expired())
            .unwrap_or(false)
    }

    /// Log out if the held token has expired. Returns whether the session is
    /// still authenticated afterwards.
    pub async fn check_and_enforce_expiry(&self) -> bool {
        let expired = match self.inner().data.token {
            Some(ref token) => token.is_expired(),
            None => return false,
        };
        if expired {
            info!("Session token expired, logging out");
            self.logout().await;
            return false;
        }
        true
    }

    pub fn token(&self) -> Option<AuthToken> {
        self.inner().data.token.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner().data.token.as_ref().map(|t| t.access_token.clone())
    }

    pub fn principal(&self) -> Option<Principal> {
        self.inner().data.principal.clone()
    }

    pub fn data(&self) -> SessionData {
        self.inner().data.clone()
    }

    pub fn user_role(&self) -> String {
        self.inner()
            .data
            .principal
            .as_ref()
            .map(|p| p.role.clone())
            .filter(|role| !role.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string())
    }

    pub fn state(&self) -> SessionState {
        self.inner().state.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.inner().last_error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.inner().loading
    }

    // =========================================================================
    // Credential exchange
    // =========================================================================

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let _flight = self.enter(OperationKind::Authenticate)?;
        self.begin_authenticating();

        let result = self.exchange.login(email, password).await;
        self.finish_authenticating(result)
    }

    pub async fn register(&self, registration: &Registration) -> Result<AuthOutcome, AuthError> {
        let _flight = self.enter(OperationKind::Authenticate)?;
        self.begin_authenticating();

        let result = self.exchange.register(registration).await;
        self.finish_authenticating(result)
    }

    /// Single-flight entry: a second operation of the same kind is rejected
    /// while the first is unresolved.
    fn enter(&self, kind: OperationKind) -> Result<tokio::sync::MutexGuard<'_, ()>, AuthError> {
        let flight = match kind {
            OperationKind::Authenticate => &self.authenticate_flight,
            OperationKind::Refresh => &self.refresh_flight,
        };
        flight.try_lock().map_err(|_| {
            warn!(%kind, "Rejecting concurrent operation");
            AuthError::InFlight(kind)
        })
    }

    fn begin_authenticating(&self) {
        let mut inner = self.inner();
        inner.state = SessionState::Authenticating;
        inner.loading = true;
        inner.last_error = None;
    }

    fn finish_authenticating(
        &self,
        result: Result<AuthOutcome, AuthError>,
    ) -> Result<AuthOutcome, AuthError> {
        let mut inner = self.inner();
        inner.loading = false;

        match result {
            Ok(outcome) => {
                match outcome.token {
                    Some(ref token) => {
                        inner.data = SessionData {
                            token: Some(token.clone()),
                            principal: Some(outcome.principal.clone()),
                        };
                        inner.state = SessionState::Authenticated;
                        info!(user = %outcome.principal.email, "Authenticated");
                    }
                    None => {
                        // Registered but not signed in
                        inner.data = SessionData::default();
                        inner.state = SessionState::Anonymous;
                        info!(user = %outcome.principal.email, "Registered, login required");
                    }
                }
                drop(inner);
                if outcome.token.is_some() {
                    self.save_to_storage();
                } else {
                    self.clear_storage();
                }
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Credential exchange failed");
                inner.last_error = Some(message.clone());
                inner.state = if inner.data.token.is_some() {
                    SessionState::Authenticated
                } else {
                    SessionState::Error(message)
                };
                Err(e)
            }
        }
    }

    /// Clear the session. Local state and storage are always cleared before
    /// the remote sign-out is attempted; a failed sign-out is only logged.
    pub async fn logout(&self) {
        let access_token = {
            let mut inner = self.inner();
            let token = inner.data.token.take();
            inner.data = SessionData::default();
            inner.state = SessionState::Anonymous;
            inner.last_error = None;
            inner.loading = false;
            token.map(|t| t.access_token)
        };
        self.clear_storage();

        if let Some(access_token) = access_token.filter(|t| !t.is_empty()) {
            if let Err(e) = self.exchange.logout(&access_token).await {
                warn!(error = %e, "Error during remote logout");
            }
        }
        info!("Logged out");
    }

    /// Replace the token using the refresh token. Any failure forces a
    /// logout before the error is returned. A result that arrives after the
    /// session was logged out or replaced is discarded.
    pub async fn refresh_token(&self) -> Result<AuthToken, AuthError> {
        let _flight = self.enter(OperationKind::Refresh)?;

        let sent = self
            .inner()
            .data
            .token
            .clone()
            .filter(|t| !t.refresh_token.is_empty())
            .ok_or(AuthError::NoRefreshToken)?;

        let result = self.exchange.refresh_token(&sent.refresh_token).await;

        let result = {
            let mut inner = self.inner();
            if inner.data.token.as_ref() != Some(&sent) {
                debug!("Session changed during refresh, discarding result");
                return Err(AuthError::SessionChanged);
            }
            if let Ok(ref token) = result {
                inner.data.token = Some(token.clone());
                inner.state = SessionState::Authenticated;
            }
            result
        };

        match result {
            Ok(token) => {
                self.save_to_storage();
                debug!("Token refreshed");
                Ok(token)
            }
            Err(e) => {
                error!(error = %e, "Error refreshing token");
                self.logout().await;
                Err(e)
            }
        }
    }

    /// Re-fetch the principal for the current session. A result that
    /// arrives after the session was logged out or replaced is discarded.
    pub async fn fetch_current_user(&self) -> Result<Principal, AuthError> {
        let (sent, principal_id) = {
            let mut inner = self.inner();
            let token = inner.data.token.clone().ok_or(AuthError::NoToken)?;
            let id = inner
                .data
                .principal
                .as_ref()
                .and_then(|p| p.id.clone())
                .ok_or(AuthError::NoPrincipal)?;
            inner.loading = true;
            inner.last_error = None;
            (token, id)
        };

        let result = self.exchange.current_user(&principal_id).await;

        let result = {
            let mut inner = self.inner();
            inner.loading = false;
            if inner.data.token.as_ref() != Some(&sent) {
                debug!("Session changed while fetching user, discarding result");
                return Err(AuthError::SessionChanged);
            }
            match result {
                Ok(ref principal) => inner.data.principal = Some(principal.clone()),
                Err(ref e) => inner.last_error = Some(e.to_string()),
            }
            result
        };

        match result {
            Ok(principal) => {
                self.save_to_storage();
                Ok(principal)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.logout().await;
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Storage mirror
    // =========================================================================

    /// Write the current token and principal to durable storage.
    pub fn save_to_storage(&self) {
        let data = self.data();
        if let Err(e) = self.write_storage(&data) {
            warn!(error = %e, "Failed to save session");
        }
    }

    fn write_storage(&self, data: &SessionData) -> Result<(), StorageError> {
        if let Some(ref token) = data.token {
            self.storage.set(TOKEN_STORAGE_KEY, &serde_json::to_string(token)?)?;
        }
        if let Some(ref principal) = data.principal {
            self.storage.set(USER_STORAGE_KEY, &serde_json::to_string(principal)?)?;
        }
        Ok(())
    }

    pub fn clear_storage(&self) {
        for key in [TOKEN_STORAGE_KEY, USER_STORAGE_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to clear storage entry");
            }
        }
    }
}
