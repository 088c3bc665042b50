use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthToken, Principal};

/// Data collected by the registration form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Outcome of a credential exchange. Sign-up may return no token, in which
/// case the user has to log in afterwards.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub token: Option<AuthToken>,
    pub principal: Principal,
}

/// Remote collaborator that trades credentials for tokens.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError>;

    async fn register(&self, registration: &Registration) -> Result<AuthOutcome, AuthError>;

    /// Best-effort notification; callers ignore failures
    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthToken, AuthError>;

    async fn current_user(&self, principal_id: &str) -> Result<Principal, AuthError>;
}
