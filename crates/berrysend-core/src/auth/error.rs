use std::fmt;

use thiserror::Error;

use crate::api::ApiError;

/// Operation kinds guarded by the session's single-flight entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Login and register both resolve the session from credentials
    Authenticate,
    Refresh,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Authenticate => f.write_str("authentication"),
            OperationKind::Refresh => f.write_str("token refresh"),
        }
    }
}

/// Errors surfaced by the session store and the credential exchange.
///
/// `Display` output is the message shown to the user, unchanged.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// Failure message passed through from the remote `detail` field
    #[error("{0}")]
    Rejected(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("No token available")]
    NoToken,

    #[error("No user available")]
    NoPrincipal,

    #[error("Unauthorized")]
    Unauthorized,

    /// The session was logged out or replaced while the request was pending
    #[error("Session ended before the request completed")]
    SessionChanged,

    #[error("Another {0} is already in progress")]
    InFlight(OperationKind),

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AuthError::Unauthorized,
            other => AuthError::Api(other),
        }
    }
}

impl AuthError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Unauthorized)
    }
}
