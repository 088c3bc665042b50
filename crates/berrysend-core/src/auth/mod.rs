//! Authentication session lifecycle.
//!
//! This module provides:
//! - `AuthToken`: access/refresh token pair with expiry evaluation
//! - `Principal`: the authenticated user record
//! - `SessionStore`: the authoritative session, mirrored to durable storage
//! - `CredentialExchange`: the remote collaborator trading credentials for tokens

pub mod error;
pub mod exchange;
pub mod principal;
pub mod session;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AuthError, OperationKind};
pub use exchange::{AuthOutcome, CredentialExchange, Registration};
pub use principal::Principal;
pub use session::{SessionData, SessionState, SessionStore};
pub use token::{AuthToken, DecodeFailurePolicy, TokenClaims, ON_DECODE_FAILURE};
