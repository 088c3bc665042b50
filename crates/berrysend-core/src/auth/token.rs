use std::collections::HashMap;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default token lifetime when the API response does not say.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Default credential scheme.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// What `is_expired` concludes when a structured token cannot be decoded
/// and no `createdAt`/`expiresIn` pair is available either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailurePolicy {
    AssumeValid,
    AssumeExpired,
}

/// Policy applied by `AuthToken::is_expired`.
pub const ON_DECODE_FAILURE: DecodeFailurePolicy = DecodeFailurePolicy::AssumeValid;

/// Base64url with optional padding, for the claims segment.
const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims carried in the middle segment of a structured token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(default)]
    pub iat: Option<f64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Expiry in milliseconds, ignoring a zero claim
    fn exp_millis(&self) -> Option<i64> {
        self.exp
            .filter(|exp| *exp > 0.0)
            .map(|exp| (exp * 1000.0) as i64)
    }
}

/// An access/refresh token pair.
///
/// Serialized with the field names used in durable storage:
/// `accessToken`, `refreshToken`, `expiresIn`, `tokenType`, `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    #[serde(default, alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime in seconds, counted from `created_at`
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// Token as returned by the authentication endpoints, which disagree on casing.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<i64>,
    #[serde(default, alias = "tokenType")]
    token_type: Option<String>,
}

impl From<TokenResponse> for AuthToken {
    fn from(resp: TokenResponse) -> Self {
        Self {
            access_token: resp.token,
            refresh_token: resp.refresh_token.unwrap_or_default(),
            expires_in: Some(resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)),
            token_type: resp.token_type.unwrap_or_else(default_token_type),
            created_at: Some(Utc::now()),
        }
    }
}

impl AuthToken {
    /// Create a token issued now with the given lifetime
    pub fn issued_now(access_token: impl Into<String>, refresh_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in: Some(expires_in),
            token_type: default_token_type(),
            created_at: Some(Utc::now()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_with_policy(Utc::now(), ON_DECODE_FAILURE)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_expired_with_policy(now, ON_DECODE_FAILURE)
    }

    /// Expiry check with an explicit policy for undecodable structured tokens.
    pub fn is_expired_with_policy(&self, now: DateTime<Utc>, on_decode_failure: DecodeFailurePolicy) -> bool {
        if self.access_token.is_empty() {
            return true;
        }

        // Opaque tokens carry no claims; missing lifetime means non-expiring
        if !self.is_structured() {
            return self.lifetime_expired(now).unwrap_or(false);
        }

        match self.decode().and_then(|claims| claims.exp_millis()) {
            Some(exp_ms) => now.timestamp_millis() >= exp_ms,
            None => match self.lifetime_expired(now) {
                Some(expired) => expired,
                None => on_decode_failure == DecodeFailurePolicy::AssumeExpired,
            },
        }
    }

    /// `Some(expired)` when both `created_at` and a non-zero `expires_in` are known.
    /// A lifetime past the representable range never expires.
    fn lifetime_expired(&self, now: DateTime<Utc>) -> Option<bool> {
        let created_at = self.created_at?;
        let expires_in = self.expires_in.filter(|secs| *secs > 0)?;
        let expiry_ms = expires_in
            .checked_mul(1000)
            .and_then(|ms| created_at.timestamp_millis().checked_add(ms));
        Some(expiry_ms.is_some_and(|expiry_ms| now.timestamp_millis() >= expiry_ms))
    }

    /// A structured token is one containing a `.`; whether it decodes is
    /// decided separately.
    pub fn is_structured(&self) -> bool {
        self.access_token.contains('.')
    }

    /// Decode the claims segment of a three-part structured token.
    pub fn decode(&self) -> Option<TokenClaims> {
        let mut parts = self.access_token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        let bytes = match CLAIMS_ENGINE.decode(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Token claims segment is not base64url");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "Token claims segment is not JSON");
                None
            }
        }
    }

    /// Expiry taken from the `exp` claim
    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        let exp_ms = self.decode()?.exp_millis()?;
        Utc.timestamp_millis_opt(exp_ms).single()
    }

    pub fn remaining_millis(&self) -> u64 {
        self.remaining_millis_at(Utc::now())
    }

    pub fn remaining_millis_at(&self, now: DateTime<Utc>) -> u64 {
        match self.decode().and_then(|claims| claims.exp_millis()) {
            Some(exp_ms) => (exp_ms - now.timestamp_millis()).max(0) as u64,
            None => 0,
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}
