use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::auth::token::TokenResponse;
use crate::auth::{AuthError, AuthOutcome, AuthToken, CredentialExchange, Principal, Registration};

use super::{ApiClient, ApiError};

/// Lifetime the backend gives sign-in tokens (30 minutes)
const SIGN_IN_TOKEN_LIFETIME_SECS: i64 = 1800;

const LOGIN_FALLBACK_MESSAGE: &str = "Failed to login. Please try again.";
const REGISTER_FALLBACK_MESSAGE: &str = "Failed to register. Please try again.";

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    full_name: &'a str,
    email: &'a str,
    password: &'a str,
    confirm_password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Sign-in returns the user fields and the token side by side
#[derive(Debug, Deserialize)]
struct SignInResponse {
    #[serde(flatten)]
    principal: Principal,
    token: String,
}

/// Credential exchange against the BerrySend REST API.
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn auth_url(&self, path: &str) -> String {
        self.api.url("auth", path)
    }
}

/// Bad credentials come back as 400; anything else surfaces the remote detail.
fn map_login_error(err: ApiError) -> AuthError {
    error!(error = %err, "Login failed");
    match err {
        ApiError::BadRequest(_) => AuthError::InvalidCredentials,
        other => AuthError::Rejected(
            other
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| LOGIN_FALLBACK_MESSAGE.to_string()),
        ),
    }
}

fn map_register_error(err: ApiError) -> AuthError {
    error!(error = %err, "Registration failed");
    if let ApiError::BadRequest(ref detail) = err {
        if detail.contains("already") {
            return AuthError::EmailAlreadyRegistered;
        }
    }
    AuthError::Rejected(
        err.detail()
            .map(str::to_string)
            .unwrap_or_else(|| REGISTER_FALLBACK_MESSAGE.to_string()),
    )
}

#[async_trait]
impl CredentialExchange for AuthService {
    async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let url = self.auth_url("/sign-in");
        let builder = self
            .api
            .request(Method::POST, &url)
            .json(&SignInRequest { email, password });

        let response = self.api.send_unintercepted(builder).await.map_err(map_login_error)?;
        let data: SignInResponse = ApiClient::parse_json(response, &url)
            .await
            .map_err(map_login_error)?;

        debug!(user_id = ?data.principal.id, "Sign-in succeeded");
        Ok(AuthOutcome {
            token: Some(AuthToken::issued_now(data.token, "", SIGN_IN_TOKEN_LIFETIME_SECS)),
            principal: data.principal,
        })
    }

    async fn register(&self, registration: &Registration) -> Result<AuthOutcome, AuthError> {
        let url = self.auth_url("/sign-up");
        let builder = self.api.request(Method::POST, &url).json(&SignUpRequest {
            full_name: &registration.name,
            email: &registration.email,
            password: &registration.password,
            confirm_password: &registration.password,
        });

        let response = self
            .api
            .send_unintercepted(builder)
            .await
            .map_err(map_register_error)?;
        let principal: Principal = ApiClient::parse_json(response, &url)
            .await
            .map_err(map_register_error)?;

        // Sign-up returns no token; the user logs in afterwards
        Ok(AuthOutcome { token: None, principal })
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let builder = self
            .api
            .request(Method::POST, &self.auth_url("/sign-out"))
            .bearer_auth(access_token);
        self.api.send_unintercepted(builder).await?;
        Ok(())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthToken, AuthError> {
        let url = self.auth_url("/refresh");
        let builder = self
            .api
            .request(Method::POST, &url)
            .json(&RefreshRequest { refresh_token });

        let response = self.api.send_unintercepted(builder).await?;
        let token: TokenResponse = ApiClient::parse_json(response, &url).await?;
        Ok(token.into())
    }

    async fn current_user(&self, principal_id: &str) -> Result<Principal, AuthError> {
        let url = self.api.url("users", &format!("/{}", principal_id));
        Ok(self.api.get(&url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_bad_request_is_invalid_credentials() {
        let err = map_login_error(ApiError::BadRequest("whatever".into()));
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_login_validation_error_is_not_invalid_credentials() {
        let err = map_login_error(ApiError::from_status(
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":"Email format is invalid"}"#,
        ));
        assert!(!matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), "Email format is invalid");
    }

    #[test]
    fn test_login_passes_remote_detail_through() {
        let err = map_login_error(ApiError::ServerError("Account locked".into()));
        assert_eq!(err.to_string(), "Account locked");

        let err = map_login_error(ApiError::RateLimited);
        assert_eq!(err.to_string(), LOGIN_FALLBACK_MESSAGE);

        let err = map_login_error(ApiError::Unauthorized);
        assert_eq!(err.to_string(), LOGIN_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_register_error_mapping() {
        let err = map_register_error(ApiError::BadRequest("User already exists".into()));
        assert!(matches!(err, AuthError::EmailAlreadyRegistered));
        assert_eq!(err.to_string(), "Email already registered");

        let err = map_register_error(ApiError::BadRequest("Password too short".into()));
        assert_eq!(err.to_string(), "Password too short");

        let err = map_register_error(ApiError::InvalidResponse("garbage".into()));
        assert_eq!(err.to_string(), REGISTER_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_sign_in_response_parses_principal_and_token() {
        let json = r#"{"id": 3, "full_name": "Ana Torres", "email": "ana@berrysend.com", "token": "a.b.c"}"#;
        let data: SignInResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.token, "a.b.c");
        assert_eq!(data.principal.id.as_deref(), Some("3"));
        assert_eq!(data.principal.name, "Ana Torres");
    }

    #[test]
    fn test_sign_up_body_field_names() {
        let body = serde_json::to_value(SignUpRequest {
            full_name: "Ana",
            email: "ana@berrysend.com",
            password: "pw",
            confirm_password: "pw",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "full_name": "Ana",
                "email": "ana@berrysend.com",
                "password": "pw",
                "confirm_password": "pw"
            })
        );
    }
}
