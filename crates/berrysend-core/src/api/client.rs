//! HTTP client for the BerrySend REST API.
//!
//! Every request made through `ApiClient::send` passes through the
//! `AuthInterceptor` once it has been installed with `setup_interceptor`.

use std::sync::{Arc, OnceLock};

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionStore;
use crate::config::EnvironmentConfig;
use crate::router::Navigator;

use super::{ApiError, AuthInterceptor};

/// API client for the BerrySend backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the installed interceptor.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<EnvironmentConfig>,
    interceptor: Arc<OnceLock<AuthInterceptor>>,
}

impl ApiClient {
    /// Create a new API client with the configured timeout
    pub fn new(config: EnvironmentConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.api_timeout()).build()?;
        Ok(Self::with_client(client, config))
    }

    pub(crate) fn with_client(client: Client, config: EnvironmentConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            interceptor: Arc::new(OnceLock::new()),
        }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Install the auth interceptor. Only the first call has an effect;
    /// returns whether this call installed it.
    pub fn setup_interceptor<N: Navigator + 'static>(
        &self,
        session: &Arc<SessionStore>,
        navigator: &Arc<N>,
    ) -> bool {
        if self.interceptor.get().is_some() {
            debug!("Auth interceptor already installed");
            return false;
        }
        let installed = self
            .interceptor
            .set(AuthInterceptor::new(session, navigator))
            .is_ok();
        if installed {
            debug!("Auth interceptor installed");
        }
        installed
    }

    pub fn has_interceptor(&self) -> bool {
        self.interceptor.get().is_some()
    }

    /// Full URL for an endpoint key plus a sub-path
    pub fn url(&self, endpoint_key: &str, path: &str) -> String {
        format!("{}{}", self.config.build_api_url(endpoint_key), path)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request through the interceptor and check its status.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let mut request = builder.build()?;
        let interceptor = self.interceptor.get();

        if let Some(interceptor) = interceptor {
            interceptor.on_request(&mut request)?;
        }

        let method = request.method().clone();
        let url = request.url().clone();
        let response = self.client.execute(request).await?;
        let status = response.status();
        debug!(%method, %url, %status, "API response");

        if let Some(interceptor) = interceptor {
            interceptor.on_response(status).await;
        }

        Self::check_response(response).await
    }

    /// Send a request without the interceptor. Used for the credential
    /// exchange itself, where a 401 means bad credentials rather than a
    /// dead session.
    pub async fn send_unintercepted(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        Self::check_response(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            warn!(%status, error = %err, "API request failed");
            Err(err)
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, url)).await?;
        Self::parse_json(response, url).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::POST, url).json(body)).await?;
        Self::parse_json(response, url).await
    }

    pub async fn delete(&self, url: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    pub(crate) async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }
}
