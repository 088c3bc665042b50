//! REST API client module for the BerrySend backend.
//!
//! This module provides the `ApiClient` with its `AuthInterceptor`, and
//! `AuthService`, the HTTP implementation of the credential exchange.
//!
//! The API uses bearer token authentication obtained from the sign-in
//! endpoint.

pub mod auth_service;
pub mod client;
pub mod error;
pub mod interceptor;

pub use auth_service::AuthService;
pub use client::ApiClient;
pub use error::ApiError;
pub use interceptor::AuthInterceptor;
