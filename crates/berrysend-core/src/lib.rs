//! BerrySend client core.
//!
//! The authentication session lifecycle of the BerrySend route-management
//! client: token model and expiry, the session store with its durable
//! mirror, the API client's auth interceptor, and auth-gated routing.
//!
//! `ClientContext::build` wires the pieces together the way an application
//! root does; everything is passed explicitly, nothing is global.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod router;
pub mod storage;

pub use context::{ClientContext, StorageBackend};
