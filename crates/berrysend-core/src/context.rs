use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::{ApiClient, AuthService};
use crate::auth::SessionStore;
use crate::config::EnvironmentConfig;
use crate::router::Router;
use crate::storage::{DurableStorage, FileStorage, KeyringStorage, MemoryStorage};

/// Where the session mirror is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

/// Everything the application root owns, built once at startup.
pub struct ClientContext {
    pub config: EnvironmentConfig,
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
    pub router: Arc<Router>,
}

impl ClientContext {
    /// Build the client: storage, API client, credential exchange, session,
    /// router; install the interceptor and restore the stored session.
    pub fn build(config: EnvironmentConfig, backend: StorageBackend) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn DurableStorage> = match backend {
            StorageBackend::File => {
                let dir = config.data_dir()?;
                debug!(?dir, "Using file storage");
                Arc::new(
                    FileStorage::new(dir.clone())
                        .with_context(|| format!("Failed to create data directory {}", dir.display()))?,
                )
            }
            StorageBackend::Keyring => {
                Arc::new(KeyringStorage::new().context("OS keyring is not available for session storage")?)
            }
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };

        let api = ApiClient::new(config.clone()).context("Failed to build HTTP client")?;
        let exchange = Arc::new(AuthService::new(api.clone()));
        let session = Arc::new(SessionStore::new(storage, exchange));
        let router = Arc::new(Router::new(session.clone()));

        api.setup_interceptor(&session, &router);
        session.initialize();
        info!(
            app = %config.app_name,
            version = %config.app_version,
            authenticated = session.is_authenticated(),
            "Client initialized"
        );

        Ok(Self {
            config,
            api,
            session,
            router,
        })
    }
}
