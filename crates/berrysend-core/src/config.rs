//! Environment configuration for the BerrySend client.
//!
//! Every setting has a default and can be overridden through a
//! `BERRYSEND_*` environment variable (the binary also loads `.env`).
//! Session data is stored under `<data dir>/berrysend` unless
//! `BERRYSEND_DATA_DIR` points elsewhere.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::warn;

/// Application name used for the data directory path
const APP_DIR_NAME: &str = "berrysend";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_APP_NAME: &str = "BerrySend";
const DEFAULT_APP_VERSION: &str = "1.0.0";

/// Endpoint keys with their default paths and the variable overriding each.
const ENDPOINT_DEFAULTS: &[(&str, &str, &str)] = &[
    ("users", "/users", "BERRYSEND_USERS_ENDPOINT_PATH"),
    ("ports", "/api/v1/ports", "BERRYSEND_PORTS_ENDPOINT_PATH"),
    ("port_connections", "/api/v1/port-connections", "BERRYSEND_PORT_CONNECTIONS_ENDPOINT_PATH"),
    ("routes", "/api/v1/routes", "BERRYSEND_ROUTES_ENDPOINT_PATH"),
    ("exports", "/exports", "BERRYSEND_EXPORTS_ENDPOINT_PATH"),
    ("algorithms", "/algorithms", "BERRYSEND_ALGORITHMS_ENDPOINT_PATH"),
    ("optimization", "/api/v1/routes/compute", "BERRYSEND_OPTIMIZATION_ENDPOINT_PATH"),
    // Sign-in and sign-up live at the API root unless configured
    ("auth", "", "BERRYSEND_AUTH_ENDPOINT_PATH"),
];

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    pub google_maps_api_key: String,
    pub app_name: String,
    pub app_version: String,
    pub endpoints: BTreeMap<String, String>,
    pub data_dir: Option<PathBuf>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl EnvironmentConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_timeout_ms = match var("BERRYSEND_API_TIMEOUT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid BERRYSEND_API_TIMEOUT, using default");
                DEFAULT_API_TIMEOUT_MS
            }),
            None => DEFAULT_API_TIMEOUT_MS,
        };

        let endpoints = ENDPOINT_DEFAULTS
            .iter()
            .map(|(key, default, env_key)| {
                let path = var(env_key).unwrap_or_else(|| default.to_string());
                (key.to_string(), path)
            })
            .collect();

        Self {
            api_base_url: var("BERRYSEND_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_timeout_ms,
            google_maps_api_key: var("BERRYSEND_GOOGLE_MAPS_API_KEY").unwrap_or_default(),
            app_name: var("BERRYSEND_APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            app_version: var("BERRYSEND_APP_VERSION")
                .unwrap_or_else(|| DEFAULT_APP_VERSION.to_string()),
            endpoints,
            data_dir: var("BERRYSEND_DATA_DIR").map(PathBuf::from),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    /// Path for an endpoint key, or an empty string for unknown keys
    pub fn endpoint(&self, key: &str) -> &str {
        self.endpoints.get(key).map(String::as_str).unwrap_or("")
    }

    /// Full URL for an endpoint key
    pub fn build_api_url(&self, key: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), self.endpoint(key))
    }

    /// Fail on missing critical settings, warn on optional ones
    pub fn validate(&self) -> Result<()> {
        if self.google_maps_api_key.is_empty() {
            warn!("BERRYSEND_GOOGLE_MAPS_API_KEY is not configured");
        }
        if self.api_base_url.trim().is_empty() {
            bail!("Critical: BERRYSEND_API_BASE_URL is not configured");
        }
        url::Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;
        Ok(())
    }

    /// Directory holding the persisted session
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:3000");
        assert_eq!(config.api_timeout(), Duration::from_secs(30));
        assert_eq!(config.app_name, "BerrySend");
        assert_eq!(config.build_api_url("ports"), "http://localhost:3000/api/v1/ports");
        assert_eq!(config.build_api_url("auth"), "http://localhost:3000");
        assert_eq!(config.endpoint("nope"), "");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = EnvironmentConfig::from_lookup(lookup(&[
            ("BERRYSEND_API_BASE_URL", "https://api.berrysend.io/"),
            ("BERRYSEND_API_TIMEOUT", "5000"),
            ("BERRYSEND_AUTH_ENDPOINT_PATH", "/api/v1/authentication"),
            ("BERRYSEND_USERS_ENDPOINT_PATH", ""),
            ("BERRYSEND_DATA_DIR", "/tmp/berrysend-test"),
        ]));

        assert_eq!(config.api_timeout_ms, 5000);
        assert_eq!(
            config.build_api_url("auth"),
            "https://api.berrysend.io/api/v1/authentication"
        );
        // Empty override falls back to the default path
        assert_eq!(config.endpoint("users"), "/users");
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/berrysend-test"));
    }

    #[test]
    fn test_invalid_timeout_uses_default() {
        let config = EnvironmentConfig::from_lookup(lookup(&[("BERRYSEND_API_TIMEOUT", "soon")]));
        assert_eq!(config.api_timeout_ms, DEFAULT_API_TIMEOUT_MS);
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = EnvironmentConfig::default();
        config.api_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api_base_url = String::new();
        assert!(config.validate().is_err());
    }
}
