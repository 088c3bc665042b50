//! Durable key/value storage that mirrors the session.
//!
//! The session store writes the serialized token and principal under fixed
//! keys and reads them back once at startup. Backends:
//!
//! - `FileStorage`: one `<key>.json` file per key in the data directory
//! - `KeyringStorage`: the OS credential store (Keychain, Secret Service, ...)
//! - `MemoryStorage`: process-local map, used in tests and ephemeral runs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Storage key holding the serialized `AuthToken`
pub const TOKEN_STORAGE_KEY: &str = "berrysend_token";

/// Storage key holding the serialized `Principal`
pub const USER_STORAGE_KEY: &str = "berrysend_user";

/// Service name used for keyring entries
const KEYRING_SERVICE: &str = "berrysend";

/// Entry written once at startup to confirm the keyring persists
const KEYRING_CHECK_KEY: &str = "berrysend_storage_check";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Keyring does not persist entries on this platform")]
    KeyringUnavailable,

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Synchronous key/value storage. Reads and writes are local only.
pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// File storage
// ============================================================================

pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);
        debug!(?path, "Writing storage entry");
        std::fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ============================================================================
// Keyring storage
// ============================================================================

/// Stores each key as a secret in the OS keychain under one service name.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_service(KEYRING_SERVICE)
    }

    /// Open the store for `service`. Fails unless an entry written through
    /// it reads back, so a non-persistent credential store is never used.
    pub fn with_service(service: &str) -> Result<Self, StorageError> {
        let storage = Self {
            service: service.to_string(),
        };
        storage.set(KEYRING_CHECK_KEY, service)?;
        let read_back = storage.get(KEYRING_CHECK_KEY)?;
        storage.remove(KEYRING_CHECK_KEY)?;
        if read_back.as_deref() != Some(service) {
            return Err(StorageError::KeyringUnavailable);
        }
        debug!(service, "Keyring storage available");
        Ok(storage)
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl DurableStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Memory storage
// ============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_set_get_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("nested")).expect("create storage");

        assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap(), None);

        storage.set(TOKEN_STORAGE_KEY, r#"{"accessToken":"abc"}"#).unwrap();
        assert_eq!(
            storage.get(TOKEN_STORAGE_KEY).unwrap().as_deref(),
            Some(r#"{"accessToken":"abc"}"#)
        );
        assert!(dir.path().join("nested").join("berrysend_token.json").exists());

        storage.remove(TOKEN_STORAGE_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap(), None);

        // Removing a missing key is not an error
        storage.remove(USER_STORAGE_KEY).unwrap();
    }

    #[test]
    fn test_memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.set(USER_STORAGE_KEY, "first").unwrap();
        storage.set(USER_STORAGE_KEY, "second").unwrap();
        assert_eq!(storage.get(USER_STORAGE_KEY).unwrap().as_deref(), Some("second"));
        storage.remove(USER_STORAGE_KEY).unwrap();
        assert!(storage.get(USER_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_keyring_storage_round_trips_or_refuses_to_open() {
        // Either the platform store persists entries, or opening it fails;
        // a storage that accepts writes and reads back nothing is never returned.
        match KeyringStorage::with_service("berrysend-test") {
            Ok(storage) => {
                storage.set(TOKEN_STORAGE_KEY, "persisted").unwrap();
                assert_eq!(storage.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("persisted"));
                storage.remove(TOKEN_STORAGE_KEY).unwrap();
                assert!(storage.get(TOKEN_STORAGE_KEY).unwrap().is_none());
            }
            Err(e) => assert!(
                matches!(e, StorageError::KeyringUnavailable | StorageError::Keyring(_)),
                "unexpected error: {}",
                e
            ),
        }
    }
}
