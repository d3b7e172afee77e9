//! Durable storage backends for the token pair.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keyring::{CredentialBuilder, Entry};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Keychain service name
const SERVICE_NAME: &str = "homestead";

/// Session file name in cache directory
pub const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Keychain did not keep the stored value; no persistent credential store is available")]
    KeychainNotPersistent,
}

/// Synchronous key/value storage that survives process restarts.
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Token storage in the OS keychain: Keychain on macOS, Credential Manager
/// on Windows and the kernel keyring (linked to the user's persistent
/// keyring) on Linux.
///
/// Every write is read back, so a platform without a usable store fails
/// the write instead of losing the session at the next start.
#[derive(Debug, Default)]
pub struct KeyringStorage {
    builder: Option<Box<CredentialBuilder>>,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_builder(builder: Box<CredentialBuilder>) -> Self {
        Self {
            builder: Some(builder),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        match &self.builder {
            Some(builder) => Ok(Entry::new_with_credential(builder.build(
                None,
                SERVICE_NAME,
                key,
            )?)),
            None => Ok(Entry::new(SERVICE_NAME, key)?),
        }
    }
}

impl TokenStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        match self.entry(key)?.get_password() {
            Ok(stored) if stored == value => {
                debug!(key, "Keychain entry written");
                Ok(())
            }
            Ok(_) | Err(keyring::Error::NoEntry) => Err(StorageError::KeychainNotPersistent),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Token storage in a JSON file, typically `<cache_dir>/homestead/session.json`.
///
/// The file is rewritten on every change and deleted once it holds no keys.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Storage at the default session file inside `cache_dir`.
    pub fn in_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if values.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), keys = values.len(), "Session file written");
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        // A corrupt file is replaced rather than blocking new credentials
        let mut values = self.read().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());
        self.write(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut values = self.read().unwrap_or_default();
        values.remove(key);
        self.write(&values)
    }
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated storage, as if left behind by an earlier run.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_values([(ACCESS_TOKEN_KEY, "a")]);
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);

        storage.set(REFRESH_TOKEN_KEY, "r").unwrap();
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r"));

        storage.remove(ACCESS_TOKEN_KEY).unwrap();
        storage.remove(ACCESS_TOKEN_KEY).unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_keyring_without_persistent_store_fails_write() {
        // Mock entries forget their value as soon as they are dropped
        let storage = KeyringStorage::with_builder(keyring::mock::default_credential_builder());

        assert!(matches!(
            storage.set(ACCESS_TOKEN_KEY, "access"),
            Err(StorageError::KeychainNotPersistent)
        ));
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        storage.remove(ACCESS_TOKEN_KEY).unwrap();
    }

    #[test]
    #[ignore = "needs a platform keychain; run with --ignored in a desktop session"]
    fn test_keyring_round_trip() {
        let storage = KeyringStorage::new();
        let key = "homestead-test-entry";

        storage.set(key, "value").unwrap();
        assert_eq!(KeyringStorage::new().get(key).unwrap().as_deref(), Some("value"));

        storage.remove(key).unwrap();
        assert_eq!(storage.get(key).unwrap(), None);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("nested");

        let storage = FileStorage::in_dir(&cache_dir);
        storage.set(ACCESS_TOKEN_KEY, "access").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "refresh").unwrap();
        assert!(storage.path().exists());

        let reopened = FileStorage::in_dir(&cache_dir);
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("access"));
        assert_eq!(reopened.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("refresh"));
    }

    #[test]
    fn test_file_storage_removes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());

        storage.set(ACCESS_TOKEN_KEY, "access").unwrap();
        storage.remove(ACCESS_TOKEN_KEY).unwrap();
        assert!(!storage.path().exists());

        // Removing from a missing file is fine
        storage.remove(REFRESH_TOKEN_KEY).unwrap();
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        std::fs::write(storage.path(), "{not json").unwrap();

        assert!(matches!(storage.get(ACCESS_TOKEN_KEY), Err(StorageError::Corrupt(_))));

        storage.set(ACCESS_TOKEN_KEY, "fresh").unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
    }
}
