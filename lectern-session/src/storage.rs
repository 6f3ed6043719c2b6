//! Durable storage for session credentials.
//!
//! Credentials persist as two string values keyed `access` and `refresh`. They are
//! written on login and refresh, and removed together on logout.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Key of a persisted credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The access token.
    Access,
    /// The refresh token.
    Refresh,
}

impl StorageKey {
    /// Both keys, in the order they are written.
    pub const ALL: [StorageKey; 2] = [StorageKey::Access, StorageKey::Refresh];

    /// Key name used by storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage trait for credential persistence.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Read a stored value.
    async fn load(&self, key: StorageKey) -> SessionResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn store(&self, key: StorageKey, value: &str) -> SessionResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    async fn remove(&self, key: StorageKey) -> SessionResult<()>;

    /// Remove every credential.
    async fn clear(&self) -> SessionResult<()> {
        for key in StorageKey::ALL {
            self.remove(key).await?;
        }
        Ok(())
    }
}

/// In-memory storage.
///
/// Suitable for tests and for clients that must not keep credentials across
/// restarts.
#[derive(Debug, Default)]
pub struct InMemoryTokenStorage {
    values: RwLock<HashMap<StorageKey, String>>,
}

impl InMemoryTokenStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-populated with a token pair.
    pub fn with_tokens(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        let storage = Self::new();
        {
            let mut values = storage.values.write();
            values.insert(StorageKey::Access, access.into());
            values.insert(StorageKey::Refresh, refresh.into());
        }
        storage
    }

    /// Synchronous read, for assertions.
    pub fn get(&self, key: StorageKey) -> Option<String> {
        self.values.read().get(&key).cloned()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn load(&self, key: StorageKey) -> SessionResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn store(&self, key: StorageKey, value: &str) -> SessionResult<()> {
        self.values.write().insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> SessionResult<()> {
        self.values.write().remove(&key);
        Ok(())
    }
}

/// File-backed storage.
///
/// Keeps a single JSON object (`{"access": "...", "refresh": "..."}`) on disk.
/// A missing file reads as empty. Writes go through a temp file and a rename.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStorage {
    /// Create a storage backed by `path`. Nothing is touched until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> SessionResult<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    async fn write_all(&self, values: &BTreeMap<String, String>) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), keys = values.len(), "Credentials file written");
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn load(&self, key: StorageKey) -> SessionResult<Option<String>> {
        let _guard = self.lock.lock().await;
        let values = self.read_all().await?;
        Ok(values.get(key.as_str()).cloned())
    }

    async fn store(&self, key: StorageKey, value: &str) -> SessionResult<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.as_str().to_string(), value.to_string());
        self.write_all(&values).await
    }

    async fn remove(&self, key: StorageKey) -> SessionResult<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key.as_str()).is_none() {
            return Ok(());
        }
        self.write_all(&values).await
    }

    async fn clear(&self) -> SessionResult<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        let before = values.len();
        for key in StorageKey::ALL {
            values.remove(key.as_str());
        }
        if values.len() == before {
            return Ok(());
        }
        self.write_all(&values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("lectern-{}", uuid::Uuid::new_v4()))
            .join("credentials.json")
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let storage = InMemoryTokenStorage::new();
        assert_eq!(storage.load(StorageKey::Access).await.unwrap(), None);

        storage.store(StorageKey::Access, "abc").await.unwrap();
        assert_eq!(
            storage.load(StorageKey::Access).await.unwrap(),
            Some("abc".to_string())
        );

        storage.remove(StorageKey::Access).await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_clear_removes_both() {
        let storage = InMemoryTokenStorage::with_tokens("a", "r");
        storage.clear().await.unwrap();
        assert_eq!(storage.get(StorageKey::Access), None);
        assert_eq!(storage.get(StorageKey::Refresh), None);
    }

    #[tokio::test]
    async fn test_file_storage_missing_file_is_empty() {
        let storage = FileTokenStorage::new(temp_path());
        assert_eq!(storage.load(StorageKey::Refresh).await.unwrap(), None);
        // Removing from a file that does not exist must not create it.
        storage.remove(StorageKey::Refresh).await.unwrap();
        assert!(!storage.path().exists());
    }

    #[tokio::test]
    async fn test_file_storage_persists_across_instances() {
        let path = temp_path();
        let storage = FileTokenStorage::new(&path);
        storage.store(StorageKey::Access, "access-1").await.unwrap();
        storage.store(StorageKey::Refresh, "refresh-1").await.unwrap();

        let reopened = FileTokenStorage::new(&path);
        assert_eq!(
            reopened.load(StorageKey::Access).await.unwrap(),
            Some("access-1".to_string())
        );
        assert_eq!(
            reopened.load(StorageKey::Refresh).await.unwrap(),
            Some("refresh-1".to_string())
        );

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"access": "access-1", "refresh": "refresh-1"})
        );

        reopened.clear().await.unwrap();
        assert_eq!(storage.load(StorageKey::Access).await.unwrap(), None);
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({}));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_file_storage_rejects_corrupt_file() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        let storage = FileTokenStorage::new(&path);
        let err = storage.load(StorageKey::Access).await.unwrap_err();
        assert!(matches!(err, SessionError::Serialization(_)));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
