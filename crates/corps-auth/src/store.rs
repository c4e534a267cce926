//! Durable key/value storage for session data.
//!
//! Holds the advisory copy of the signed-in user (`auth_user`) and the hosted
//! backend's tokens (`auth_session`). Neither is trusted for authorization;
//! the backend session stays the source of truth.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::error::{AuthError, Result};

/// Key of the persisted [`UserRecord`](crate::UserRecord).
pub const USER_KEY: &str = "auth_user";

/// Key of the persisted backend session tokens.
pub const SESSION_KEY: &str = "auth_session";

/// Trait for durable string storage.
#[async_trait]
pub trait DurableStore: Send + Sync + std::fmt::Debug {
    /// Read a value. `Ok(None)` when nothing is stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Store shared across async contexts.
pub type SharedStore = Arc<dyn DurableStore>;

/// Read and decode a JSON value.
pub async fn load_json<T: DeserializeOwned>(store: &dyn DurableStore, key: &str) -> Result<Option<T>> {
    match store.load(key).await? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
            AuthError::Serialization(format!("Failed to parse stored '{}': {}", key, e))
        }),
    }
}

/// Encode and write a JSON value.
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn DurableStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| AuthError::Serialization(format!("Failed to serialize '{}': {}", key, e)))?;
    store.save(key, &raw).await
}

// ============================================================================
// FileStore
// ============================================================================

/// File-backed store: one `<key>.json` file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AuthError::Storage(format!("Invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| AuthError::Storage(format!("Failed to read {}: {}", path.display(), e)))
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            AuthError::Storage(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        std::fs::write(&path, value)
            .map_err(|e| AuthError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;

        tracing::debug!(key = %key, path = %path.display(), "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                AuthError::Storage(format!("Failed to delete {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store for tests and ephemeral shells.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
