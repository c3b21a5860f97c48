use crate::{CatcherError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Keyed JSON persistence boundary.
///
/// The manifest collection lives behind this trait; a missing key reads as
/// `None`, never as an error.
#[async_trait]
pub trait StorageArea: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Storage area keeping one pretty-printed JSON file per key
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Create the store, ensuring the data directory exists
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
            CatcherError::Storage(format!(
                "Cannot create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        info!("📁 Storage directory ready: {}", data_dir.display());
        Ok(Self { data_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StorageArea for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content).map_err(|e| {
                    CatcherError::Storage(format!(
                        "Corrupt storage file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CatcherError::Storage(format!(
                "Cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.key_path(key);
        let content = serde_json::to_string_pretty(&value).map_err(|e| {
            CatcherError::Storage(format!("Cannot serialize value for key {}: {}", key, e))
        })?;
        tokio::fs::write(&path, content).await.map_err(|e| {
            CatcherError::Storage(format!("Cannot write {}: {}", path.display(), e))
        })?;
        debug!("💾 Persisted storage key: {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatcherError::Storage(format!(
                "Cannot remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// In-memory storage area for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageArea for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
