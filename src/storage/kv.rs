use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::fs;

use crate::foundation::error::{StoreshotError, StoreshotResult};

/// String key-value store with a total size ceiling.
///
/// `set` fails with [`StoreshotError::Quota`] when the write would push the summed byte length of
/// all keys and values past the quota; the store is left unchanged in that case.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreshotResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StoreshotResult<()>;
    async fn remove(&self, key: &str) -> StoreshotResult<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> StoreshotResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreshotResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreshotResult<()> {
        (**self).remove(key).await
    }
}

fn entries_size(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    quota: usize,
) -> StoreshotResult<()> {
    let current = entries_size(entries);
    let replaced = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
    let next = current - replaced + key.len() + value.len();
    if next > quota {
        return Err(StoreshotError::quota(format!(
            "writing '{key}' needs {next} bytes, quota is {quota}"
        )));
    }
    Ok(())
}

#[derive(Debug)]
pub struct MemoryKvStore {
    quota: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new(quota: usize) -> Self {
        Self {
            quota,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn used_bytes(&self) -> usize {
        entries_size(&self.entries.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StoreshotResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreshotResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        check_quota(&entries, key, value, self.quota)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreshotResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Key-value store persisted as one JSON object in a file.
///
/// Writes go to a sibling temp file that is then renamed over the original.
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    quota: usize,
    lock: tokio::sync::Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>, quota: usize) -> Self {
        Self {
            path: path.into(),
            quota,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> StoreshotResult<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StoreshotError::storage(format!(
                    "failed to read '{}': {e}",
                    self.path.display()
                )));
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            StoreshotError::storage(format!(
                "failed to parse key-value file '{}': {e}",
                self.path.display()
            ))
        })
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> StoreshotResult<()> {
        let io_err = |e: std::io::Error| {
            StoreshotError::storage(format!("failed to write '{}': {e}", self.path.display()))
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> StoreshotResult<Option<String>> {
        let _held = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreshotResult<()> {
        let _held = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        check_quota(&entries, key, value, self.quota)?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> StoreshotResult<()> {
        let _held = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}
