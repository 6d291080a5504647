use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::fs;

use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::storage::record::StoredProject;

/// Structured project store holding full-quality records keyed by project id.
#[async_trait]
pub trait ProjectDatabase: Send + Sync {
    async fn put(&self, record: &StoredProject) -> StoreshotResult<()>;
    async fn get(&self, id: &str) -> StoreshotResult<Option<StoredProject>>;
    async fn delete(&self, id: &str) -> StoreshotResult<()>;
}

/// In-memory database. Records are held serialized so reads never share state with writers.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProjectDatabase for MemoryDatabase {
    async fn put(&self, record: &StoredProject) -> StoreshotResult<()> {
        let json = serde_json::to_string(record)?;
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id.clone(), json);
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreshotResult<Option<StoredProject>> {
        let json = self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned();
        json.map(|j| serde_json::from_str(&j).map_err(StoreshotError::from))
            .transpose()
    }

    async fn delete(&self, id: &str) -> StoreshotResult<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        Ok(())
    }
}

/// One pretty-printed JSON file per project under a root directory.
#[derive(Debug, Clone)]
pub struct DirDatabase {
    root: PathBuf,
}

impl DirDatabase {
    /// Create the root directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreshotResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StoreshotError::storage(format!(
                "failed to open project database '{}': {e}",
                root.display()
            ))
        })?;
        tracing::debug!(root = %root.display(), "project database ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> StoreshotResult<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreshotError::storage(format!(
                "project id '{id}' is not usable as a record key"
            )));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl ProjectDatabase for DirDatabase {
    async fn put(&self, record: &StoredProject) -> StoreshotResult<()> {
        let path = self.record_path(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(|e| {
            StoreshotError::storage(format!("failed to write '{}': {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            StoreshotError::storage(format!("failed to write '{}': {e}", path.display()))
        })
    }

    async fn get(&self, id: &str) -> StoreshotResult<Option<StoredProject>> {
        let path = self.record_path(id)?;
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreshotError::storage(format!(
                    "failed to read '{}': {e}",
                    path.display()
                )));
            }
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn delete(&self, id: &str) -> StoreshotResult<()> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreshotError::storage(format!(
                "failed to delete '{}': {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl<T: ProjectDatabase + ?Sized> ProjectDatabase for Arc<T> {
    async fn put(&self, record: &StoredProject) -> StoreshotResult<()> {
        (**self).put(record).await
    }

    async fn get(&self, id: &str) -> StoreshotResult<Option<StoredProject>> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &str) -> StoreshotResult<()> {
        (**self).delete(id).await
    }
}
