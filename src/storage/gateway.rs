use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::assets::compress::compress_data_url;
use crate::assets::decode::data_url_payload_len;
use crate::config::StorageConfig;
use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::model::project::{Project, Screenshot};
use crate::storage::database::ProjectDatabase;
use crate::storage::kv::KeyValueStore;
use crate::storage::record::{ProjectInfo, StoredProject};

pub const PROJECT_KEY_PREFIX: &str = "appScreenshotProject_";
pub const PROJECT_INDEX_KEY: &str = "appScreenshotProjects";
pub const CURRENT_PROJECT_KEY: &str = "currentProject";

/// Resolves once the database has opened, or to `None` when it could not be opened.
pub type DatabaseReady = Shared<BoxFuture<'static, Option<Arc<dyn ProjectDatabase>>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageTier {
    /// Full-quality record in the project database.
    Database,
    /// Recompressed record in the key-value store.
    KeyValueCompressed,
    /// Settings only; images were dropped.
    MetadataOnly,
}

impl StorageTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::KeyValueCompressed => "key-value (compressed)",
            Self::MetadataOnly => "metadata only",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveOutcome {
    pub tier: StorageTier,
    /// Images could not be stored; only a partial success.
    pub screenshots_error: bool,
    /// The record was stored but the project index could not list it.
    pub index_error: bool,
    pub info: ProjectInfo,
}

pub fn record_key(id: &str) -> String {
    format!("{PROJECT_KEY_PREFIX}{id}")
}

/// Project persistence over a structured database with key-value fallbacks.
///
/// Saves try the database, then the key-value store with recompressed images, then the
/// key-value store without images. Each failed tier is logged and the next one attempted; only
/// when the last tier fails does a save return an error. Every operation first waits for the
/// database to finish opening; a database that failed to open is skipped silently.
pub struct PersistenceGateway {
    ready: DatabaseReady,
    kv: Arc<dyn KeyValueStore>,
    config: StorageConfig,
}

impl PersistenceGateway {
    pub fn new<F>(open_database: F, kv: Arc<dyn KeyValueStore>, config: StorageConfig) -> Self
    where
        F: Future<Output = StoreshotResult<Arc<dyn ProjectDatabase>>> + Send + 'static,
    {
        let ready = async move {
            match open_database.await {
                Ok(db) => Some(db),
                Err(e) => {
                    tracing::warn!(error = %e, "project database unavailable, using key-value storage");
                    None
                }
            }
        }
        .boxed()
        .shared();
        Self { ready, kv, config }
    }

    pub fn with_database(
        db: Arc<dyn ProjectDatabase>,
        kv: Arc<dyn KeyValueStore>,
        config: StorageConfig,
    ) -> Self {
        Self::new(async move { Ok(db) }, kv, config)
    }

    pub fn without_database(kv: Arc<dyn KeyValueStore>, config: StorageConfig) -> Self {
        Self {
            ready: futures::future::ready(None).boxed().shared(),
            kv,
            config,
        }
    }

    async fn database(&self) -> Option<Arc<dyn ProjectDatabase>> {
        self.ready.clone().await
    }

    pub async fn database_available(&self) -> bool {
        self.database().await.is_some()
    }

    #[tracing::instrument(skip(self, project), fields(screenshots = project.screenshots.len()))]
    pub async fn save_project(
        &self,
        id: &str,
        name: &str,
        project: &Project,
    ) -> StoreshotResult<SaveOutcome> {
        if id.is_empty() {
            return Err(StoreshotError::validation("project id must not be empty"));
        }
        let date = Utc::now();
        let mut data = project.clone();
        data.id = id.to_owned();
        data.name = name.to_owned();
        data.last_saved = Some(date);
        data.screenshots = project
            .screenshots
            .iter()
            .map(Screenshot::durable)
            .collect::<StoreshotResult<_>>()?;
        let images_missing = data.screenshots.iter().any(|s| !s.has_image_data());
        if images_missing {
            tracing::warn!("project has screenshots without image data, saving them as names only");
        }
        let record = StoredProject {
            id: id.to_owned(),
            name: name.to_owned(),
            date,
            data,
            screenshots_error: images_missing,
        };
        let info = record.info();
        let db = self.database().await;

        // Index entry first; the record tier fits into whatever room is left.
        let previous_index = match self.read_index().await {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!(error = %e, "project index unreadable, retrying after save");
                None
            }
        };
        let indexed_first = match &previous_index {
            Some(index) => match self.write_index(&upserted(index, &info)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "project index update failed, retrying after save");
                    false
                }
            },
            None => false,
        };

        let tier = match self.write_record(db.as_deref(), &record).await {
            Ok(tier) => tier,
            Err(e) => {
                if indexed_first
                    && let Some(index) = &previous_index
                    && let Err(undo) = self.write_index(index).await
                {
                    tracing::warn!(error = %undo, "could not roll back project index");
                }
                return Err(e);
            }
        };

        let index_error = if indexed_first {
            false
        } else {
            match self.upsert_index(&info).await {
                Ok(()) => false,
                Err(e) => {
                    tracing::error!(error = %e, "project saved but missing from the project index");
                    true
                }
            }
        };
        tracing::info!(tier = tier.as_str(), "project saved");
        Ok(SaveOutcome {
            tier,
            screenshots_error: images_missing || tier == StorageTier::MetadataOnly,
            index_error,
            info,
        })
    }

    async fn write_record(
        &self,
        db: Option<&dyn ProjectDatabase>,
        record: &StoredProject,
    ) -> StoreshotResult<StorageTier> {
        let key = record_key(&record.id);

        if let Some(db) = db {
            match db.put(record).await {
                Ok(()) => {
                    if let Err(e) = self.kv.remove(&key).await {
                        tracing::debug!(error = %e, "stale key-value record left behind");
                    }
                    return Ok(StorageTier::Database);
                }
                Err(e) => tracing::warn!(error = %e, "database save failed, trying key-value store"),
            }
        }

        let compressed = self
            .compress_record(record)
            .and_then(|r| Ok(serde_json::to_string(&r)?));
        let attempt = match compressed {
            Ok(json) => self.kv.set(&key, &json).await,
            Err(e) => Err(e),
        };
        match attempt {
            Ok(()) => {
                discard_database_record(db, &record.id).await;
                return Ok(StorageTier::KeyValueCompressed);
            }
            Err(e) => {
                tracing::warn!(error = %e, "compressed save failed, storing settings without images")
            }
        }

        let json = serde_json::to_string(&metadata_only(record))?;
        match self.kv.set(&key, &json).await {
            Ok(()) => {
                discard_database_record(db, &record.id).await;
                Ok(StorageTier::MetadataOnly)
            }
            Err(e) => {
                tracing::error!(error = %e, "all storage tiers failed");
                Err(StoreshotError::storage(format!(
                    "could not save project '{}': {e}",
                    record.id
                )))
            }
        }
    }

    fn compress_record(&self, record: &StoredProject) -> StoreshotResult<StoredProject> {
        let mut out = record.clone();
        for shot in out.data.screenshots.iter_mut().filter(|s| s.has_image_data()) {
            let url = compress_data_url(
                &shot.data_url,
                self.config.fallback_quality,
                self.config.fallback_max_width,
            )?;
            tracing::debug!(
                name = %shot.name,
                before = data_url_payload_len(&shot.data_url),
                after = data_url_payload_len(&url),
                "screenshot recompressed"
            );
            *shot = shot.with_data_url(url);
        }
        Ok(out)
    }

    /// Newest record across both tiers, sanitized.
    pub async fn load_project(&self, id: &str) -> StoreshotResult<Option<StoredProject>> {
        let mut last_err = None;

        let from_db = match self.database().await {
            Some(db) => db.get(id).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, id, "database load failed");
                last_err = Some(e);
                None
            }),
            None => None,
        };
        let from_kv = self.read_kv_record(id).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, id, "key-value load failed");
            last_err = Some(e);
            None
        });

        let newest = match (from_db, from_kv) {
            (Some(a), Some(b)) => Some(if b.date > a.date { b } else { a }),
            (a, b) => a.or(b),
        };
        match (newest, last_err) {
            (Some(mut record), _) => {
                record.data.id = record.id.clone();
                record.data.sanitize();
                Ok(Some(record))
            }
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    async fn read_kv_record(&self, id: &str) -> StoreshotResult<Option<StoredProject>> {
        match self.kv.get(&record_key(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn list_projects(&self) -> StoreshotResult<Vec<ProjectInfo>> {
        let _ = self.database().await;
        self.read_index().await
    }

    /// Whether either tier or the index knows `id`.
    pub async fn contains(&self, id: &str) -> StoreshotResult<bool> {
        if self.read_index().await?.iter().any(|p| p.id == id) {
            return Ok(true);
        }
        Ok(self.load_project(id).await?.is_some())
    }

    pub async fn delete_project(&self, id: &str) -> StoreshotResult<()> {
        if let Some(db) = self.database().await
            && let Err(e) = db.delete(id).await
        {
            tracing::warn!(error = %e, id, "database delete failed");
        }
        self.kv.remove(&record_key(id)).await?;

        let mut index = self.read_index().await?;
        index.retain(|p| p.id != id);
        self.write_index(&index).await?;

        if self
            .load_current_project_pointer()
            .await?
            .is_some_and(|p| p.id == id)
        {
            self.save_current_project_pointer(None).await?;
        }
        tracing::info!(id, "project deleted");
        Ok(())
    }

    pub async fn save_current_project_pointer(
        &self,
        info: Option<&ProjectInfo>,
    ) -> StoreshotResult<()> {
        let _ = self.database().await;
        match info {
            Some(info) => {
                self.kv
                    .set(CURRENT_PROJECT_KEY, &serde_json::to_string(info)?)
                    .await
            }
            None => self.kv.remove(CURRENT_PROJECT_KEY).await,
        }
    }

    pub async fn load_current_project_pointer(&self) -> StoreshotResult<Option<ProjectInfo>> {
        let _ = self.database().await;
        let Some(json) = self.kv.get(CURRENT_PROJECT_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable current project pointer");
                Ok(None)
            }
        }
    }

    async fn read_index(&self) -> StoreshotResult<Vec<ProjectInfo>> {
        let Some(json) = self.kv.get(PROJECT_INDEX_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&json) {
            Ok(index) => Ok(index),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable project index");
                Ok(Vec::new())
            }
        }
    }

    async fn write_index(&self, index: &[ProjectInfo]) -> StoreshotResult<()> {
        self.kv
            .set(PROJECT_INDEX_KEY, &serde_json::to_string(index)?)
            .await
    }

    async fn upsert_index(&self, info: &ProjectInfo) -> StoreshotResult<()> {
        let index = self.read_index().await?;
        self.write_index(&upserted(&index, info)).await
    }
}

fn upserted(index: &[ProjectInfo], info: &ProjectInfo) -> Vec<ProjectInfo> {
    let mut out = index.to_vec();
    match out.iter_mut().find(|p| p.id == info.id) {
        Some(existing) => *existing = info.clone(),
        None => out.push(info.clone()),
    }
    out
}

async fn discard_database_record(db: Option<&dyn ProjectDatabase>, id: &str) {
    if let Some(db) = db
        && let Err(e) = db.delete(id).await
    {
        tracing::debug!(error = %e, id, "stale database record left behind");
    }
}

/// Screenshot entries keep their name and size but lose the image payload.
fn metadata_only(record: &StoredProject) -> StoredProject {
    let mut out = record.clone();
    for shot in &mut out.data.screenshots {
        *shot = shot.with_data_url(String::new());
    }
    out.screenshots_error = true;
    out
}
