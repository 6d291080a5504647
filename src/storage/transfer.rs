use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::model::project::Project;
use crate::storage::gateway::{PersistenceGateway, SaveOutcome};

pub const IMPORTED_SUFFIX: &str = " (Imported)";

/// Project exchange file: `{id, name, date, data}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub data: Project,
}

#[derive(Clone, Debug)]
pub struct ImportOutcome {
    pub project: Project,
    pub save: SaveOutcome,
    /// The file's id was already taken and a fresh one was assigned.
    pub reassigned_id: bool,
}

pub async fn export_project_json(gateway: &PersistenceGateway, id: &str) -> StoreshotResult<String> {
    let record = gateway
        .load_project(id)
        .await?
        .ok_or_else(|| StoreshotError::validation(format!("project '{id}' not found")))?;
    let file = ProjectFile {
        id: record.id,
        name: record.name,
        date: record.date,
        data: record.data,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Validate and store an exported project file, making it the current project.
///
/// Nothing is written when the file is rejected.
#[tracing::instrument(skip_all)]
pub async fn import_project_json(
    gateway: &PersistenceGateway,
    json: &str,
) -> StoreshotResult<ImportOutcome> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| StoreshotError::validation(format!("project file is not valid JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| StoreshotError::validation("project file must be a JSON object"))?;

    let id = required_str(obj, "id")?;
    let name = required_str(obj, "name")?;
    let data = obj
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| StoreshotError::validation("project file is missing `data`"))?;

    let mut project: Project = serde_json::from_value(data.clone())
        .map_err(|e| StoreshotError::validation(format!("project data is malformed: {e}")))?;
    project.sanitize();
    project
        .validate()
        .map_err(|e| StoreshotError::validation(format!("imported project is invalid: {e}")))?;

    let reassigned_id = gateway.contains(id).await?;
    let id = if reassigned_id {
        uuid::Uuid::new_v4().to_string()
    } else {
        id.to_owned()
    };
    let name = format!("{name}{IMPORTED_SUFFIX}");
    project.id = id.clone();
    project.name = name.clone();

    let save = gateway.save_project(&id, &name, &project).await?;
    gateway.save_current_project_pointer(Some(&save.info)).await?;
    project.last_saved = Some(save.info.date);
    tracing::info!(%id, reassigned_id, "project imported");
    Ok(ImportOutcome {
        project,
        save,
        reassigned_id,
    })
}

fn required_str<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> StoreshotResult<&'a str> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StoreshotError::validation(format!("project file is missing `{key}`")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::StorageConfig;
    use crate::model::device::{DeviceType, Orientation};
    use crate::storage::database::MemoryDatabase;
    use crate::storage::kv::MemoryKvStore;

    fn gateway() -> PersistenceGateway {
        PersistenceGateway::with_database(
            Arc::new(MemoryDatabase::new()),
            Arc::new(MemoryKvStore::new(1 << 20)),
            StorageConfig::default(),
        )
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_store() {
        let source = gateway();
        let mut p = Project::new("demo", DeviceType::Ipad, Orientation::Landscape);
        p.update_setting("rotation", json!(-4)).unwrap();
        source.save_project("p1", "Demo", &p).await.unwrap();
        let file = export_project_json(&source, "p1").await.unwrap();
        assert!(file.contains("\n  \"id\": \"p1\""));

        let target = gateway();
        let out = import_project_json(&target, &file).await.unwrap();
        assert!(!out.reassigned_id);
        assert_eq!(out.save.info.id, "p1");
        assert_eq!(out.save.info.name, "Demo (Imported)");
        assert_eq!(out.project.preview_settings[0].rotation, -4.0);
        assert_eq!(
            target.load_current_project_pointer().await.unwrap(),
            Some(out.save.info.clone())
        );
    }

    #[tokio::test]
    async fn colliding_id_gets_fresh_uuid() {
        let gw = gateway();
        let p = Project::new("demo", DeviceType::Iphone, Orientation::Portrait);
        gw.save_project("p1", "Demo", &p).await.unwrap();
        let file = export_project_json(&gw, "p1").await.unwrap();

        let out = import_project_json(&gw, &file).await.unwrap();
        assert!(out.reassigned_id);
        assert_ne!(out.save.info.id, "p1");
        assert!(uuid::Uuid::parse_str(&out.save.info.id).is_ok());
        assert_eq!(gw.list_projects().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_fields_get_defaults() {
        let gw = gateway();
        let file = json!({
            "id": "bare",
            "name": "Bare",
            "date": "2024-01-01T00:00:00Z",
            "data": { "deviceType": "ipad", "previewSettings": [] }
        });
        let out = import_project_json(&gw, &file.to_string()).await.unwrap();
        assert!(out.project.screenshots.is_empty());
        assert_eq!(out.project.preview_settings.len(), 1);
        assert_eq!(out.project.device_type, DeviceType::Ipad);
    }

    #[tokio::test]
    async fn image_less_export_imports_cleanly() {
        let gw = gateway();
        let file = json!({
            "id": "lean",
            "name": "Lean",
            "date": "2024-01-01T00:00:00Z",
            "data": {
                "deviceType": "iphone",
                "screenshots": [{ "name": "home.png", "src": "", "width": 1179, "height": 2556 }],
                "previewSettings": [{ "screenshotIndex": 0 }]
            }
        });
        let out = import_project_json(&gw, &file.to_string()).await.unwrap();
        assert!(out.save.screenshots_error);
        let stored = gw.load_project("lean").await.unwrap().unwrap();
        assert_eq!(stored.data.screenshots[0].name, "home.png");
        assert_eq!(stored.data.preview_settings[0].screenshot_index, 0);
    }

    #[tokio::test]
    async fn malformed_files_are_rejected_without_writes() {
        let gw = gateway();
        for (file, needle) in [
            (json!({ "name": "x", "data": {} }), "`id`"),
            (json!({ "id": "x", "data": {} }), "`name`"),
            (json!({ "id": "x", "name": "x" }), "`data`"),
            (json!({ "id": "x", "name": "x", "data": 3 }), "`data`"),
        ] {
            let err = import_project_json(&gw, &file.to_string()).await.unwrap_err();
            assert!(matches!(err, StoreshotError::Validation(_)));
            assert!(err.to_string().contains(needle), "{err}");
        }
        assert!(matches!(
            import_project_json(&gw, "[1, 2").await,
            Err(StoreshotError::Validation(_))
        ));
        assert!(gw.list_projects().await.unwrap().is_empty());
        assert!(gw.load_current_project_pointer().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exporting_unknown_project_fails() {
        assert!(matches!(
            export_project_json(&gateway(), "nope").await,
            Err(StoreshotError::Validation(_))
        ));
    }
}
