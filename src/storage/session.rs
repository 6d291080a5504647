use std::sync::Arc;

use crate::foundation::error::{StoreshotError, StoreshotResult};
use crate::model::device::{DeviceType, Orientation};
use crate::model::project::Project;
use crate::storage::gateway::{PersistenceGateway, SaveOutcome};
use crate::storage::record::{ProjectInfo, StoredProject};

/// The project being edited, the stored project it belongs to, and whether it has unsaved edits.
pub struct ProjectSession {
    gateway: Arc<PersistenceGateway>,
    project: Project,
    current: Option<ProjectInfo>,
    dirty: bool,
}

impl ProjectSession {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            gateway,
            project: Project::default(),
            current: None,
            dirty: false,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn current(&self) -> Option<&ProjectInfo> {
        self.current.as_ref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Reopen the project named by the current-project pointer.
    ///
    /// Returns `false` when there is no pointer or its project is gone; a dangling pointer is
    /// cleared.
    pub async fn restore(&mut self) -> StoreshotResult<bool> {
        let Some(info) = self.gateway.load_current_project_pointer().await? else {
            return Ok(false);
        };
        match self.gateway.load_project(&info.id).await? {
            Some(record) => {
                self.adopt(record);
                Ok(true)
            }
            None => {
                tracing::warn!(id = %info.id, "current project no longer exists");
                self.gateway.save_current_project_pointer(None).await?;
                Ok(false)
            }
        }
    }

    pub async fn open(&mut self, id: &str) -> StoreshotResult<()> {
        let record = self
            .gateway
            .load_project(id)
            .await?
            .ok_or_else(|| StoreshotError::validation(format!("project '{id}' not found")))?;
        self.gateway
            .save_current_project_pointer(Some(&record.info()))
            .await?;
        self.adopt(record);
        Ok(())
    }

    /// Start an unsaved project; the current pointer is left alone until the first save.
    pub fn start_new(&mut self, name: &str, device_type: DeviceType, orientation: Orientation) {
        self.project = Project::new(name, device_type, orientation);
        self.current = None;
        self.dirty = true;
    }

    /// Replace the in-memory project wholesale, for example after an import.
    pub fn replace(&mut self, project: Project, current: Option<ProjectInfo>) {
        self.project = project;
        self.current = current;
        self.dirty = false;
    }

    /// Apply an edit. A failed edit leaves the project untouched.
    pub fn mutate<T>(
        &mut self,
        edit: impl FnOnce(&mut Project) -> StoreshotResult<T>,
    ) -> StoreshotResult<T> {
        let mut next = self.project.clone();
        let out = edit(&mut next)?;
        next.validate()?;
        self.project = next;
        self.dirty = true;
        Ok(out)
    }

    /// Save under the current project's id and name.
    pub async fn save(&mut self) -> StoreshotResult<SaveOutcome> {
        let info = self.current.clone().ok_or_else(|| {
            StoreshotError::validation("project has never been saved; save it under a name first")
        })?;
        self.persist(&info.id, &info.name).await
    }

    /// Save as a new stored project with a fresh id.
    pub async fn save_as(&mut self, name: &str) -> StoreshotResult<SaveOutcome> {
        let id = uuid::Uuid::new_v4().to_string();
        self.persist(&id, name).await
    }

    async fn persist(&mut self, id: &str, name: &str) -> StoreshotResult<SaveOutcome> {
        let outcome = self.gateway.save_project(id, name, &self.project).await?;
        self.gateway
            .save_current_project_pointer(Some(&outcome.info))
            .await?;
        self.project.id = outcome.info.id.clone();
        self.project.name = outcome.info.name.clone();
        self.project.last_saved = Some(outcome.info.date);
        self.current = Some(outcome.info.clone());
        self.dirty = false;
        Ok(outcome)
    }

    fn adopt(&mut self, record: StoredProject) {
        let info = record.info();
        let mut project = record.data;
        for shot in project.screenshots.iter_mut().filter(|s| s.has_image_data()) {
            if let Err(e) = shot.attach_pixels() {
                tracing::warn!(name = %shot.name, error = %e, "stored screenshot is unreadable");
            }
        }
        self.project = project;
        self.current = Some(info);
        self.dirty = false;
    }
}
