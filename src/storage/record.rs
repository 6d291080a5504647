use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::project::Project;

/// A persisted project as written to either storage tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProject {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub data: Project,
    /// Images were dropped to fit the project into storage.
    #[serde(default)]
    pub screenshots_error: bool,
}

impl StoredProject {
    pub fn info(&self) -> ProjectInfo {
        ProjectInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            date: self.date,
        }
    }
}

/// Project index entry, also used as the current-project pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub name: String,
    #[serde(alias = "lastSaved")]
    pub date: DateTime<Utc>,
}
