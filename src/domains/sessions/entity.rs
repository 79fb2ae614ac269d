use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One coding-assistant session, optionally backed by a task folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub description: String,
    pub project_path: PathBuf,
    // Backing folder; None until the folder exists (creation is async and
    // deliberately lags the record insert).
    pub task_folder_path: Option<PathBuf>,
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_hidden: bool,
    pub has_been_launched: bool,
    // Id of the assistant conversation already attached to the folder, if
    // the collaborator reported one.
    pub external_conversation_id: Option<String>,
}

impl Session {
    pub fn new(name: &str, description: &str, project_path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            project_path,
            task_folder_path: None,
            group_id: None,
            created_at: now,
            last_accessed_at: now,
            is_completed: false,
            completed_at: None,
            is_hidden: false,
            has_been_launched: false,
            external_conversation_id: None,
        }
    }

    /// Case-insensitive folder identity, the dedupe key.
    pub fn folder_key(&self) -> Option<String> {
        self.task_folder_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_lowercase())
    }
}

/// A folder aggregating nested task folders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectGroup {
    pub id: String,
    pub name: String,
    pub project_path: PathBuf,
    pub sort_order: i64,
    pub is_expanded: bool,
    pub created_at: DateTime<Utc>,
}

impl ProjectGroup {
    pub fn new(name: &str, project_path: PathBuf, sort_order: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            project_path,
            sort_order,
            is_expanded: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub icon: String,
    pub category: String,
}

impl Project {
    pub fn new(name: &str, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            path,
            icon: "folder".to_string(),
            category: String::new(),
        }
    }
}
