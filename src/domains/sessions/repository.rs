use crate::{
    domains::sessions::db_groups::ProjectGroupMethods,
    domains::sessions::db_projects::ProjectMethods,
    domains::sessions::db_sessions::SessionMethods,
    domains::sessions::entity::{Project, ProjectGroup, Session},
    infrastructure::database::Database,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Registry of Session/ProjectGroup/Project records for one project.
///
/// Thin facade over the database traits; every method re-wraps errors with
/// context so callers can log a single meaningful line.
#[derive(Clone)]
pub struct Registry {
    pub db: Database,
    pub project_path: PathBuf,
}

impl Registry {
    pub fn new(db: Database, project_path: PathBuf) -> Self {
        Self { db, project_path }
    }

    pub fn sessions(&self) -> Result<Vec<Session>> {
        self.db
            .list_sessions(&self.project_path)
            .map_err(|e| anyhow!("Failed to list sessions: {e}"))
    }

    pub fn session(&self, id: &str) -> Result<Session> {
        self.db
            .get_session_by_id(id)
            .map_err(|e| anyhow!("Failed to get session '{id}': {e}"))
    }

    pub fn find_session(&self, id: &str) -> Result<Option<Session>> {
        self.db
            .find_session_by_id(id)
            .map_err(|e| anyhow!("Failed to look up session '{id}': {e}"))
    }

    /// Case-insensitive lookup by backing folder, the identity check used
    /// before importing a folder as a new session.
    pub fn find_session_by_folder(&self, folder: &Path) -> Result<Option<Session>> {
        let key = folder.to_string_lossy().to_lowercase();
        Ok(self
            .sessions()?
            .into_iter()
            .find(|s| s.folder_key().as_deref() == Some(key.as_str())))
    }

    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.db
            .create_session(session)
            .map_err(|e| anyhow!("Failed to create session '{}': {e}", session.name))
    }

    pub fn update_task_folder_path(&self, id: &str, path: Option<&Path>) -> Result<()> {
        self.db
            .update_task_folder_path(id, path)
            .map_err(|e| anyhow!("Failed to update task folder path: {e}"))
    }

    pub fn set_session_completed(&self, id: &str, completed_at: DateTime<Utc>) -> Result<()> {
        self.db
            .set_session_completed(id, completed_at)
            .map_err(|e| anyhow!("Failed to mark session completed: {e}"))
    }

    pub fn update_group_id(&self, id: &str, group_id: Option<&str>) -> Result<()> {
        self.db
            .update_group_id(id, group_id)
            .map_err(|e| anyhow!("Failed to update session group: {e}"))
    }

    pub fn set_has_been_launched(&self, id: &str, launched: bool) -> Result<()> {
        self.db
            .set_has_been_launched(id, launched)
            .map_err(|e| anyhow!("Failed to update launch flag: {e}"))
    }

    pub fn set_external_conversation_id(&self, id: &str, conversation: Option<&str>) -> Result<()> {
        self.db
            .set_external_conversation_id(id, conversation)
            .map_err(|e| anyhow!("Failed to update conversation id: {e}"))
    }

    pub fn set_session_hidden(&self, id: &str, hidden: bool) -> Result<()> {
        self.db
            .set_session_hidden(id, hidden)
            .map_err(|e| anyhow!("Failed to update hidden flag: {e}"))
    }

    pub fn update_session_name(&self, id: &str, name: &str) -> Result<()> {
        self.db
            .update_session_name(id, name)
            .map_err(|e| anyhow!("Failed to rename session: {e}"))
    }

    pub fn touch_last_accessed(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.db
            .touch_last_accessed(id, at)
            .map_err(|e| anyhow!("Failed to touch session: {e}"))
    }

    pub fn delete_sessions(&self, ids: &[String]) -> Result<usize> {
        self.db
            .delete_sessions(ids)
            .map_err(|e| anyhow!("Failed to delete sessions: {e}"))
    }

    pub fn upsert_session(&self, session: &Session) -> Result<()> {
        self.db
            .upsert_session(session)
            .map_err(|e| anyhow!("Failed to upsert session '{}': {e}", session.id))
    }

    pub fn groups(&self) -> Result<Vec<ProjectGroup>> {
        self.db
            .list_groups(&self.project_path)
            .map_err(|e| anyhow!("Failed to list project groups: {e}"))
    }

    pub fn find_group(&self, id: &str) -> Result<Option<ProjectGroup>> {
        self.db
            .find_group_by_id(id)
            .map_err(|e| anyhow!("Failed to look up group '{id}': {e}"))
    }

    pub fn create_group(&self, group: &ProjectGroup) -> Result<()> {
        self.db
            .create_group(group)
            .map_err(|e| anyhow!("Failed to create group '{}': {e}", group.name))
    }

    pub fn next_group_sort_order(&self) -> Result<i64> {
        self.db
            .next_sort_order(&self.project_path)
            .map_err(|e| anyhow!("Failed to compute group sort order: {e}"))
    }

    pub fn set_group_expanded(&self, id: &str, expanded: bool) -> Result<()> {
        self.db
            .set_group_expanded(id, expanded)
            .map_err(|e| anyhow!("Failed to update group expansion: {e}"))
    }

    pub fn delete_groups(&self, ids: &[String]) -> Result<usize> {
        self.db
            .delete_groups(ids)
            .map_err(|e| anyhow!("Failed to delete groups: {e}"))
    }

    pub fn clear_group_references(&self, group_id: &str) -> Result<usize> {
        self.db
            .clear_group_references(group_id)
            .map_err(|e| anyhow!("Failed to detach sessions from group: {e}"))
    }

    pub fn upsert_group(&self, group: &ProjectGroup) -> Result<()> {
        self.db
            .upsert_group(group)
            .map_err(|e| anyhow!("Failed to upsert group '{}': {e}", group.id))
    }

    pub fn projects(&self) -> Result<Vec<Project>> {
        self.db
            .list_projects()
            .map_err(|e| anyhow!("Failed to list projects: {e}"))
    }

    pub fn upsert_project(&self, project: &Project) -> Result<()> {
        self.db
            .upsert_project(project)
            .map_err(|e| anyhow!("Failed to upsert project '{}': {e}", project.id))
    }
}
