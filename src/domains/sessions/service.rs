use crate::{
    domains::folders::FolderStore,
    domains::sessions::entity::{ProjectGroup, Session},
    domains::sessions::repository::Registry,
};
use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{info, warn};

/// Direct user actions on sessions: create, rename, complete, hide, record
/// progress. Reconciliation owns every other status/path mutation.
pub struct SessionService {
    registry: Registry,
    store: FolderStore,
}

impl SessionService {
    pub fn new(registry: Registry, store: FolderStore) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &FolderStore {
        &self.store
    }

    /// Create the record first, then the backing folder. The record insert
    /// is deliberately not transactional with folder creation so a
    /// dependent process can start against the folder path immediately; if
    /// folder creation fails the path reference is cleared and the
    /// reconciler's grace period takes over.
    pub fn create_session(
        &self,
        name: &str,
        description: &str,
        group: Option<&ProjectGroup>,
    ) -> Result<Session> {
        let mut session = Session::new(name, description, self.store.project_path().to_path_buf());
        let group_name = group.map(|g| g.name.as_str());
        session.task_folder_path = Some(self.store.task_path(group_name, name));
        session.group_id = group.map(|g| g.id.clone());
        self.registry.create_session(&session)?;

        match self.store.create_task(name, description, group_name) {
            Ok(folder) => {
                session.task_folder_path = Some(folder);
                info!("Created session '{name}'");
                Ok(session)
            }
            Err(e) => {
                warn!("Folder creation for session '{name}' failed: {e}");
                self.registry.update_task_folder_path(&session.id, None)?;
                Err(e)
            }
        }
    }

    pub fn create_group(&self, name: &str, description: &str) -> Result<ProjectGroup> {
        let sort_order = self.registry.next_group_sort_order()?;
        let group = ProjectGroup::new(name, self.store.project_path().to_path_buf(), sort_order);
        self.registry.create_group(&group)?;
        self.store.create_project(name, description)?;
        info!("Created project group '{name}'");
        Ok(group)
    }

    pub fn rename_session(&self, id: &str, new_name: &str) -> Result<Session> {
        let session = self.registry.session(id)?;
        if let Some(folder) = &session.task_folder_path {
            let renamed = self.store.rename_task(folder, new_name)?;
            self.registry.update_task_folder_path(id, Some(&renamed))?;
        }
        self.registry.update_session_name(id, new_name)?;
        self.registry.session(id)
    }

    /// Move the backing folder under `completed/` and flip the record. The
    /// folder move is what makes the completion stick across devices; the
    /// flag alone would be undone by the next validate pass.
    pub fn complete_session(&self, id: &str) -> Result<Session> {
        let session = self.registry.session(id)?;
        if session.is_completed {
            return Ok(session);
        }

        if let Some(folder) = &session.task_folder_path {
            if folder.exists() && !self.store.is_under_completed(folder) {
                let moved = self.store.move_to_completed(folder)?;
                self.registry.update_task_folder_path(id, Some(&moved))?;
            }
        }

        self.registry.set_session_completed(id, Utc::now())?;
        info!("Completed session '{}'", session.name);
        self.registry.session(id)
    }

    pub fn hide_session(&self, id: &str, hidden: bool) -> Result<()> {
        self.registry.set_session_hidden(id, hidden)
    }

    pub fn record_progress(&self, id: &str, body: &str, duration: Option<&str>) -> Result<()> {
        let session = self.registry.session(id)?;
        let Some(folder) = &session.task_folder_path else {
            warn!("Session '{}' has no task folder; progress not recorded", session.name);
            return Ok(());
        };
        if !self.store.append_progress(folder, body, duration)? {
            warn!("No TASK.md under {}; progress not recorded", folder.display());
        }
        self.registry.touch_last_accessed(id, Utc::now())
    }

    /// Called when the assistant CLI is launched against the session's
    /// folder. Pins the conversation id when the collaborator knows one.
    pub fn mark_launched(&self, id: &str, conversation_id: Option<&str>) -> Result<()> {
        self.registry.set_has_been_launched(id, true)?;
        if conversation_id.is_some() {
            self.registry
                .set_external_conversation_id(id, conversation_id)?;
        }
        self.registry.touch_last_accessed(id, Utc::now())
    }

    pub fn group_by_id(&self, id: &str) -> Result<ProjectGroup> {
        self.registry
            .find_group(id)?
            .ok_or_else(|| anyhow!("project group not found: {id}"))
    }
}
