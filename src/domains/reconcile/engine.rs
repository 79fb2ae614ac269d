use crate::{
    collaborator::ConversationLookup,
    domains::folders::slug::{has_numeric_prefix, slugify},
    domains::folders::FolderStore,
    domains::reconcile::snapshot::FsSnapshot,
    domains::sessions::entity::{ProjectGroup, Session},
    domains::sessions::repository::Registry,
};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Window during which a session missing its backing folder is left alone:
/// the folder is created after the record, asynchronously, so a pass landing
/// inside this window must not orphan the record.
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 30;

/// What one reconciliation run did, per pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub sessions_linked: usize,
    pub sessions_completed: usize,
    pub orphans_deleted: usize,
    pub groups_deleted: usize,
    pub duplicates_deleted: usize,
    pub groups_created: usize,
    pub sessions_grouped: usize,
    pub project_sessions_created: usize,
    pub sessions_imported: usize,
}

impl ReconcileReport {
    pub fn changes(&self) -> usize {
        self.sessions_linked
            + self.sessions_completed
            + self.orphans_deleted
            + self.groups_deleted
            + self.duplicates_deleted
            + self.groups_created
            + self.sessions_grouped
            + self.project_sessions_created
            + self.sessions_imported
    }
}

/// Outcome of the validate pass for one session. Computed purely from
/// (record, snapshot, now); the engine applies it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionResolution {
    /// Nothing to do, or still inside the grace period.
    Untouched,
    /// Record had no path (or a stale one) and a live folder matched.
    AttachActive { folder: PathBuf },
    /// Folder found under `completed/`; relink and mark completed.
    AttachCompleted { folder: PathBuf },
    /// Recorded path itself now resolves under `completed/`.
    MarkCompleted,
    /// Folder confirmed absent past the grace period.
    Orphaned,
}

pub fn resolve_session(
    session: &Session,
    snapshot: &FsSnapshot,
    store: &FolderStore,
    now: DateTime<Utc>,
    grace_period: Duration,
) -> SessionResolution {
    let grace_expired = now.signed_duration_since(session.created_at) > grace_period;

    match &session.task_folder_path {
        None => {
            let slug = slugify(&session.name);
            if let Some(folder) = snapshot.completed_folder(&slug) {
                return SessionResolution::AttachCompleted {
                    folder: folder.clone(),
                };
            }
            if let Some(folder) = snapshot.active.get(&slug) {
                return SessionResolution::AttachActive {
                    folder: folder.clone(),
                };
            }
            if grace_expired {
                SessionResolution::Orphaned
            } else {
                SessionResolution::Untouched
            }
        }
        Some(path) => {
            if path.exists() {
                if store.is_under_completed(path) {
                    return SessionResolution::MarkCompleted;
                }
                return SessionResolution::Untouched;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(folder) = snapshot.completed_folder(name) {
                    return SessionResolution::AttachCompleted {
                        folder: folder.clone(),
                    };
                }
            }
            if grace_expired {
                SessionResolution::Orphaned
            } else {
                SessionResolution::Untouched
            }
        }
    }
}

/// Brings the registry into agreement with the `tasks/` tree for one
/// project. Six ordered passes, each depending on invariants established by
/// the previous one; the whole pipeline is idempotent and reruns from
/// scratch on every trigger.
pub struct ReconciliationEngine {
    registry: Registry,
    store: FolderStore,
    conversations: Arc<dyn ConversationLookup>,
    grace_period: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        registry: Registry,
        store: FolderStore,
        conversations: Arc<dyn ConversationLookup>,
    ) -> Self {
        Self {
            registry,
            store,
            conversations,
            grace_period: Duration::seconds(DEFAULT_GRACE_PERIOD_SECS),
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let now = Utc::now();
        let mut report = ReconcileReport::default();

        let snapshot = FsSnapshot::scan(&self.store)?;
        self.validate_filesystem(&snapshot, now, &mut report)?;
        self.cleanup_duplicate_sessions(&mut report)?;
        self.discover_project_groups(&snapshot, &mut report)?;
        self.relink_sessions_to_groups(&mut report)?;
        self.ensure_project_sessions(&mut report)?;
        self.import_tasks(now, &mut report)?;

        if report.changes() > 0 {
            info!(
                "Reconciled {}: {report:?}",
                self.registry.project_path.display()
            );
        } else {
            debug!("Reconciled {}: no changes", self.registry.project_path.display());
        }
        Ok(report)
    }

    /// Pass 1: resolve every non-completed session and every group against
    /// the tree. Deletions are collected and applied as one batch at the
    /// end of the pass.
    pub fn validate_filesystem(
        &self,
        snapshot: &FsSnapshot,
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let mut orphaned_sessions: Vec<String> = Vec::new();

        for session in self.registry.sessions()? {
            if session.is_completed {
                continue;
            }
            match resolve_session(&session, snapshot, &self.store, now, self.grace_period) {
                SessionResolution::Untouched => {}
                SessionResolution::AttachActive { folder } => {
                    debug!("Linking session '{}' to {}", session.name, folder.display());
                    self.registry
                        .update_task_folder_path(&session.id, Some(&folder))?;
                    report.sessions_linked += 1;
                }
                SessionResolution::AttachCompleted { folder } => {
                    info!(
                        "Session '{}' found under completed/, relinking",
                        session.name
                    );
                    self.registry
                        .update_task_folder_path(&session.id, Some(&folder))?;
                    self.registry.set_session_completed(&session.id, now)?;
                    report.sessions_completed += 1;
                }
                SessionResolution::MarkCompleted => {
                    self.registry.set_session_completed(&session.id, now)?;
                    report.sessions_completed += 1;
                }
                SessionResolution::Orphaned => {
                    info!(
                        "Session '{}' has no backing folder past the grace period, deleting",
                        session.name
                    );
                    orphaned_sessions.push(session.id);
                }
            }
        }

        let mut doomed_groups: Vec<String> = Vec::new();
        for group in self.registry.groups()? {
            let folder = self.store.group_path(&group.name);
            if !folder.exists() {
                if now.signed_duration_since(group.created_at) > self.grace_period {
                    info!("Group '{}' folder is gone, deleting group", group.name);
                    doomed_groups.push(group.id);
                }
                continue;
            }
            if let Some(doc) = self.store.read_task(&folder)? {
                if !doc.is_project {
                    // The folder degraded into an ordinary task; drop the
                    // group record and let the import pass pick the folder up.
                    info!(
                        "Group '{}' folder lost its project marker, deleting group record",
                        group.name
                    );
                    doomed_groups.push(group.id);
                }
            }
        }

        for group_id in &doomed_groups {
            let detached = self.registry.clear_group_references(group_id)?;
            if detached > 0 {
                debug!("Detached {detached} session(s) from group {group_id}");
            }
        }
        report.groups_deleted += self.registry.delete_groups(&doomed_groups)?;
        report.orphans_deleted += self.registry.delete_sessions(&orphaned_sessions)?;
        Ok(())
    }

    /// Pass 2: collapse sessions sharing a backing folder down to one.
    pub fn cleanup_duplicate_sessions(&self, report: &mut ReconcileReport) -> Result<()> {
        let mut by_folder: HashMap<String, Vec<Session>> = HashMap::new();
        for session in self.registry.sessions()? {
            if let Some(key) = session.folder_key() {
                by_folder.entry(key).or_default().push(session);
            }
        }

        let mut doomed: Vec<String> = Vec::new();
        for (folder, mut sessions) in by_folder {
            if sessions.len() < 2 {
                continue;
            }
            sessions.sort_by(|a, b| {
                b.group_id
                    .is_some()
                    .cmp(&a.group_id.is_some())
                    .then(b.has_been_launched.cmp(&a.has_been_launched))
                    .then(a.created_at.cmp(&b.created_at))
            });
            let survivor = &sessions[0];
            warn!(
                "{} sessions share folder {folder}; keeping '{}'",
                sessions.len(),
                survivor.name
            );
            doomed.extend(sessions.iter().skip(1).map(|s| s.id.clone()));
        }

        report.duplicates_deleted += self.registry.delete_sessions(&doomed)?;
        Ok(())
    }

    /// Pass 3: register groups for folders that look like groups.
    pub fn discover_project_groups(
        &self,
        snapshot: &FsSnapshot,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let existing: HashSet<String> = self
            .registry
            .groups()?
            .iter()
            .map(|g| slugify(&g.name))
            .collect();

        for candidate in &snapshot.group_candidates {
            if has_numeric_prefix(&candidate.name) {
                continue;
            }
            // A folder with its own TASK.md is a group only when the file
            // says so; without one, nested task folders imply a group.
            let is_group = if candidate.has_own_task_file {
                candidate.has_project_marker
            } else {
                candidate.child_task_count > 0
            };
            if !is_group || existing.contains(&candidate.name) {
                continue;
            }

            // Only trust the document title when it slugs back to the
            // folder name, otherwise the group would point at a folder that
            // does not exist.
            let name = candidate
                .title
                .as_ref()
                .filter(|title| slugify(title) == candidate.name)
                .cloned()
                .unwrap_or_else(|| candidate.name.clone());

            let sort_order = self.registry.next_group_sort_order()?;
            let group = ProjectGroup::new(&name, self.registry.project_path.clone(), sort_order);
            info!("Discovered project group '{name}'");
            self.registry.create_group(&group)?;
            report.groups_created += 1;
        }
        Ok(())
    }

    /// Pass 4: attach groupless sessions whose parent folder is a group.
    pub fn relink_sessions_to_groups(&self, report: &mut ReconcileReport) -> Result<()> {
        let groups_by_slug: HashMap<String, String> = self
            .registry
            .groups()?
            .into_iter()
            .map(|g| (slugify(&g.name), g.id))
            .collect();
        let tasks_root = self.store.tasks_root();

        for session in self.registry.sessions()? {
            if session.group_id.is_some() {
                continue;
            }
            let Some(path) = &session.task_folder_path else {
                continue;
            };
            if self.store.is_under_completed(path) {
                continue;
            }
            let Some(parent) = path.parent().filter(|p| *p != tasks_root) else {
                continue;
            };
            let Some(parent_name) = parent.file_name().map(|n| n.to_string_lossy().to_string())
            else {
                continue;
            };
            if let Some(group_id) = groups_by_slug.get(&parent_name) {
                debug!("Attaching session '{}' to group {parent_name}", session.name);
                self.registry
                    .update_group_id(&session.id, Some(group_id))?;
                report.sessions_grouped += 1;
            }
        }
        Ok(())
    }

    /// Pass 5: every group owns exactly one session for its own folder.
    pub fn ensure_project_sessions(&self, report: &mut ReconcileReport) -> Result<()> {
        let session_folders: HashSet<String> = self
            .registry
            .sessions()?
            .iter()
            .filter_map(Session::folder_key)
            .collect();

        for group in self.registry.groups()? {
            let folder = self.store.group_path(&group.name);
            let key = folder.to_string_lossy().to_lowercase();
            if session_folders.contains(&key) {
                continue;
            }

            self.store.create_project(&group.name, "")?;
            let description = self
                .store
                .read_task(&folder)?
                .and_then(|doc| doc.description)
                .unwrap_or_default();

            let mut session = Session::new(
                &group.name,
                &description,
                self.registry.project_path.clone(),
            );
            session.task_folder_path = Some(folder);
            info!("Created project session for group '{}'", group.name);
            self.registry.create_session(&session)?;
            report.project_sessions_created += 1;
        }
        Ok(())
    }

    /// Pass 6: turn unclaimed task folders into sessions. The tree is
    /// rescanned because earlier passes may have created folders.
    pub fn import_tasks(&self, now: DateTime<Utc>, report: &mut ReconcileReport) -> Result<()> {
        let snapshot = FsSnapshot::scan(&self.store)?;
        let groups_by_slug: HashMap<String, String> = self
            .registry
            .groups()?
            .into_iter()
            .map(|g| (slugify(&g.name), g.id))
            .collect();
        let mut claimed: HashSet<String> = self
            .registry
            .sessions()?
            .iter()
            .filter_map(Session::folder_key)
            .collect();

        for task in &snapshot.task_folders {
            let key = task.path.to_string_lossy().to_lowercase();
            if claimed.contains(&key) {
                continue;
            }
            // Concurrent imports race on folder identity; check the
            // registry one more time right before the insert.
            if self.registry.find_session_by_folder(&task.path)?.is_some() {
                continue;
            }

            let name = task.doc.title.clone().unwrap_or_else(|| task.name.clone());
            let description = task.doc.description.clone().unwrap_or_default();
            let mut session =
                Session::new(&name, &description, self.registry.project_path.clone());
            session.task_folder_path = Some(task.path.clone());
            if task.doc.is_done() {
                session.is_completed = true;
                session.completed_at = Some(now);
            }
            session.has_been_launched = self.conversations.has_conversation(&task.path);
            session.external_conversation_id = self.conversations.conversation_id(&task.path);
            if let Some(parent) = &task.parent_name {
                session.group_id = groups_by_slug.get(parent).cloned();
            }

            info!("Imported task folder {} as '{name}'", task.path.display());
            self.registry.create_session(&session)?;
            claimed.insert(key);
            report.sessions_imported += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::NoConversations;
    use crate::domains::folders::task_file::TASK_FILE_NAME;
    use crate::domains::sessions::service::SessionService;
    use crate::infrastructure::database::Database;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Harness {
        engine: ReconciliationEngine,
        service: SessionService,
        registry: Registry,
        store: FolderStore,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        harness_with(Arc::new(NoConversations))
    }

    fn harness_with(conversations: Arc<dyn ConversationLookup>) -> Harness {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("acme");
        fs::create_dir_all(&project).unwrap();
        let db = Database::new(Some(dir.path().join("test.db"))).unwrap();
        let registry = Registry::new(db, project.clone());
        let store = FolderStore::new(project);
        Harness {
            engine: ReconciliationEngine::new(registry.clone(), store.clone(), conversations),
            service: SessionService::new(registry.clone(), store.clone()),
            registry,
            store,
            _dir: dir,
        }
    }

    fn mkdir_with_task(root: &Path, rel: &str, content: &str) {
        let folder = root.join(rel);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(TASK_FILE_NAME), content).unwrap();
    }

    fn backdated_session(name: &str, project: &Path, age_secs: i64) -> Session {
        let mut session = Session::new(name, "", project.to_path_buf());
        session.created_at = Utc::now() - Duration::seconds(age_secs);
        session
    }

    #[test]
    fn scenario_a_grace_then_link_without_identity_change() {
        let h = harness();

        // record inserted, folder creation still in flight
        let session = Session::new("Fix bug", "", h.store.project_path().to_path_buf());
        h.registry.create_session(&session).unwrap();

        h.engine.reconcile().unwrap();
        let retained = h.registry.find_session(&session.id).unwrap();
        assert!(retained.is_some(), "session deleted inside grace period");

        // the folder appears; next pass resolves the path, same identity
        mkdir_with_task(&h.store.tasks_root(), "fix-bug", "# Fix bug\n");
        h.engine.reconcile().unwrap();

        let resolved = h.registry.session(&session.id).unwrap();
        assert_eq!(
            resolved.task_folder_path.as_deref(),
            Some(h.store.tasks_root().join("fix-bug").as_path())
        );
        assert_eq!(h.registry.sessions().unwrap().len(), 1, "no duplicate imported");
    }

    #[test]
    fn grace_period_boundary() {
        let h = harness();
        let project = h.store.project_path().to_path_buf();

        let young = backdated_session("young", &project, 5);
        let expired = backdated_session("expired", &project, 31);
        h.registry.create_session(&young).unwrap();
        h.registry.create_session(&expired).unwrap();

        h.engine.reconcile().unwrap();

        assert!(h.registry.find_session(&young.id).unwrap().is_some());
        assert!(h.registry.find_session(&expired.id).unwrap().is_none());
    }

    #[test]
    fn missing_folder_with_recorded_path_orphans_after_grace() {
        let h = harness();
        let mut session = backdated_session("gone", h.store.project_path(), 60);
        session.task_folder_path = Some(h.store.tasks_root().join("gone"));
        h.registry.create_session(&session).unwrap();

        h.engine.reconcile().unwrap();
        assert!(h.registry.find_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn scenario_b_dedupe_keeps_launched_session() {
        let h = harness();
        mkdir_with_task(&h.store.tasks_root(), "fix-bug", "# Fix bug\n");
        let folder = h.store.tasks_root().join("fix-bug");

        let mut a = Session::new("Fix bug", "", h.store.project_path().to_path_buf());
        a.task_folder_path = Some(folder.clone());
        let mut b = Session::new("Fix bug copy", "", h.store.project_path().to_path_buf());
        b.task_folder_path = Some(folder);
        b.has_been_launched = true;
        h.registry.create_session(&a).unwrap();
        h.registry.create_session(&b).unwrap();

        h.engine.reconcile().unwrap();

        let survivors = h.registry.sessions().unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id, b.id);
    }

    #[test]
    fn dedupe_priority_group_beats_launched_beats_age() {
        let h = harness();
        mkdir_with_task(&h.store.tasks_root(), "task", "# Task\n");
        let folder = h.store.tasks_root().join("task");
        let project = h.store.project_path().to_path_buf();

        let mut oldest = backdated_session("oldest", &project, 20);
        oldest.task_folder_path = Some(folder.clone());
        let mut launched = Session::new("launched", "", project.clone());
        launched.task_folder_path = Some(folder.clone());
        launched.has_been_launched = true;
        let mut grouped = Session::new("grouped", "", project.clone());
        grouped.task_folder_path = Some(folder.clone());
        grouped.group_id = Some("g1".to_string());

        for s in [&oldest, &launched, &grouped] {
            h.registry.create_session(s).unwrap();
        }

        let mut report = ReconcileReport::default();
        h.engine.cleanup_duplicate_sessions(&mut report).unwrap();
        assert_eq!(report.duplicates_deleted, 2);

        let survivors = h.registry.sessions().unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id, grouped.id);
    }

    #[test]
    fn scenario_c_external_move_to_completed() {
        let h = harness();
        let session = h.service.create_session("Fix bug", "", None).unwrap();
        let folder = session.task_folder_path.clone().unwrap();

        // another device moved the folder under completed/
        fs::create_dir_all(h.store.completed_root()).unwrap();
        fs::rename(&folder, h.store.completed_root().join("fix-bug")).unwrap();

        h.engine.reconcile().unwrap();

        let updated = h.registry.session(&session.id).unwrap();
        assert!(updated.is_completed);
        assert_eq!(
            updated.task_folder_path.as_deref(),
            Some(h.store.completed_root().join("fix-bug").as_path())
        );
    }

    #[test]
    fn completed_match_strips_numeric_prefix() {
        let h = harness();
        let mut session = Session::new("Fix bug", "", h.store.project_path().to_path_buf());
        session.task_folder_path = Some(h.store.tasks_root().join("fix-bug"));
        h.registry.create_session(&session).unwrap();

        mkdir_with_task(&h.store.tasks_root(), "completed/02-fix-bug", "# Fix bug\n");

        h.engine.reconcile().unwrap();
        let updated = h.registry.session(&session.id).unwrap();
        assert!(updated.is_completed);
        assert_eq!(
            updated.task_folder_path.as_deref(),
            Some(h.store.completed_root().join("02-fix-bug").as_path())
        );
    }

    #[test]
    fn pathless_session_matching_completed_folder_is_attached() {
        let h = harness();
        let session = Session::new("Fix bug", "", h.store.project_path().to_path_buf());
        h.registry.create_session(&session).unwrap();
        mkdir_with_task(&h.store.tasks_root(), "completed/fix-bug", "# Fix bug\n");

        h.engine.reconcile().unwrap();
        let updated = h.registry.session(&session.id).unwrap();
        assert!(updated.is_completed);
        assert!(updated.task_folder_path.is_some());
    }

    #[test]
    fn scenario_d_discovery_and_relink() {
        let h = harness();
        let tasks = h.store.tasks_root();
        mkdir_with_task(&tasks, "marketing/landing-page", "# Landing page\n");
        mkdir_with_task(&tasks, "marketing/newsletter", "# Newsletter\n");

        // an orphaned session already points under the group folder
        let mut orphan = Session::new(
            "Landing page",
            "",
            h.store.project_path().to_path_buf(),
        );
        orphan.task_folder_path = Some(tasks.join("marketing").join("landing-page"));
        h.registry.create_session(&orphan).unwrap();

        h.engine.reconcile().unwrap();

        let groups = h.registry.groups().unwrap();
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.name, "marketing");
        assert_eq!(group.sort_order, 1);

        let relinked = h.registry.session(&orphan.id).unwrap();
        assert_eq!(relinked.group_id.as_deref(), Some(group.id.as_str()));

        // the group folder itself gained a project session, the second
        // child was imported and attached
        let sessions = h.registry.sessions().unwrap();
        let project_session = sessions
            .iter()
            .find(|s| s.task_folder_path.as_deref() == Some(tasks.join("marketing").as_path()))
            .expect("project session missing");
        assert_eq!(project_session.name, "marketing");

        let imported = sessions
            .iter()
            .find(|s| s.name == "Newsletter")
            .expect("child task not imported");
        assert_eq!(imported.group_id.as_deref(), Some(group.id.as_str()));
    }

    #[test]
    fn numeric_prefixed_folder_is_not_a_group() {
        let h = harness();
        mkdir_with_task(&h.store.tasks_root(), "01-sprint/task-a", "# Task A\n");

        h.engine.reconcile().unwrap();
        assert!(h.registry.groups().unwrap().is_empty());
    }

    #[test]
    fn marked_folder_without_children_is_a_group() {
        let h = harness();
        mkdir_with_task(
            &h.store.tasks_root(),
            "platform",
            "# Platform\n\n**Type:** project\n",
        );

        h.engine.reconcile().unwrap();
        let groups = h.registry.groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Platform");
    }

    #[test]
    fn degraded_group_record_is_deleted_sessions_detached() {
        let h = harness();
        let group = h.service.create_group("Marketing", "").unwrap();
        let session = h
            .service
            .create_session("Landing page", "", Some(&group))
            .unwrap();

        // the group's own TASK.md lost its project marker
        let folder = h.store.group_path("Marketing");
        fs::write(folder.join(TASK_FILE_NAME), "# Marketing\n\n**Status:** In Progress\n")
            .unwrap();

        h.engine.reconcile().unwrap();

        assert!(h.registry.find_group(&group.id).unwrap().is_none());
        let detached = h.registry.session(&session.id).unwrap();
        assert_eq!(detached.group_id, None);
        // the folder itself is left alone and now imports as a task
        assert!(folder.exists());
        assert!(h
            .registry
            .find_session_by_folder(&folder)
            .unwrap()
            .is_some());
    }

    #[test]
    fn group_with_missing_folder_is_deleted_after_grace() {
        let h = harness();
        let project = h.store.project_path().to_path_buf();
        let mut group = ProjectGroup::new("Ghost", project.clone(), 1);
        group.created_at = Utc::now() - Duration::seconds(60);
        h.registry.create_group(&group).unwrap();

        let mut member = Session::new("Member", "", project);
        member.group_id = Some(group.id.clone());
        // keep the member alive: it has a live folder of its own
        mkdir_with_task(&h.store.tasks_root(), "member", "# Member\n");
        member.task_folder_path = Some(h.store.tasks_root().join("member"));
        h.registry.create_session(&member).unwrap();

        h.engine.reconcile().unwrap();

        assert!(h.registry.find_group(&group.id).unwrap().is_none());
        assert_eq!(h.registry.session(&member.id).unwrap().group_id, None);
    }

    #[test]
    fn fresh_group_without_folder_gets_project_session() {
        let h = harness();
        let group = ProjectGroup::new("Backend", h.store.project_path().to_path_buf(), 1);
        h.registry.create_group(&group).unwrap();

        h.engine.reconcile().unwrap();

        let folder = h.store.group_path("Backend");
        assert!(folder.join(TASK_FILE_NAME).exists());
        let doc = h.store.read_task(&folder).unwrap().unwrap();
        assert!(doc.is_project);

        let session = h
            .registry
            .find_session_by_folder(&folder)
            .unwrap()
            .expect("project session missing");
        assert_eq!(session.name, "Backend");
    }

    struct OneConversation(PathBuf);

    impl ConversationLookup for OneConversation {
        fn has_conversation(&self, working_dir: &Path) -> bool {
            working_dir == self.0
        }

        fn conversation_id(&self, working_dir: &Path) -> Option<String> {
            (working_dir == self.0).then(|| "conv-42".to_string())
        }
    }

    #[test]
    fn import_sets_launched_flag_from_collaborator() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("acme");
        fs::create_dir_all(&project).unwrap();
        let db = Database::new(Some(dir.path().join("test.db"))).unwrap();
        let registry = Registry::new(db, project.clone());
        let store = FolderStore::new(project);
        let folder = store.tasks_root().join("fix-bug");
        let engine = ReconciliationEngine::new(
            registry.clone(),
            store.clone(),
            Arc::new(OneConversation(folder.clone())),
        );

        mkdir_with_task(
            &store.tasks_root(),
            "fix-bug",
            "# Fix bug\n\n**Status:** In Progress\n\n## Description\n\nBroken login.\n",
        );

        engine.reconcile().unwrap();

        let imported = registry
            .find_session_by_folder(&folder)
            .unwrap()
            .expect("task not imported");
        assert_eq!(imported.name, "Fix bug");
        assert_eq!(imported.description, "Broken login.");
        assert!(imported.has_been_launched);
        assert_eq!(imported.external_conversation_id.as_deref(), Some("conv-42"));
        assert!(!imported.is_completed);
    }

    #[test]
    fn import_marks_done_status_completed() {
        let h = harness();
        mkdir_with_task(
            &h.store.tasks_root(),
            "shipped",
            "# Shipped\n\n**Status:** Completed\n",
        );

        h.engine.reconcile().unwrap();
        let imported = h
            .registry
            .find_session_by_folder(&h.store.tasks_root().join("shipped"))
            .unwrap()
            .unwrap();
        assert!(imported.is_completed);
        assert!(imported.completed_at.is_some());
    }

    #[test]
    fn pipeline_is_idempotent() {
        let h = harness();
        let tasks = h.store.tasks_root();
        mkdir_with_task(&tasks, "marketing/landing-page", "# Landing page\n");
        mkdir_with_task(&tasks, "solo", "# Solo\n");
        mkdir_with_task(&tasks, "completed/old", "# Old\n\n**Status:** Completed\n");
        let expired = backdated_session("vanished", h.store.project_path(), 120);
        h.registry.create_session(&expired).unwrap();

        h.engine.reconcile().unwrap();
        let mut first_sessions = h.registry.sessions().unwrap();
        let mut first_groups = h.registry.groups().unwrap();
        first_sessions.sort_by(|a, b| a.id.cmp(&b.id));
        first_groups.sort_by(|a, b| a.id.cmp(&b.id));

        let report = h.engine.reconcile().unwrap();
        assert_eq!(report.changes(), 0, "second run changed state: {report:?}");

        let mut second_sessions = h.registry.sessions().unwrap();
        let mut second_groups = h.registry.groups().unwrap();
        second_sessions.sort_by(|a, b| a.id.cmp(&b.id));
        second_groups.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(first_sessions, second_sessions);
        assert_eq!(first_groups, second_groups);
    }

    #[test]
    fn completion_consistency_after_validate() {
        let h = harness();
        let tasks = h.store.tasks_root();
        mkdir_with_task(&tasks, "active-task", "# Active task\n");
        mkdir_with_task(&tasks, "completed/done-task", "# Done task\n");

        let mut active = Session::new("Active task", "", h.store.project_path().to_path_buf());
        active.task_folder_path = Some(tasks.join("active-task"));
        let done = Session::new("Done task", "", h.store.project_path().to_path_buf());
        h.registry.create_session(&active).unwrap();
        h.registry.create_session(&done).unwrap();

        h.engine.reconcile().unwrap();

        for session in h.registry.sessions().unwrap() {
            let under_completed = session
                .task_folder_path
                .as_ref()
                .map(|p| h.store.is_under_completed(p))
                .unwrap_or(false);
            assert_eq!(
                session.is_completed, under_completed,
                "inconsistent session {:?}",
                session.name
            );
        }
    }

    #[test]
    fn resolve_session_pure_decisions() {
        let h = harness();
        let project = h.store.project_path().to_path_buf();
        let now = Utc::now();
        let grace = Duration::seconds(30);

        let mut snapshot = FsSnapshot::default();
        snapshot
            .active
            .insert("fix-bug".to_string(), h.store.tasks_root().join("fix-bug"));
        snapshot.completed.insert(
            "old-task".to_string(),
            h.store.completed_root().join("old-task"),
        );

        // pathless + active folder match
        let s = Session::new("Fix bug", "", project.clone());
        assert!(matches!(
            resolve_session(&s, &snapshot, &h.store, now, grace),
            SessionResolution::AttachActive { .. }
        ));

        // pathless + completed match wins over orphaning
        let s = backdated_session("Old task", &project, 300);
        assert!(matches!(
            resolve_session(&s, &snapshot, &h.store, now, grace),
            SessionResolution::AttachCompleted { .. }
        ));

        // pathless, no match, young -> untouched; old -> orphaned
        let s = Session::new("Brand new", "", project.clone());
        assert_eq!(
            resolve_session(&s, &snapshot, &h.store, now, grace),
            SessionResolution::Untouched
        );
        let s = backdated_session("Stale", &project, 31);
        assert_eq!(
            resolve_session(&s, &snapshot, &h.store, now, grace),
            SessionResolution::Orphaned
        );

        // existing path under completed/ -> mark completed
        mkdir_with_task(&h.store.tasks_root(), "completed/done", "# Done\n");
        let mut s = Session::new("Done", "", project);
        s.task_folder_path = Some(h.store.completed_root().join("done"));
        assert_eq!(
            resolve_session(&s, &snapshot, &h.store, now, grace),
            SessionResolution::MarkCompleted
        );
    }
}
