use crate::domains::folders::slug::strip_numeric_prefix;
use crate::domains::folders::store::{ARCHIVE_DIR, COMPLETED_DIR};
use crate::domains::folders::task_file::{TaskDocument, TASK_FILE_NAME};
use crate::domains::folders::FolderStore;
use anyhow::Result;
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A folder under `tasks/` carrying a `TASK.md` marker.
#[derive(Debug, Clone)]
pub struct TaskFolder {
    pub path: PathBuf,
    pub name: String,
    /// Name of the immediate parent directory when the folder is nested one
    /// level below `tasks/` (the group level); None at the top level.
    pub parent_name: Option<String>,
    pub doc: TaskDocument,
}

/// A top-level directory that may be (or become) a ProjectGroup.
#[derive(Debug, Clone)]
pub struct GroupCandidate {
    pub path: PathBuf,
    pub name: String,
    pub has_own_task_file: bool,
    pub has_project_marker: bool,
    pub child_task_count: usize,
    pub title: Option<String>,
}

/// Point-in-time view of the `tasks/` tree for one project. Passes consume
/// this instead of touching the disk directly, so a pass decision is a
/// function of (registry state, snapshot, now).
#[derive(Debug, Default)]
pub struct FsSnapshot {
    /// Names of every directory under `tasks/`, excluding the `completed/`
    /// and `archive/` subtrees, mapped to their paths. A session whose slug
    /// appears here has a live folder even if its record lost the path.
    pub active: HashMap<String, PathBuf>,
    /// Completed folder names to paths, keyed both literally and with the
    /// legacy numeric prefix stripped.
    pub completed: HashMap<String, PathBuf>,
    pub group_candidates: Vec<GroupCandidate>,
    pub task_folders: Vec<TaskFolder>,
}

impl FsSnapshot {
    pub fn scan(store: &FolderStore) -> Result<Self> {
        let tasks_root = store.tasks_root();
        let mut snapshot = FsSnapshot::default();
        if !tasks_root.is_dir() {
            return Ok(snapshot);
        }

        for entry in WalkDir::new(&tasks_root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_excluded_subtree(e.path(), &tasks_root))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", tasks_root.display());
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path().to_path_buf();
            let name = entry.file_name().to_string_lossy().to_string();
            snapshot.active.entry(name.clone()).or_insert_with(|| path.clone());

            let task_file = path.join(TASK_FILE_NAME);
            if task_file.is_file() {
                let doc = fs::read_to_string(&task_file)
                    .map(|content| TaskDocument::parse(&content))
                    .unwrap_or_default();
                let parent_name = path
                    .parent()
                    .filter(|parent| *parent != tasks_root)
                    .and_then(|parent| parent.file_name())
                    .map(|n| n.to_string_lossy().to_string());
                snapshot.task_folders.push(TaskFolder {
                    path,
                    name,
                    parent_name,
                    doc,
                });
            }
        }

        snapshot.scan_completed(&store.completed_root());
        snapshot.scan_group_candidates(&tasks_root);

        Ok(snapshot)
    }

    fn scan_completed(&mut self, completed_root: &Path) {
        let Ok(entries) = fs::read_dir(completed_root) else {
            return;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();
            let stripped = strip_numeric_prefix(&name).to_string();
            if stripped != name {
                self.completed.entry(stripped).or_insert_with(|| path.clone());
            }
            self.completed.insert(name, path);
        }
    }

    fn scan_group_candidates(&mut self, tasks_root: &Path) {
        let Ok(entries) = fs::read_dir(tasks_root) else {
            return;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name == COMPLETED_DIR || name == ARCHIVE_DIR {
                continue;
            }

            let task_file = path.join(TASK_FILE_NAME);
            let doc = fs::read_to_string(&task_file)
                .ok()
                .map(|content| TaskDocument::parse(&content));

            let child_task_count = fs::read_dir(&path)
                .map(|children| {
                    children
                        .filter_map(|c| c.ok())
                        .filter(|c| c.path().join(TASK_FILE_NAME).is_file())
                        .count()
                })
                .unwrap_or(0);

            self.group_candidates.push(GroupCandidate {
                path,
                name,
                has_own_task_file: doc.is_some(),
                has_project_marker: doc.as_ref().map(|d| d.is_project).unwrap_or(false),
                child_task_count,
                title: doc.and_then(|d| d.title),
            });
        }
    }

    /// Completed-folder lookup by name, exact first, then with the legacy
    /// numeric prefix stripped.
    pub fn completed_folder(&self, name: &str) -> Option<&PathBuf> {
        self.completed
            .get(name)
            .or_else(|| self.completed.get(strip_numeric_prefix(name)))
    }
}

fn is_excluded_subtree(path: &Path, tasks_root: &Path) -> bool {
    if let Ok(relative) = path.strip_prefix(tasks_root) {
        if let Some(first) = relative.components().next() {
            let first = first.as_os_str().to_string_lossy();
            return first == COMPLETED_DIR || first == ARCHIVE_DIR;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (FolderStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("acme");
        fs::create_dir_all(&project).unwrap();
        (FolderStore::new(project), dir)
    }

    fn mkdir_with_task(root: &Path, rel: &str, content: &str) {
        let folder = root.join(rel);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(TASK_FILE_NAME), content).unwrap();
    }

    #[test]
    fn empty_project_scans_to_empty_snapshot() {
        let (store, _dir) = fixture();
        let snapshot = FsSnapshot::scan(&store).unwrap();
        assert!(snapshot.active.is_empty());
        assert!(snapshot.task_folders.is_empty());
        assert!(snapshot.group_candidates.is_empty());
    }

    #[test]
    fn scan_separates_active_and_completed() {
        let (store, _dir) = fixture();
        let tasks = store.tasks_root();
        mkdir_with_task(&tasks, "fix-bug", "# Fix bug\n");
        mkdir_with_task(&tasks, "completed/old-task", "# Old task\n");
        mkdir_with_task(&tasks, "archive/ancient", "# Ancient\n");

        let snapshot = FsSnapshot::scan(&store).unwrap();
        assert!(snapshot.active.contains_key("fix-bug"));
        assert!(!snapshot.active.contains_key("old-task"));
        assert!(!snapshot.active.contains_key("ancient"));
        assert_eq!(snapshot.task_folders.len(), 1);
        assert!(snapshot.completed_folder("old-task").is_some());
    }

    #[test]
    fn completed_lookup_strips_numeric_prefix() {
        let (store, _dir) = fixture();
        mkdir_with_task(&store.tasks_root(), "completed/01-fix-bug", "# Fix bug\n");

        let snapshot = FsSnapshot::scan(&store).unwrap();
        assert!(snapshot.completed_folder("01-fix-bug").is_some());
        assert!(snapshot.completed_folder("fix-bug").is_some());
        assert!(snapshot.completed_folder("other").is_none());
    }

    #[test]
    fn nested_task_records_parent_name() {
        let (store, _dir) = fixture();
        mkdir_with_task(&store.tasks_root(), "marketing/landing-page", "# Landing page\n");

        let snapshot = FsSnapshot::scan(&store).unwrap();
        let nested = snapshot
            .task_folders
            .iter()
            .find(|t| t.name == "landing-page")
            .unwrap();
        assert_eq!(nested.parent_name.as_deref(), Some("marketing"));
    }

    #[test]
    fn group_candidates_report_markers_and_children() {
        let (store, _dir) = fixture();
        let tasks = store.tasks_root();
        mkdir_with_task(&tasks, "marketing/a", "# A\n");
        mkdir_with_task(&tasks, "marketing/b", "# B\n");
        mkdir_with_task(&tasks, "platform", "# Platform\n\n**Type:** project\n");
        mkdir_with_task(&tasks, "solo-task", "# Solo\n");

        let snapshot = FsSnapshot::scan(&store).unwrap();
        let find = |name: &str| {
            snapshot
                .group_candidates
                .iter()
                .find(|c| c.name == name)
                .unwrap()
        };

        let marketing = find("marketing");
        assert!(!marketing.has_own_task_file);
        assert_eq!(marketing.child_task_count, 2);

        let platform = find("platform");
        assert!(platform.has_own_task_file);
        assert!(platform.has_project_marker);
        assert_eq!(platform.title.as_deref(), Some("Platform"));

        let solo = find("solo-task");
        assert!(solo.has_own_task_file);
        assert!(!solo.has_project_marker);
        assert_eq!(solo.child_task_count, 0);
    }
}
