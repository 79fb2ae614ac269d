use crate::domains::folders::slug::slugify;
use crate::domains::folders::task_file::{
    TaskDocument, CONTEXT_FILE_NAME, STATUS_COMPLETED, TASK_FILE_NAME,
};
use anyhow::{anyhow, Result};
use chrono::Utc;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

pub const TASKS_DIR: &str = "tasks";
pub const COMPLETED_DIR: &str = "completed";
pub const ARCHIVE_DIR: &str = "archive";

/// Filesystem side of the task registry: path derivation, `TASK.md`
/// read/write and folder moves for one project.
///
/// Every operation is local to `<project>/tasks/`. Reads are lenient (a
/// missing or malformed file is data, not an error); writes propagate I/O
/// errors to the caller.
#[derive(Clone)]
pub struct FolderStore {
    project_path: PathBuf,
}

impl FolderStore {
    pub fn new(project_path: PathBuf) -> Self {
        Self { project_path }
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn project_name(&self) -> String {
        self.project_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.project_path.to_string_lossy().to_string())
    }

    pub fn tasks_root(&self) -> PathBuf {
        self.project_path.join(TASKS_DIR)
    }

    pub fn completed_root(&self) -> PathBuf {
        self.tasks_root().join(COMPLETED_DIR)
    }

    /// `tasks/<task-slug>` or `tasks/<group-slug>/<task-slug>`.
    pub fn task_path(&self, group_name: Option<&str>, name: &str) -> PathBuf {
        let mut path = self.tasks_root();
        if let Some(group) = group_name {
            path = path.join(slugify(group));
        }
        path.join(slugify(name))
    }

    pub fn group_path(&self, name: &str) -> PathBuf {
        self.tasks_root().join(slugify(name))
    }

    /// True when the path sits under `tasks/completed/`.
    pub fn is_under_completed(&self, path: &Path) -> bool {
        path.strip_prefix(self.completed_root()).is_ok()
    }

    pub fn create_task(
        &self,
        name: &str,
        description: &str,
        group_name: Option<&str>,
    ) -> Result<PathBuf> {
        let folder = self.task_path(group_name, name);
        let mut doc = TaskDocument::new(name, description);
        doc.project = Some(self.project_name());
        doc.sub_project = group_name.map(str::to_string);
        self.materialize(&folder, &doc, name, description)?;
        Ok(folder)
    }

    /// A group folder: same shape as a task, marked `**Type:** project`.
    pub fn create_project(&self, name: &str, description: &str) -> Result<PathBuf> {
        let folder = self.group_path(name);
        let mut doc = TaskDocument::new(name, description);
        doc.project = Some(self.project_name());
        doc.is_project = true;
        self.materialize(&folder, &doc, name, description)?;
        Ok(folder)
    }

    fn materialize(
        &self,
        folder: &Path,
        doc: &TaskDocument,
        name: &str,
        description: &str,
    ) -> Result<()> {
        fs::create_dir_all(folder)?;
        let task_file = folder.join(TASK_FILE_NAME);
        if !task_file.exists() {
            fs::write(&task_file, doc.serialize())?;
        }
        self.write_context_file(folder, name, description)?;
        Ok(())
    }

    /// Static context file for the coding assistant. Written once on folder
    /// creation and never reconciled afterward.
    pub fn write_context_file(&self, folder: &Path, name: &str, description: &str) -> Result<()> {
        let context_file = folder.join(CONTEXT_FILE_NAME);
        if context_file.exists() {
            return Ok(());
        }
        let mut content = format!("# {name}\n");
        if !description.is_empty() {
            content.push_str(&format!("\n{description}\n"));
        }
        content.push_str(
            "\n## Working notes\n\n\
             - `TASK.md` in this folder tracks status and progress.\n\
             - Append a progress entry to `TASK.md` when you wrap up a work session.\n",
        );
        fs::write(&context_file, content)?;
        Ok(())
    }

    /// Parse the folder's `TASK.md`. `Ok(None)` when the folder or file is
    /// missing; malformed content comes back as a partial document.
    pub fn read_task(&self, folder: &Path) -> Result<Option<TaskDocument>> {
        let task_file = folder.join(TASK_FILE_NAME);
        match fs::read_to_string(&task_file) {
            Ok(content) => Ok(Some(TaskDocument::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("Failed to read {}: {e}", task_file.display());
                Ok(None)
            }
        }
    }

    fn rewrite(&self, folder: &Path, mutate: impl FnOnce(&mut TaskDocument)) -> Result<bool> {
        let Some(mut doc) = self.read_task(folder)? else {
            return Ok(false);
        };
        mutate(&mut doc);
        fs::write(folder.join(TASK_FILE_NAME), doc.serialize())?;
        Ok(true)
    }

    /// Rewrite the status line in place. `Ok(false)` when there is no
    /// `TASK.md` to update.
    pub fn update_task_status(&self, folder: &Path, status: &str) -> Result<bool> {
        self.rewrite(folder, |doc| doc.set_status(status))
    }

    /// Append a timestamped progress entry. No-op when the file is missing.
    pub fn append_progress(
        &self,
        folder: &Path,
        body: &str,
        duration: Option<&str>,
    ) -> Result<bool> {
        self.rewrite(folder, |doc| doc.push_progress(body, duration, Utc::now()))
    }

    /// Relocate a task folder under a new parent directory, keeping its
    /// name. The `**Sub-project:**` line follows the move.
    pub fn move_task(&self, folder: &Path, new_parent: &Path) -> Result<PathBuf> {
        let name = folder
            .file_name()
            .ok_or_else(|| anyhow!("task folder has no name: {}", folder.display()))?;
        let destination = new_parent.join(name);
        if destination == folder {
            return Ok(destination);
        }
        fs::create_dir_all(new_parent)?;
        fs::rename(folder, &destination)?;

        let sub_project = (new_parent != self.tasks_root())
            .then(|| new_parent.file_name().map(|n| n.to_string_lossy().to_string()))
            .flatten();
        self.rewrite(&destination, |doc| doc.sub_project = sub_project)?;
        Ok(destination)
    }

    /// Rename a task folder in place to the slug of `new_name`; the
    /// document title follows the rename.
    pub fn rename_task(&self, folder: &Path, new_name: &str) -> Result<PathBuf> {
        let parent = folder
            .parent()
            .ok_or_else(|| anyhow!("task folder has no parent: {}", folder.display()))?;
        let destination = parent.join(slugify(new_name));
        if destination == folder {
            return Ok(destination);
        }
        if destination.exists() {
            return Err(anyhow!(
                "cannot rename {} -> {}: destination exists",
                folder.display(),
                destination.display()
            ));
        }
        fs::rename(folder, &destination)?;
        self.rewrite(&destination, |doc| doc.title = Some(new_name.to_string()))?;
        Ok(destination)
    }

    /// Move a folder into `tasks/completed/`, never overwriting: on a name
    /// collision a `-N` suffix is appended until a free name is found. The
    /// status line follows the move.
    pub fn move_to_completed(&self, folder: &Path) -> Result<PathBuf> {
        let name = folder
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("task folder has no name: {}", folder.display()))?;

        let completed = self.completed_root();
        fs::create_dir_all(&completed)?;

        let mut destination = completed.join(name);
        let mut suffix = 2u32;
        while destination.exists() {
            destination = completed.join(format!("{name}-{suffix}"));
            suffix += 1;
        }

        fs::rename(folder, &destination)?;
        self.rewrite(&destination, |doc| doc.set_status(STATUS_COMPLETED))?;
        Ok(destination)
    }
}
