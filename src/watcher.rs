use crate::workspace::RefreshTrigger;
use anyhow::{anyhow, Result};
use log::{debug, error, info};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Debounced recursive watch over the `tasks/` tree and the sync folder.
/// Interesting events collapse into a single `FilesystemChange` trigger on
/// the channel the workspace worker drains.
pub struct WorkspaceWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    watched: Vec<PathBuf>,
}

impl WorkspaceWatcher {
    pub fn new(paths: &[PathBuf], triggers: Sender<RefreshTrigger>) -> Result<Self> {
        let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let relevant = events.iter().any(|e| !should_ignore_path(&e.path));
                    if !relevant {
                        debug!("Ignoring {} event(s) in transient files", events.len());
                        return;
                    }
                    if triggers.send(RefreshTrigger::FilesystemChange).is_err() {
                        debug!("Refresh channel closed, dropping filesystem event");
                    }
                }
                Err(e) => error!("Filesystem watcher error: {e}"),
            }
        })
        .map_err(|e| anyhow!("Failed to create watcher: {e}"))?;

        let mut watched = Vec::new();
        for path in paths {
            if !path.exists() {
                debug!("Not watching {}: does not exist yet", path.display());
                continue;
            }
            debouncer
                .watcher()
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| anyhow!("Failed to watch {}: {e}", path.display()))?;
            info!("Watching {}", path.display());
            watched.push(path.clone());
        }

        Ok(Self {
            _debouncer: debouncer,
            watched,
        })
    }

    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Editor droppings and sync-engine temp files churn constantly; none of
/// them change what a reconciliation pass would decide.
fn should_ignore_path(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name == ".DS_Store"
        || name.ends_with('~')
        || name.ends_with(".tmp")
        || name.ends_with(".swp")
        || name.ends_with(".icloud")
        || name.starts_with(".#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn ignores_transient_files() {
        assert!(should_ignore_path(Path::new("/p/tasks/.DS_Store")));
        assert!(should_ignore_path(Path::new("/p/tasks/TASK.md~")));
        assert!(should_ignore_path(Path::new("/p/tasks/.#TASK.md")));
        assert!(should_ignore_path(Path::new("/p/tasks/fix-bug/draft.tmp")));
        assert!(should_ignore_path(Path::new("/p/tasks/.TASK.md.icloud")));

        assert!(!should_ignore_path(Path::new("/p/tasks/fix-bug/TASK.md")));
        assert!(!should_ignore_path(Path::new("/p/tasks/fix-bug")));
    }

    #[test]
    fn skips_missing_paths_watches_existing() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("tasks");
        std::fs::create_dir_all(&existing).unwrap();
        let missing = dir.path().join("cloud");

        let (tx, _rx) = mpsc::channel();
        let watcher = WorkspaceWatcher::new(&[existing.clone(), missing], tx).unwrap();
        assert_eq!(watcher.watched_paths().to_vec(), vec![existing]);
    }
}
