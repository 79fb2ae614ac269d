use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use taskdeck::cli::Cli;
use taskdeck::collaborator::ClaudeProjectsLookup;
use taskdeck::domains::sessions::entity::Project;
use taskdeck::infrastructure::config::SettingsRepository;
use taskdeck::infrastructure::database::Database;
use taskdeck::watcher::WorkspaceWatcher;
use taskdeck::{
    FolderStore, ReconciliationEngine, RefreshTrigger, Registry, SyncMerger, WorkspaceService,
};

fn main() -> Result<()> {
    taskdeck::logging::init_logging();
    let cli = Cli::parse();

    let project_path = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let project_path = project_path
        .canonicalize()
        .map_err(|e| anyhow!("Cannot open project {}: {e}", project_path.display()))?;

    let settings = match SettingsRepository::new() {
        Ok(repo) => repo.load(),
        Err(e) => {
            log::warn!("Settings unavailable ({e}); using defaults");
            Default::default()
        }
    };
    let sync_dir = cli.sync_dir.or(settings.sync_dir);
    let grace_secs = cli.grace_secs.unwrap_or(settings.grace_period_secs);

    let db = Database::new(cli.db)?;
    let registry = Registry::new(db, project_path.clone());
    let store = FolderStore::new(project_path.clone());
    ensure_project_record(&registry, &store)?;

    let engine = ReconciliationEngine::new(
        registry.clone(),
        store.clone(),
        Arc::new(ClaudeProjectsLookup),
    )
    .with_grace_period(chrono::Duration::seconds(grace_secs));
    let merger = sync_dir
        .clone()
        .map(|dir| SyncMerger::new(registry.clone(), dir));
    let service = WorkspaceService::new(engine, merger);

    let summary = service.refresh(RefreshTrigger::WorkspaceOpen);
    if let Some(report) = &summary.reconciled {
        println!(
            "{}: {} change(s) on open",
            project_path.display(),
            report.changes()
        );
    }

    if !cli.watch {
        return Ok(());
    }

    let (tx, rx) = mpsc::channel();
    let mut watch_paths: Vec<PathBuf> = vec![store.tasks_root()];
    if let Some(dir) = &sync_dir {
        watch_paths.push(dir.clone());
    }
    let _watcher = WorkspaceWatcher::new(&watch_paths, tx)?;
    println!("Watching {} for changes...", project_path.display());
    service.run(rx)
}

/// The project record is what other devices key their imports on; make sure
/// one exists for this path before anything is exported.
fn ensure_project_record(registry: &Registry, store: &FolderStore) -> Result<()> {
    let path = store.project_path();
    let known = registry.projects()?.iter().any(|p| p.path == path);
    if !known {
        registry.upsert_project(&Project::new(&store.project_name(), path.to_path_buf()))?;
    }
    Ok(())
}
