use crate::domains::reconcile::{ReconcileReport, ReconciliationEngine};
use crate::domains::sync::{SyncMerger, SyncReport};
use anyhow::Result;
use log::{error, info};
use std::sync::mpsc::Receiver;

/// What caused a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    WorkspaceOpen,
    FilesystemChange,
    Manual,
}

/// Result of one refresh; `None` for a stage means it failed (already
/// logged) or, for the sync stages, that no sync directory is configured.
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub imported: Option<SyncReport>,
    pub reconciled: Option<ReconcileReport>,
    pub exported: Option<SyncReport>,
}

/// Ties the pipeline together for one project: import remote snapshots,
/// reconcile the registry against the tree, publish local state. Stage
/// failures are absorbed; the next trigger reruns everything from scratch.
///
/// One `WorkspaceService` is owned by one worker loop. Every registry
/// mutation funnels through that loop, which is what serializes
/// read-modify-write against the registry.
pub struct WorkspaceService {
    engine: ReconciliationEngine,
    merger: Option<SyncMerger>,
}

impl WorkspaceService {
    pub fn new(engine: ReconciliationEngine, merger: Option<SyncMerger>) -> Self {
        Self { engine, merger }
    }

    pub fn refresh(&self, trigger: RefreshTrigger) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        info!("Refreshing workspace ({trigger:?})");

        if let Some(merger) = &self.merger {
            match merger.import_all() {
                Ok(report) => summary.imported = Some(report),
                Err(e) => error!("Sync import failed: {e}"),
            }
        }

        match self.engine.reconcile() {
            Ok(report) => summary.reconciled = Some(report),
            Err(e) => error!("Reconciliation aborted: {e}"),
        }

        if let Some(merger) = &self.merger {
            match merger.export_all() {
                Ok(report) => summary.exported = Some(report),
                Err(e) => error!("Sync export failed: {e}"),
            }
        }

        summary
    }

    /// Serialized worker loop: drains triggers until every sender is gone.
    pub fn run(&self, triggers: Receiver<RefreshTrigger>) -> Result<()> {
        while let Ok(trigger) = triggers.recv() {
            self.refresh(trigger);
        }
        Ok(())
    }
}
