use crate::domains::sessions::entity::{Project, ProjectGroup, Session};
use crate::domains::sessions::repository::Registry;
use anyhow::Result;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const SESSIONS_DIR: &str = "sessions";
const GROUPS_DIR: &str = "groups";
const PROJECTS_DIR: &str = "projects";

/// Cross-device replication over a shared (cloud-synced) directory.
///
/// Every record is one JSON file named by id, so a partial update never
/// rewrites a whole collection and the file-replication layer can ship
/// records independently. Projects and groups are whole-file-write units of
/// truth (remote wins); sessions merge last-write-wins on
/// `last_accessed_at`.
pub struct SyncMerger {
    registry: Registry,
    sync_dir: PathBuf,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub projects_imported: usize,
    pub groups_imported: usize,
    pub sessions_imported: usize,
    pub sessions_skipped: usize,
    pub unresolved_references: usize,
    pub records_exported: usize,
}

impl SyncMerger {
    pub fn new(registry: Registry, sync_dir: PathBuf) -> Self {
        Self { registry, sync_dir }
    }

    pub fn sync_dir(&self) -> &Path {
        &self.sync_dir
    }

    /// Publish local state: one file per record.
    pub fn export_all(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for project in self.registry.projects()? {
            self.write_record(PROJECTS_DIR, &project.id, &project)?;
            report.records_exported += 1;
        }
        for group in self.registry.groups()? {
            self.write_record(GROUPS_DIR, &group.id, &group)?;
            report.records_exported += 1;
        }
        for session in self.registry.sessions()? {
            self.write_record(SESSIONS_DIR, &session.id, &session)?;
            report.records_exported += 1;
        }

        debug!(
            "Exported {} record(s) to {}",
            report.records_exported,
            self.sync_dir.display()
        );
        Ok(report)
    }

    /// Pull remote state. Projects and groups import before sessions so the
    /// session foreign-key lookup can resolve against fresh data.
    pub fn import_all(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for project in self.read_records::<Project>(PROJECTS_DIR) {
            self.registry.upsert_project(&project)?;
            report.projects_imported += 1;
        }

        for group in self.read_records::<ProjectGroup>(GROUPS_DIR) {
            self.registry.upsert_group(&group)?;
            report.groups_imported += 1;
        }

        for remote in self.read_records::<Session>(SESSIONS_DIR) {
            match self.registry.find_session(&remote.id)? {
                Some(local) if remote.last_accessed_at <= local.last_accessed_at => {
                    report.sessions_skipped += 1;
                    continue;
                }
                _ => {}
            }
            self.registry.upsert_session(&remote)?;
            report.sessions_imported += 1;

            // Relationship resolution is a lookup right after the upsert; a
            // miss is logged and retried on the next pass, never fatal.
            if let Some(group_id) = &remote.group_id {
                if self.registry.find_group(group_id)?.is_none() {
                    warn!(
                        "Session '{}' references group {group_id} which has not arrived yet",
                        remote.name
                    );
                    report.unresolved_references += 1;
                }
            }
        }

        if report.sessions_imported + report.groups_imported + report.projects_imported > 0 {
            info!(
                "Imported {} project(s), {} group(s), {} session(s) ({} skipped)",
                report.projects_imported,
                report.groups_imported,
                report.sessions_imported,
                report.sessions_skipped
            );
        }
        Ok(report)
    }

    fn write_record<T: Serialize>(&self, kind: &str, id: &str, record: &T) -> Result<()> {
        let dir = self.sync_dir.join(kind);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(record)?;
        fs::write(dir.join(format!("{id}.json")), json)?;
        Ok(())
    }

    /// Unreadable or unparsable snapshot files are skipped with a warning;
    /// the replicator may deliver them half-written and will deliver them
    /// again.
    fn read_records<T: DeserializeOwned>(&self, kind: &str) -> Vec<T> {
        let dir = self.sync_dir.join(kind);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut records = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().map(|ext| ext != "json").unwrap_or(true) {
                continue;
            }
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Could not read snapshot {}: {e}", path.display());
                    continue;
                }
            };
            match serde_json::from_str::<T>(&content) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Malformed snapshot {}: {e}", path.display()),
            }
        }
        records
    }
}
