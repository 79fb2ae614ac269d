#![deny(dead_code)]

pub mod cli;
pub mod collaborator;
pub mod domains;
pub mod infrastructure;
pub mod logging;
pub mod watcher;
pub mod workspace;

pub use domains::folders::FolderStore;
pub use domains::reconcile::{ReconcileReport, ReconciliationEngine};
pub use domains::sessions::{Registry, Session, SessionService};
pub use domains::sync::SyncMerger;
pub use workspace::{RefreshTrigger, WorkspaceService};
