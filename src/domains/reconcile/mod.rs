pub mod engine;
pub mod snapshot;

pub use engine::{ReconcileReport, ReconciliationEngine, DEFAULT_GRACE_PERIOD_SECS};
pub use snapshot::FsSnapshot;
