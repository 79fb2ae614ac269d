pub mod merger;

pub use merger::{SyncMerger, SyncReport};
