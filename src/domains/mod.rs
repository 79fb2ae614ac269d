pub mod folders;
pub mod reconcile;
pub mod sessions;
pub mod sync;
