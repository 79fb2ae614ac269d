pub mod db_groups;
pub mod db_projects;
pub mod db_sessions;
pub mod entity;
pub mod repository;
pub mod service;

pub use entity::{Project, ProjectGroup, Session};
pub use repository::Registry;
pub use service::SessionService;
