use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::infrastructure::database::db_schema;

/// Registry database handle. A single connection behind a mutex; every
/// caller that mutates registry state goes through here, which serializes
/// commits from whatever thread produced them.
#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    pub(crate) db_path: PathBuf,
}

impl Database {
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(path) => path,
            None => dirs::data_local_dir()
                .ok_or_else(|| anyhow!("no local data directory available"))?
                .join("taskdeck")
                .join("registry.db"),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path,
        };

        db.initialize_schema()?;

        Ok(db)
    }

    fn initialize_schema(&self) -> Result<()> {
        db_schema::initialize_schema(self)
    }

    pub(crate) fn get_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("registry database lock poisoned"))
    }
}
