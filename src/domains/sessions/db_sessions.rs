use crate::domains::sessions::entity::Session;
use crate::infrastructure::database::Database;
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Row, ToSql};
use std::path::{Path, PathBuf};

pub trait SessionMethods {
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_id(&self, id: &str) -> Result<Session>;
    fn find_session_by_id(&self, id: &str) -> Result<Option<Session>>;
    fn list_sessions(&self, project_path: &Path) -> Result<Vec<Session>>;
    fn update_task_folder_path(&self, id: &str, path: Option<&Path>) -> Result<()>;
    fn set_session_completed(&self, id: &str, completed_at: DateTime<Utc>) -> Result<()>;
    fn update_group_id(&self, id: &str, group_id: Option<&str>) -> Result<()>;
    fn clear_group_references(&self, group_id: &str) -> Result<usize>;
    fn set_has_been_launched(&self, id: &str, launched: bool) -> Result<()>;
    fn set_external_conversation_id(&self, id: &str, conversation_id: Option<&str>) -> Result<()>;
    fn set_session_hidden(&self, id: &str, hidden: bool) -> Result<()>;
    fn update_session_name(&self, id: &str, name: &str) -> Result<()>;
    fn touch_last_accessed(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
    fn delete_sessions(&self, ids: &[String]) -> Result<usize>;
    fn upsert_session(&self, session: &Session) -> Result<()>;
}

const SQLITE_MAX_VARIABLE_NUMBER: usize = 999;

const SESSION_COLUMNS: &str = "id, name, description, project_path, task_folder_path, group_id, \
     created_at, last_accessed_at, is_completed, completed_at, is_hidden, \
     has_been_launched, external_conversation_id";

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        project_path: PathBuf::from(row.get::<_, String>(3)?),
        task_folder_path: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
        group_id: row.get(5)?,
        created_at: timestamp(row.get(6)?),
        last_accessed_at: timestamp(row.get(7)?),
        is_completed: row.get(8)?,
        completed_at: row.get::<_, Option<i64>>(9)?.map(timestamp),
        is_hidden: row.get(10)?,
        has_been_launched: row.get(11)?,
        external_conversation_id: row.get(12)?,
    })
}

impl SessionMethods for Database {
    fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO sessions (
                id, name, description, project_path, task_folder_path, group_id,
                created_at, last_accessed_at, is_completed, completed_at, is_hidden,
                has_been_launched, external_conversation_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                session.id,
                session.name,
                session.description,
                session.project_path.to_string_lossy(),
                session
                    .task_folder_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                session.group_id,
                session.created_at.timestamp(),
                session.last_accessed_at.timestamp(),
                session.is_completed,
                session.completed_at.map(|dt| dt.timestamp()),
                session.is_hidden,
                session.has_been_launched,
                session.external_conversation_id,
            ],
        )?;
        Ok(())
    }

    fn get_session_by_id(&self, id: &str) -> Result<Session> {
        self.find_session_by_id(id)?
            .ok_or_else(|| anyhow::anyhow!("session not found: {id}"))
    }

    fn find_session_by_id(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_session)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_sessions(&self, project_path: &Path) -> Result<Vec<Session>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE project_path = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![project_path.to_string_lossy()], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    fn update_task_folder_path(&self, id: &str, path: Option<&Path>) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET task_folder_path = ?2 WHERE id = ?1",
            params![id, path.map(|p| p.to_string_lossy().to_string())],
        )?;
        Ok(())
    }

    fn set_session_completed(&self, id: &str, completed_at: DateTime<Utc>) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET is_completed = TRUE, completed_at = ?2 WHERE id = ?1",
            params![id, completed_at.timestamp()],
        )?;
        Ok(())
    }

    fn update_group_id(&self, id: &str, group_id: Option<&str>) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET group_id = ?2 WHERE id = ?1",
            params![id, group_id],
        )?;
        Ok(())
    }

    fn clear_group_references(&self, group_id: &str) -> Result<usize> {
        let conn = self.get_conn()?;
        let cleared = conn.execute(
            "UPDATE sessions SET group_id = NULL WHERE group_id = ?1",
            params![group_id],
        )?;
        Ok(cleared)
    }

    fn set_has_been_launched(&self, id: &str, launched: bool) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET has_been_launched = ?2 WHERE id = ?1",
            params![id, launched],
        )?;
        Ok(())
    }

    fn set_external_conversation_id(&self, id: &str, conversation_id: Option<&str>) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET external_conversation_id = ?2 WHERE id = ?1",
            params![id, conversation_id],
        )?;
        Ok(())
    }

    fn set_session_hidden(&self, id: &str, hidden: bool) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET is_hidden = ?2 WHERE id = ?1",
            params![id, hidden],
        )?;
        Ok(())
    }

    fn update_session_name(&self, id: &str, name: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET name = ?2 WHERE id = ?1",
            params![id, name],
        )?;
        Ok(())
    }

    fn touch_last_accessed(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE sessions SET last_accessed_at = ?2 WHERE id = ?1",
            params![id, at.timestamp()],
        )?;
        Ok(())
    }

    fn delete_sessions(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.get_conn()?;
        let mut deleted = 0;
        for chunk in ids.chunks(SQLITE_MAX_VARIABLE_NUMBER) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("DELETE FROM sessions WHERE id IN ({placeholders})");
            let params: Vec<&dyn ToSql> = chunk.iter().map(|id| id as &dyn ToSql).collect();
            deleted += conn.execute(&sql, params.as_slice())?;
        }
        Ok(deleted)
    }

    fn upsert_session(&self, session: &Session) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (
                id, name, description, project_path, task_folder_path, group_id,
                created_at, last_accessed_at, is_completed, completed_at, is_hidden,
                has_been_launched, external_conversation_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                session.id,
                session.name,
                session.description,
                session.project_path.to_string_lossy(),
                session
                    .task_folder_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                session.group_id,
                session.created_at.timestamp(),
                session.last_accessed_at.timestamp(),
                session.is_completed,
                session.completed_at.map(|dt| dt.timestamp()),
                session.is_hidden,
                session.has_been_launched,
                session.external_conversation_id,
            ],
        )?;
        Ok(())
    }
}
