use crate::domains::sessions::entity::Project;
use crate::infrastructure::database::Database;
use anyhow::Result;
use rusqlite::{params, Row};
use std::path::PathBuf;

pub trait ProjectMethods {
    fn find_project_by_id(&self, id: &str) -> Result<Option<Project>>;
    fn list_projects(&self) -> Result<Vec<Project>>;
    fn upsert_project(&self, project: &Project) -> Result<()>;
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        path: PathBuf::from(row.get::<_, String>(2)?),
        icon: row.get(3)?,
        category: row.get(4)?,
    })
}

impl ProjectMethods for Database {
    fn find_project_by_id(&self, id: &str) -> Result<Option<Project>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, path, icon, category FROM projects WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], row_to_project)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, path, icon, category FROM projects ORDER BY name")?;
        let rows = stmt.query_map([], row_to_project)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    fn upsert_project(&self, project: &Project) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO projects (id, name, path, icon, category)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.id,
                project.name,
                project.path.to_string_lossy(),
                project.icon,
                project.category,
            ],
        )?;
        Ok(())
    }
}
