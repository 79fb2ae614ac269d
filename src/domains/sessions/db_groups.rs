use crate::domains::sessions::entity::ProjectGroup;
use crate::infrastructure::database::Database;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use rusqlite::{params, Row, ToSql};
use std::path::{Path, PathBuf};

pub trait ProjectGroupMethods {
    fn create_group(&self, group: &ProjectGroup) -> Result<()>;
    fn find_group_by_id(&self, id: &str) -> Result<Option<ProjectGroup>>;
    fn list_groups(&self, project_path: &Path) -> Result<Vec<ProjectGroup>>;
    fn next_sort_order(&self, project_path: &Path) -> Result<i64>;
    fn set_group_expanded(&self, id: &str, expanded: bool) -> Result<()>;
    fn delete_groups(&self, ids: &[String]) -> Result<usize>;
    fn upsert_group(&self, group: &ProjectGroup) -> Result<()>;
}

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<ProjectGroup> {
    Ok(ProjectGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        project_path: PathBuf::from(row.get::<_, String>(2)?),
        sort_order: row.get(3)?,
        is_expanded: row.get(4)?,
        created_at: Utc
            .timestamp_opt(row.get(5)?, 0)
            .single()
            .unwrap_or_default(),
    })
}

impl ProjectGroupMethods for Database {
    fn create_group(&self, group: &ProjectGroup) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO project_groups (id, name, project_path, sort_order, is_expanded, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.id,
                group.name,
                group.project_path.to_string_lossy(),
                group.sort_order,
                group.is_expanded,
                group.created_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn find_group_by_id(&self, id: &str) -> Result<Option<ProjectGroup>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, project_path, sort_order, is_expanded, created_at
             FROM project_groups WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_group)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_groups(&self, project_path: &Path) -> Result<Vec<ProjectGroup>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, project_path, sort_order, is_expanded, created_at
             FROM project_groups WHERE project_path = ?1 ORDER BY sort_order",
        )?;
        let rows = stmt.query_map(params![project_path.to_string_lossy()], row_to_group)?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    fn next_sort_order(&self, project_path: &Path) -> Result<i64> {
        let conn = self.get_conn()?;
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(sort_order) FROM project_groups WHERE project_path = ?1",
            params![project_path.to_string_lossy()],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    fn set_group_expanded(&self, id: &str, expanded: bool) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE project_groups SET is_expanded = ?2 WHERE id = ?1",
            params![id, expanded],
        )?;
        Ok(())
    }

    fn delete_groups(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.get_conn()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM project_groups WHERE id IN ({placeholders})");
        let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
        Ok(conn.execute(&sql, params.as_slice())?)
    }

    fn upsert_group(&self, group: &ProjectGroup) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO project_groups
             (id, name, project_path, sort_order, is_expanded, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.id,
                group.name,
                group.project_path.to_string_lossy(),
                group.sort_order,
                group.is_expanded,
                group.created_at.timestamp(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn database() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(Some(dir.path().join("test.db"))).unwrap();
        (db, dir)
    }

    #[test]
    fn sort_order_starts_at_one_and_increments() {
        let (db, _dir) = database();
        let project = PathBuf::from("/p");
        assert_eq!(db.next_sort_order(&project).unwrap(), 1);

        db.create_group(&ProjectGroup::new("Marketing", project.clone(), 1))
            .unwrap();
        db.create_group(&ProjectGroup::new("Backend", project.clone(), 7))
            .unwrap();
        assert_eq!(db.next_sort_order(&project).unwrap(), 8);
    }

    #[test]
    fn list_is_ordered_by_sort_order() {
        let (db, _dir) = database();
        let project = PathBuf::from("/p");
        db.create_group(&ProjectGroup::new("B", project.clone(), 2))
            .unwrap();
        db.create_group(&ProjectGroup::new("A", project.clone(), 1))
            .unwrap();
        let names: Vec<String> = db
            .list_groups(&project)
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn delete_groups_by_id() {
        let (db, _dir) = database();
        let project = PathBuf::from("/p");
        let group = ProjectGroup::new("Marketing", project.clone(), 1);
        db.create_group(&group).unwrap();
        assert_eq!(db.delete_groups(std::slice::from_ref(&group.id)).unwrap(), 1);
        assert!(db.list_groups(&project).unwrap().is_empty());
    }

    #[test]
    fn upsert_overwrites_existing() {
        let (db, _dir) = database();
        let project = PathBuf::from("/p");
        let mut group = ProjectGroup::new("Marketing", project.clone(), 1);
        db.create_group(&group).unwrap();
        group.is_expanded = false;
        group.name = "Growth".to_string();
        db.upsert_group(&group).unwrap();

        let got = db.find_group_by_id(&group.id).unwrap().unwrap();
        assert_eq!(got.name, "Growth");
        assert!(!got.is_expanded);
    }
}
