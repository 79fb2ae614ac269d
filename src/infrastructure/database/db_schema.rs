use crate::infrastructure::database::connection::Database;

pub fn initialize_schema(db: &Database) -> anyhow::Result<()> {
    let conn = db.get_conn()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            project_path TEXT NOT NULL,
            task_folder_path TEXT,
            group_id TEXT,
            created_at INTEGER NOT NULL,
            last_accessed_at INTEGER NOT NULL,
            is_completed BOOLEAN DEFAULT FALSE,
            completed_at INTEGER,
            is_hidden BOOLEAN DEFAULT FALSE,
            has_been_launched BOOLEAN DEFAULT FALSE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_path)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_folder ON sessions(task_folder_path)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS project_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            project_path TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_expanded BOOLEAN DEFAULT TRUE,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_groups_project ON project_groups(project_path)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            icon TEXT NOT NULL DEFAULT 'folder',
            category TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_projects_path ON projects(path)",
        [],
    )?;

    // Add external_conversation_id column if it doesn't exist (migration)
    let _ = conn.execute(
        "ALTER TABLE sessions ADD COLUMN external_conversation_id TEXT",
        [],
    );

    Ok(())
}
