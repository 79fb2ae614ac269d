use std::fs;
use std::path::{Path, PathBuf};

/// External signal consumed during task import: does a coding-assistant
/// conversation already exist for a given working directory? The storage
/// format behind the answer is opaque to the reconciliation engine.
pub trait ConversationLookup: Send + Sync {
    fn has_conversation(&self, working_dir: &Path) -> bool;

    /// Id of the most recent conversation for the directory, when known.
    fn conversation_id(&self, working_dir: &Path) -> Option<String> {
        let _ = working_dir;
        None
    }
}

/// Looks for Claude CLI transcripts under `~/.claude/projects/<sanitized>`.
pub struct ClaudeProjectsLookup;

impl ClaudeProjectsLookup {
    fn project_dir(working_dir: &Path) -> Option<PathBuf> {
        let home = dirs::home_dir().or_else(|| std::env::var("HOME").ok().map(PathBuf::from))?;
        let sanitized = sanitize_path(working_dir);
        Some(home.join(".claude").join("projects").join(sanitized))
    }

    fn latest_transcript(project_dir: &Path) -> Option<String> {
        let mut transcripts: Vec<_> = fs::read_dir(project_dir)
            .ok()?
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "jsonl")
                    .unwrap_or(false)
            })
            .collect();

        transcripts.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        transcripts
            .last()?
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
    }
}

impl ConversationLookup for ClaudeProjectsLookup {
    fn has_conversation(&self, working_dir: &Path) -> bool {
        self.conversation_id(working_dir).is_some()
    }

    fn conversation_id(&self, working_dir: &Path) -> Option<String> {
        let project_dir = Self::project_dir(working_dir)?;
        Self::latest_transcript(&project_dir)
    }
}

/// Claude flattens the working directory into one path component.
fn sanitize_path(path: &Path) -> String {
    path.to_string_lossy().replace(['/', '.', '_'], "-")
}

/// Null object for tests and headless runs: no conversations exist.
pub struct NoConversations;

impl ConversationLookup for NoConversations {
    fn has_conversation(&self, _working_dir: &Path) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn sanitize_flattens_separators() {
        assert_eq!(
            sanitize_path(Path::new("/work/acme.app/tasks/fix_bug")),
            "-work-acme-app-tasks-fix-bug"
        );
    }

    #[test]
    #[serial]
    fn detects_transcripts_under_home() {
        let home = TempDir::new().unwrap();
        let prev_home = std::env::var("HOME").ok();
        std::env::set_var("HOME", home.path());

        let working_dir = Path::new("/work/acme/tasks/fix-bug");
        let lookup = ClaudeProjectsLookup;
        assert!(!lookup.has_conversation(working_dir));

        let project_dir = home
            .path()
            .join(".claude")
            .join("projects")
            .join(sanitize_path(working_dir));
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join("abc-123.jsonl"), b"{}").unwrap();

        // dirs::home_dir may ignore $HOME on some platforms; only assert the
        // positive path when the override took effect
        if dirs::home_dir().as_deref() == Some(home.path()) {
            assert!(lookup.has_conversation(working_dir));
            assert_eq!(lookup.conversation_id(working_dir).as_deref(), Some("abc-123"));
        }

        match prev_home {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }

    #[test]
    fn no_conversations_always_false() {
        let lookup = NoConversations;
        assert!(!lookup.has_conversation(Path::new("/anywhere")));
        assert_eq!(lookup.conversation_id(Path::new("/anywhere")), None);
    }
}
