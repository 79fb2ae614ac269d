use chrono::{DateTime, Utc};

pub const TASK_FILE_NAME: &str = "TASK.md";
pub const CONTEXT_FILE_NAME: &str = "CLAUDE.md";

pub const STATUS_IN_PROGRESS: &str = "In Progress";
pub const STATUS_COMPLETED: &str = "Completed";

/// Parsed form of a `TASK.md` file.
///
/// Parsing is lenient by contract: malformed or missing pieces turn into
/// `None`/empty fields, never errors. Serialization is canonical, so a
/// parse → mutate → serialize round trip produces a stable layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDocument {
    pub title: Option<String>,
    pub status: Option<String>,
    pub created: Option<String>,
    pub project: Option<String>,
    pub sub_project: Option<String>,
    /// `**Type:** project` marker; folders carrying it are groups, not tasks.
    pub is_project: bool,
    pub description: Option<String>,
    pub progress: Vec<ProgressEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub date: String,
    pub duration: Option<String>,
    pub body: String,
}

enum Section {
    Preamble,
    Description,
    Progress,
    Other,
}

impl TaskDocument {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            status: Some(STATUS_IN_PROGRESS.to_string()),
            created: Some(Utc::now().format("%Y-%m-%d").to_string()),
            description: if description.is_empty() {
                None
            } else {
                Some(description.to_string())
            },
            ..Default::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| {
                let s = s.trim();
                s.eq_ignore_ascii_case(STATUS_COMPLETED) || s.eq_ignore_ascii_case("done")
            })
            .unwrap_or(false)
    }

    pub fn parse(content: &str) -> Self {
        let mut doc = TaskDocument::default();
        let mut section = Section::Preamble;
        let mut description_lines: Vec<&str> = Vec::new();
        let mut entry: Option<(String, Option<String>, Vec<&str>)> = None;

        for line in content.lines() {
            if let Some(heading) = section_heading(line) {
                if let Some(pending) = entry.take() {
                    doc.progress.push(finish_entry(pending));
                }
                section = match heading {
                    "Description" => Section::Description,
                    "Progress" => Section::Progress,
                    _ => Section::Other,
                };
                continue;
            }

            match section {
                Section::Preamble => {
                    if doc.title.is_none() {
                        if let Some(title) = line.strip_prefix("# ") {
                            doc.title = Some(title.trim().to_string());
                            continue;
                        }
                    }
                    if let Some(value) = meta_value(line, "Status") {
                        doc.status = Some(value.to_string());
                    } else if let Some(value) = meta_value(line, "Created") {
                        doc.created = Some(value.to_string());
                    } else if let Some(value) = meta_value(line, "Project") {
                        doc.project = Some(value.to_string());
                    } else if let Some(value) = meta_value(line, "Sub-project") {
                        doc.sub_project = Some(value.to_string());
                    } else if let Some(value) = meta_value(line, "Type") {
                        doc.is_project = value.eq_ignore_ascii_case("project");
                    }
                }
                Section::Description => description_lines.push(line),
                Section::Progress => {
                    if let Some(rest) = line.strip_prefix("### ") {
                        if let Some(pending) = entry.take() {
                            doc.progress.push(finish_entry(pending));
                        }
                        let (date, duration) = split_entry_heading(rest.trim());
                        entry = Some((date, duration, Vec::new()));
                    } else if let Some((_, _, body)) = entry.as_mut() {
                        body.push(line);
                    }
                }
                Section::Other => {}
            }
        }

        if let Some(pending) = entry.take() {
            doc.progress.push(finish_entry(pending));
        }

        let description = description_lines.join("\n");
        let description = description.trim();
        if !description.is_empty() {
            doc.description = Some(description.to_string());
        }

        doc
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();

        if let Some(title) = &self.title {
            out.push_str(&format!("# {title}\n\n"));
        }
        if let Some(status) = &self.status {
            out.push_str(&format!("**Status:** {status}\n"));
        }
        if let Some(created) = &self.created {
            out.push_str(&format!("**Created:** {created}\n"));
        }
        if let Some(project) = &self.project {
            out.push_str(&format!("**Project:** {project}\n"));
        }
        if let Some(sub_project) = &self.sub_project {
            out.push_str(&format!("**Sub-project:** {sub_project}\n"));
        }
        if self.is_project {
            out.push_str("**Type:** project\n");
        }

        out.push_str("\n## Description\n\n");
        if let Some(description) = &self.description {
            out.push_str(description.trim_end());
            out.push('\n');
        }

        out.push_str("\n## Progress\n");
        for entry in &self.progress {
            match &entry.duration {
                Some(duration) => out.push_str(&format!("\n### {} ({duration})\n", entry.date)),
                None => out.push_str(&format!("\n### {}\n", entry.date)),
            }
            if !entry.body.is_empty() {
                out.push('\n');
                out.push_str(entry.body.trim_end());
                out.push('\n');
            }
        }

        out
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = Some(status.to_string());
    }

    pub fn push_progress(&mut self, body: &str, duration: Option<&str>, at: DateTime<Utc>) {
        self.progress.push(ProgressEntry {
            date: at.format("%Y-%m-%d %H:%M").to_string(),
            duration: duration.map(str::to_string),
            body: body.trim().to_string(),
        });
    }
}

fn section_heading(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("## ")?;
    if rest.starts_with('#') {
        return None;
    }
    Some(rest.trim())
}

fn meta_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix("**")?;
    let rest = rest.strip_prefix(key)?;
    let rest = rest.strip_prefix(":**")?;
    Some(rest.trim())
}

/// `<date>[ (<duration>)]` — the duration is the parenthesized tail, if any.
fn split_entry_heading(heading: &str) -> (String, Option<String>) {
    if heading.ends_with(')') {
        if let Some(open) = heading.rfind(" (") {
            let date = heading[..open].trim_end();
            let duration = &heading[open + 2..heading.len() - 1];
            if !date.is_empty() && !duration.is_empty() {
                return (date.to_string(), Some(duration.to_string()));
            }
        }
    }
    (heading.to_string(), None)
}

fn finish_entry((date, duration, body): (String, Option<String>, Vec<&str>)) -> ProgressEntry {
    let body = body.join("\n");
    ProgressEntry {
        date,
        duration,
        body: body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Fix login bug

**Status:** In Progress
**Created:** 2026-08-01
**Project:** acme-app
**Sub-project:** auth

## Description

The login form drops the session cookie
on Safari.

## Progress

### 2026-08-01 09:15 (25m)

Reproduced on Safari 19, cookie rejected due to SameSite.

### 2026-08-02 14:00

Patched cookie attributes, needs verification.
";

    #[test]
    fn parses_all_fields() {
        let doc = TaskDocument::parse(SAMPLE);
        assert_eq!(doc.title.as_deref(), Some("Fix login bug"));
        assert_eq!(doc.status.as_deref(), Some("In Progress"));
        assert_eq!(doc.created.as_deref(), Some("2026-08-01"));
        assert_eq!(doc.project.as_deref(), Some("acme-app"));
        assert_eq!(doc.sub_project.as_deref(), Some("auth"));
        assert!(!doc.is_project);
        assert_eq!(
            doc.description.as_deref(),
            Some("The login form drops the session cookie\non Safari.")
        );
        assert_eq!(doc.progress.len(), 2);
        assert_eq!(doc.progress[0].date, "2026-08-01 09:15");
        assert_eq!(doc.progress[0].duration.as_deref(), Some("25m"));
        assert!(doc.progress[0].body.contains("SameSite"));
        assert_eq!(doc.progress[1].date, "2026-08-02 14:00");
        assert_eq!(doc.progress[1].duration, None);
    }

    #[test]
    fn round_trips_through_serialize() {
        let doc = TaskDocument::parse(SAMPLE);
        let reparsed = TaskDocument::parse(&doc.serialize());
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn serialize_is_canonical() {
        let doc = TaskDocument::parse(SAMPLE);
        let once = doc.serialize();
        assert_eq!(TaskDocument::parse(&once).serialize(), once);
    }

    #[test]
    fn project_marker_detected() {
        let doc = TaskDocument::parse("# Marketing\n\n**Type:** project\n");
        assert!(doc.is_project);
        let doc = TaskDocument::parse("# Marketing\n\n**Type:** task\n");
        assert!(!doc.is_project);
    }

    #[test]
    fn malformed_content_yields_partial_document() {
        let doc = TaskDocument::parse("no markdown here at all");
        assert_eq!(doc.title, None);
        assert_eq!(doc.status, None);
        assert!(doc.progress.is_empty());

        let doc = TaskDocument::parse("**Status:** Blocked\ngarbage\n### stray entry\n");
        assert_eq!(doc.status.as_deref(), Some("Blocked"));
        // progress entries only count inside the Progress section
        assert!(doc.progress.is_empty());
    }

    #[test]
    fn empty_input() {
        assert_eq!(TaskDocument::parse(""), TaskDocument::default());
    }

    #[test]
    fn done_status_variants() {
        let mut doc = TaskDocument::new("t", "");
        assert!(!doc.is_done());
        doc.set_status("Completed");
        assert!(doc.is_done());
        doc.set_status("done");
        assert!(doc.is_done());
        doc.set_status("In Progress");
        assert!(!doc.is_done());
    }

    #[test]
    fn push_progress_appends_last() {
        let mut doc = TaskDocument::parse(SAMPLE);
        doc.push_progress("Verified on device lab.", Some("10m"), Utc::now());
        let reparsed = TaskDocument::parse(&doc.serialize());
        let last = reparsed.progress.last().unwrap();
        assert_eq!(last.body, "Verified on device lab.");
        assert_eq!(last.duration.as_deref(), Some("10m"));
    }

    #[test]
    fn description_stops_at_next_section() {
        let doc = TaskDocument::parse("# T\n\n## Description\n\nfirst\n\n## Notes\n\nnot description\n");
        assert_eq!(doc.description.as_deref(), Some("first"));
    }
}
