use clap::Parser;
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Taskdeck - task folders for your agent sessions
#[derive(Debug, Parser)]
#[command(
    name = "taskdeck",
    about = "Taskdeck - keeps session records and task folders in agreement",
    version = VERSION,
    help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}

EXAMPLES:
    taskdeck                            # Reconcile current directory once
    taskdeck /path/to/project           # Reconcile a specific project
    taskdeck --watch                    # Keep reconciling on filesystem changes
    taskdeck --sync-dir ~/Cloud/deck    # Merge with a shared sync folder
"
)]
pub struct Cli {
    /// Optional project directory to open. Defaults to current working directory if omitted.
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Shared folder for cross-device snapshot files (overrides settings)
    #[arg(long, value_name = "DIR")]
    pub sync_dir: Option<PathBuf>,

    /// Keep running and reconcile whenever the task tree changes
    #[arg(long)]
    pub watch: bool,

    /// Registry database path (defaults to the platform data directory)
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Grace period in seconds before a folderless session is orphaned
    #[arg(long, value_name = "SECS")]
    pub grace_secs: Option<i64>,
}
