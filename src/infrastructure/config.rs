use crate::domains::reconcile::DEFAULT_GRACE_PERIOD_SECS;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Shared cloud folder holding the per-record sync snapshots.
    pub sync_dir: Option<PathBuf>,
    pub grace_period_secs: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_dir: None,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
        }
    }
}

pub struct SettingsRepository {
    settings_path: PathBuf,
}

impl SettingsRepository {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("no config directory available"))?
            .join("taskdeck");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(Self {
            settings_path: config_dir.join("settings.json"),
        })
    }

    pub fn at(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    /// A missing or corrupt settings file falls back to defaults.
    pub fn load(&self) -> Settings {
        match fs::read_to_string(&self.settings_path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!(
                    "Could not parse {}: {e}; using defaults",
                    self.settings_path.display()
                );
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        log::debug!("Saving settings to {}", self.settings_path.display());
        let contents = serde_json::to_string_pretty(settings)?;
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.settings_path, contents)?;
        Ok(())
    }
}
