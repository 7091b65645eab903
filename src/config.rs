use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::system::process::DEFAULT_SYSTEM_MARKERS;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub classifier: ClassifierConfig,
    pub inspector: InspectorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Replaces `<home>/snapshot_tool/snapshots` when set.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub default_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            default_interval_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub system_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            system_markers: DEFAULT_SYSTEM_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub fd_scan_budget_ms: u64,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        InspectorConfig {
            fd_scan_budget_ms: 250,
        }
    }
}

impl InspectorConfig {
    pub fn fd_scan_budget(&self) -> Duration {
        Duration::from_millis(self.fd_scan_budget_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("snapshot_tool").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

/// Falls back to defaults when the file is missing or unreadable. Runs before
/// logging is set up, so problems go to stderr directly.
pub fn load_config_from_path(path: &Path) -> Config {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return Config::default(),
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("warning: ignoring invalid config {}: {e}", path.display());
            Config::default()
        }
    }
}
