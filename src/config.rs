use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// Default configuration
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000";
pub const DEFAULT_LOG_FILTER: &str = "taskfeed_client=info";

/// Environment variable overriding `ws_base_url`
pub const ENV_WS_URL: &str = "TASKFEED_WS_URL";
/// Environment variable overriding `fixture`
pub const ENV_FIXTURE: &str = "TASKFEED_FIXTURE";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    /// Base of the task stream endpoints, e.g. `ws://localhost:8000`
    pub ws_base_url: String,
    /// Where exported snapshots are written (defaults to the data dir)
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    /// Captured snapshot replayed at the start of every session
    #[serde(default)]
    pub fixture: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ws_base_url: DEFAULT_WS_URL.to_string(),
            export_dir: None,
            fixture: None,
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Apply environment overrides on top of the persisted values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_WS_URL).ok(),
            std::env::var(ENV_FIXTURE).ok().map(PathBuf::from),
        )
    }

    fn with_overrides(mut self, ws_url: Option<String>, fixture: Option<PathBuf>) -> Self {
        if let Some(url) = ws_url.filter(|u| !u.trim().is_empty()) {
            self.ws_base_url = url;
        }
        if let Some(path) = fixture {
            self.fixture = Some(path);
        }
        self
    }

    /// Directory for exported snapshots
    pub fn resolved_export_dir(&self) -> PathBuf {
        if let Some(dir) = &self.export_dir {
            return dir.clone();
        }
        project_dirs()
            .map(|proj| proj.data_dir().join("exports"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "taskfeed", "taskfeed-client")
}

pub fn settings_path() -> Result<PathBuf, ConfigError> {
    let proj = project_dirs().ok_or(ConfigError::NoConfigDir)?;
    let dir = proj.config_dir();
    fs::create_dir_all(dir)?;
    Ok(dir.join("settings.json"))
}

/// Load persisted settings, falling back to defaults when none are saved yet.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    save_settings_to(settings, &settings_path()?)
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    let data = serde_json::to_string_pretty(settings)?;
    let mut file = fs::File::create(path)?;
    file.write_all(data.as_bytes())?;
    Ok(())
}
