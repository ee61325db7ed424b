//! Persistent toolkit settings.
//!
//! The settings file lives at `<config dir>/mp-toolkit/settings.toml`.
//! Every value is optional; resolution always prefers an explicit override,
//! then the file, then the built-in default.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobResources;
use crate::tools::{ProcessRunner, ToolLocator, default_tools_root};
use crate::workspace::default_scratch_root;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown setting '{0}' (expected one of: {keys})", keys = SETTING_KEYS.join(", "))]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Keys accepted by [`Settings::set`].
pub const SETTING_KEYS: &[&str] = &["tools.dir", "tools.timeout_secs", "workspace.dir"];

/// Canonical path to the settings file.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("mp-toolkit").join("settings.toml")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub workspace: WorkspaceSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Root containing the per-OS tool folders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Per-tool time limit in seconds; absent or 0 means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Scratch root for job workspaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Values supplied on the command line, each taking precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub tools_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved configuration for one toolkit session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub tools_root: PathBuf,
    pub scratch_root: PathBuf,
    pub tool_timeout: Option<Duration>,
}

impl Settings {
    /// Set one value by its dotted key. An empty `value` clears the key so
    /// the built-in default applies again.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        let path = || (!value.is_empty()).then(|| PathBuf::from(value));

        match key {
            "tools.dir" => self.tools.dir = path(),
            "workspace.dir" => self.workspace.dir = path(),
            "tools.timeout_secs" => {
                self.tools.timeout_secs = if value.is_empty() {
                    None
                } else {
                    let secs = value.parse().map_err(|_| SettingsError::InvalidValue {
                        key: "tools.timeout_secs",
                        value: value.to_string(),
                    })?;
                    Some(secs)
                };
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn resolve(&self, overrides: &SettingsOverrides) -> ResolvedSettings {
        let tools_root = overrides
            .tools_dir
            .clone()
            .or_else(|| self.tools.dir.clone())
            .unwrap_or_else(default_tools_root);
        let scratch_root = overrides
            .scratch_dir
            .clone()
            .or_else(|| self.workspace.dir.clone())
            .unwrap_or_else(default_scratch_root);
        let tool_timeout = overrides
            .timeout_secs
            .or(self.tools.timeout_secs)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        ResolvedSettings {
            tools_root,
            scratch_root,
            tool_timeout,
        }
    }
}

impl ResolvedSettings {
    /// Build the collaborators jobs run with: real processes, real tools.
    pub fn job_resources(&self) -> JobResources {
        JobResources {
            tools: Arc::new(ToolLocator::new(&self.tools_root)),
            runner: Arc::new(ProcessRunner::new().with_timeout(self.tool_timeout)),
            scratch_root: self.scratch_root.clone(),
        }
    }
}

/// Load settings from the canonical path.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(&settings_path())
}

/// Load settings from `path`. A missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings, SettingsError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Settings::default());
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Save settings to `path`, writing a temp file and renaming it into place.
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let serialized = toml::to_string_pretty(settings)?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, serialized).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// The settings as they would be written to disk, for display.
pub fn render_settings(settings: &Settings) -> Result<String, SettingsError> {
    Ok(toml::to_string_pretty(settings)?)
}
