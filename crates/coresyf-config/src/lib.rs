//! User configuration for the coresyf tool framework
//!
//! The configuration lives in a small TOML file (`~/.config/coresyf/coresyf.toml`
//! by default, or the path in `CORESYF_CONFIG`). Every key is optional; the
//! accessors below supply the framework defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that points at an alternative configuration file
pub const CONFIG_ENV_VAR: &str = "CORESYF_CONFIG";

pub const DEFAULT_ENTRY_SCRIPT: &str = "run";
pub const DEFAULT_EXAMPLES_FILE: &str = "examples.sh";
pub const DEFAULT_SHELL: &str = "sh";

/// Keys accepted by [`Config::get`] and [`Config::set`]
pub const KEYS: &[&str] = &[
    "scratch-root",
    "command-timeout",
    "example-timeout",
    "shell",
    "entry-script",
    "examples-file",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Shell '{0}' not found on PATH")]
    ShellNotFound(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples_file: Option<String>,
}

impl Config {
    /// Resolve the configuration file path
    pub fn path() -> PathBuf {
        // Honor explicit override for tests / isolated runs.
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir().map_or_else(
                || PathBuf::from(".config/coresyf/coresyf.toml"),
                |h| h.join(".config").join("coresyf").join("coresyf.toml"),
            )
        }

        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map_or_else(
                || PathBuf::from("config\\coresyf\\coresyf.toml"),
                |c| c.join("coresyf").join("coresyf.toml"),
            )
        }
    }

    /// Load from the default location, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match key {
            "scratch-root" => self.scratch_root.clone(),
            "command-timeout" => self.command_timeout.map(|t| t.to_string()),
            "example-timeout" => self.example_timeout.map(|t| t.to_string()),
            "shell" => self.shell.clone(),
            "entry-script" => self.entry_script.clone(),
            "examples-file" => self.examples_file.clone(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        match key {
            "scratch-root" => self.scratch_root = Some(value),
            "command-timeout" => self.command_timeout = Some(parse_seconds(key, &value)?),
            "example-timeout" => self.example_timeout = Some(parse_seconds(key, &value)?),
            "shell" => self.shell = Some(value),
            "entry-script" => self.entry_script = Some(value),
            "examples-file" => self.examples_file = Some(value),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Config::default()
    }

    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|key| {
                self.get(key)
                    .ok()
                    .flatten()
                    .map(|value| (*key, value))
            })
            .collect()
    }

    /// Parent directory for per-invocation scratch directories
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root
            .as_ref()
            .map_or_else(std::env::temp_dir, PathBuf::from)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout.map(Duration::from_secs)
    }

    pub fn example_timeout(&self) -> Option<Duration> {
        self.example_timeout.map(Duration::from_secs)
    }

    pub fn entry_script(&self) -> &str {
        self.entry_script.as_deref().unwrap_or(DEFAULT_ENTRY_SCRIPT)
    }

    pub fn examples_file(&self) -> &str {
        self.examples_file.as_deref().unwrap_or(DEFAULT_EXAMPLES_FILE)
    }

    /// Locate the shell used to run command templates
    pub fn resolve_shell(&self) -> Result<PathBuf, ConfigError> {
        let shell = self.shell.as_deref().unwrap_or(DEFAULT_SHELL);
        let candidate = Path::new(shell);
        if candidate.is_absolute() {
            if candidate.exists() {
                return Ok(candidate.to_path_buf());
            }
            return Err(ConfigError::ShellNotFound(shell.to_string()));
        }
        which::which(shell).map_err(|_| ConfigError::ShellNotFound(shell.to_string()))
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
