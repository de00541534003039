//! Configuration for pipeterm.
//!
//! Settings are read from `~/.pipeterm/config.toml`; every field is optional
//! and falls back to its default:
//!
//! ```toml
//! shell = "/bin/bash"
//! shell_args = ["--norc"]
//! home = "/home/me"
//! path = "/usr/local/bin:/usr/bin:/bin"
//! read_buffer_size = 4096
//! max_sequence_len = 4096
//! close_timeout_ms = 1000
//! log_level = "info"
//!
//! [colors]
//! foreground = { r = 255, g = 255, b = 255 }
//! background = { r = 0, g = 0, b = 0 }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::process::{DEFAULT_PATH, DEFAULT_SHELL};
use crate::core::session::SessionConfig;
use crate::core::term::{ColorResolver, Rgb, DEFAULT_MAX_SEQUENCE_LEN};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not determine config path")]
    NoConfigDir,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell executable
    pub shell: String,
    pub shell_args: Vec<String>,
    /// HOME passed to the shell; the user's home directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,
    /// PATH passed to the shell
    pub path: String,
    pub read_buffer_size: usize,
    /// Longest escape sequence buffered before it is dropped
    pub max_sequence_len: usize,
    pub close_timeout_ms: u64,
    /// Log filter used when `PIPETERM_LOG` is not set
    pub log_level: String,
    pub colors: ColorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            shell_args: Vec::new(),
            home: None,
            path: DEFAULT_PATH.to_string(),
            read_buffer_size: 4096,
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            close_timeout_ms: 1000,
            log_level: "info".to_string(),
            colors: ColorConfig::default(),
        }
    }
}

/// Theme default colors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub foreground: Rgb,
    pub background: Rgb,
}

impl Default for ColorConfig {
    fn default() -> Self {
        let resolver = ColorResolver::default();
        Self {
            foreground: resolver.default_foreground,
            background: resolver.default_background,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::get_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::get_config_path().ok_or(ConfigError::NoConfigDir)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|source| ConfigError::Write { path, source })
    }

    /// Session settings for the given geometry
    pub fn session_config(&self, cols: u16, rows: u16) -> SessionConfig {
        SessionConfig {
            shell: self.shell.clone(),
            args: self.shell_args.clone(),
            home: self.home.clone(),
            path: self.path.clone(),
            cols,
            rows,
            read_buffer_size: self.read_buffer_size,
            max_sequence_len: self.max_sequence_len,
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            ..SessionConfig::default()
        }
    }

    pub fn color_resolver(&self) -> ColorResolver {
        ColorResolver::new(self.colors.foreground, self.colors.background)
    }

    /// Directory holding the config file and the log
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".pipeterm");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
