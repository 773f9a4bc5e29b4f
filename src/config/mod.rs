//! Configuration module for himena-relion
//!
//! Two sources feed the runtime configuration:
//! - **Environment** - the `RELION_*` variables the RELION GUI itself reads
//!   (thread and MPI limits, queue submission defaults). They are only ever
//!   read, never written back.
//! - **Config file** - an optional `config.toml` with watcher settings and
//!   fallbacks for the environment.
//!
//! # Config Location
//!
//! - **Linux**: `~/.config/himena-relion/config.toml`
//! - **macOS**: `~/Library/Application Support/himena-relion/config.toml`
//! - **Windows**: `%APPDATA%\himena-relion\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use himena_relion::config::AppConfig;
//!
//! let config = AppConfig::load_or_default();
//! let env = config.relion_env();
//! println!("threads up to {}", env.thread_max);
//! ```

use crate::error::{RelionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Application identifier for the config directory
pub const APP_ID: &str = "himena-relion";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default watcher poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default capacity of the watcher event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub const DEFAULT_MPI_MAX: u32 = 64;
pub const DEFAULT_THREAD_MAX: u32 = 64;
pub const DEFAULT_MINIMUM_DEDICATED: u32 = 1;
pub const DEFAULT_QSUB_COMMAND: &str = "qsub";
pub const DEFAULT_QUEUE_NAME: &str = "openmpi";

// ==================== RELION Environment ====================

/// Defaults RELION takes from its environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelionEnv {
    /// `RELION_MPI_MAX`
    pub mpi_max: u32,
    /// `RELION_THREAD_MAX`
    pub thread_max: u32,
    /// `RELION_MINIMUM_DEDICATED`
    pub minimum_dedicated: u32,
    /// `RELION_QUEUE_USE`
    pub queue_use: bool,
    /// `RELION_QSUB_COMMAND`
    pub qsub_command: String,
    /// `RELION_QUEUE_NAME`
    pub queue_name: String,
    /// `RELION_QSUB_TEMPLATE`
    pub qsub_template: String,
}

impl Default for RelionEnv {
    fn default() -> Self {
        Self {
            mpi_max: DEFAULT_MPI_MAX,
            thread_max: DEFAULT_THREAD_MAX,
            minimum_dedicated: DEFAULT_MINIMUM_DEDICATED,
            queue_use: false,
            qsub_command: DEFAULT_QSUB_COMMAND.to_string(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            qsub_template: String::new(),
        }
    }
}

impl RelionEnv {
    /// Read the process environment over the built-in defaults
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Replace fields whose variable `lookup` returns
    ///
    /// Invalid integers keep the current value and log a warning.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let int = |key: &str, current: u32| match lookup(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring {key}={raw:?}: not an integer, using {current}");
                current
            }),
            None => current,
        };
        self.mpi_max = int("RELION_MPI_MAX", self.mpi_max);
        self.thread_max = int("RELION_THREAD_MAX", self.thread_max);
        self.minimum_dedicated = int("RELION_MINIMUM_DEDICATED", self.minimum_dedicated);

        if let Some(raw) = lookup("RELION_QUEUE_USE") {
            self.queue_use = matches!(raw.trim(), "1" | "Yes");
        }
        if let Some(cmd) = lookup("RELION_QSUB_COMMAND") {
            self.qsub_command = cmd;
        }
        if let Some(name) = lookup("RELION_QUEUE_NAME") {
            self.queue_name = name;
        }
        if let Some(template) = lookup("RELION_QSUB_TEMPLATE") {
            self.qsub_template = template;
        }
        self
    }
}

/// Config-file fallbacks for [`RelionEnv`]; unset fields keep the built-in default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpi_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_dedicated: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_use: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qsub_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qsub_template: Option<String>,
}

impl EnvDefaults {
    fn apply(&self, mut env: RelionEnv) -> RelionEnv {
        if let Some(v) = self.mpi_max {
            env.mpi_max = v;
        }
        if let Some(v) = self.thread_max {
            env.thread_max = v;
        }
        if let Some(v) = self.minimum_dedicated {
            env.minimum_dedicated = v;
        }
        if let Some(v) = self.queue_use {
            env.queue_use = v;
        }
        if let Some(v) = &self.qsub_command {
            env.qsub_command = v.clone();
        }
        if let Some(v) = &self.queue_name {
            env.queue_name = v.clone();
        }
        if let Some(v) = &self.qsub_template {
            env.qsub_template = v.clone();
        }
        env
    }
}

// ==================== App Config ====================

/// Get the path of the config file
pub fn config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Settings loaded from `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// How often job directories are polled for changes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Bound of the watcher event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,

    /// Fallbacks for the `RELION_*` variables
    #[serde(default)]
    pub env: EnvDefaults,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_filter: None,
            env: EnvDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Load the config from the default location; a missing file gives defaults
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            RelionError::Config("Could not determine config directory".to_string())
        })?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelionError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RelionError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load the config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| RelionError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| RelionError::Config(format!("Failed to write config: {}", e)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Environment defaults: built-ins, then this file, then `RELION_*` variables
    pub fn relion_env(&self) -> RelionEnv {
        self.env
            .apply(RelionEnv::default())
            .overlay(|key| std::env::var(key).ok())
    }
}
