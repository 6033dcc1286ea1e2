//! Module for application configuration settings.
//!
//! User configurations may be specified in a configuration file. Command line
//! arguments take precedence over anything read from disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tree_fs::fs::{CacheTtl, TreeFsConfig};

fn default_mount_point() -> PathBuf {
    dirs::runtime_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .map_or_else(
            || PathBuf::from("/tmp/tree-fs/mnt"),
            |dir| dir.join("tree-fs").join("mnt"),
        )
}

fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

fn current_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}

/// When to emit ANSI color codes in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Color when stderr is a terminal, honoring `FORCE_COLOR` and `NO_COLOR`.
    #[default]
    Auto,
    Always,
    Never,
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LogConfig {
    #[serde(default)]
    pub color: ColorMode,
}

impl LogConfig {
    pub fn should_use_color(&self) -> bool {
        match self.color {
            ColorMode::Auto => crate::term::should_use_color(&std::io::stderr()),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Application configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// The host directory to expose.
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// The mount point for the filesystem.
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// The owner reported for every entry. If not specified, the current user.
    #[serde(default = "current_uid")]
    pub uid: u32,

    /// The group reported for every entry. If not specified, the current group.
    #[serde(default = "current_gid")]
    pub gid: u32,

    /// Kernel cache lifetime in seconds: negative disables caching, zero picks
    /// the default.
    #[serde(default)]
    pub cache_ttl_secs: i64,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            mount_point: default_mount_point(),
            uid: current_uid(),
            gid: current_gid(),
            cache_ttl_secs: 0,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Config {
    /// Validate the correctness of the configuration.
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match &self.source {
            None => errors.push("No source directory was given.".to_owned()),
            Some(source) => {
                if !source.is_dir() {
                    errors.push(format!(
                        "Source '{}' is not a directory.",
                        source.display()
                    ));
                }
                if source == &self.mount_point {
                    errors.push(format!(
                        "Mount point '{}' is the same as the source.",
                        self.mount_point.display()
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Session settings for the filesystem core.
    pub fn fs_config(&self) -> TreeFsConfig {
        TreeFsConfig {
            uid: self.uid,
            gid: self.gid,
            cache_ttl: CacheTtl::from_secs(self.cache_ttl_secs),
        }
    }

    /// Returns config file paths in descending priority order.
    /// On macOS, skips `dirs::config_dir()` (resolves to ~/Library/Application Support/).
    fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(not(target_os = "macos"))]
        if let Some(xdg) = dirs::config_dir() {
            paths.push(xdg.join("tree-fs").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("tree-fs").join("config.toml"));
        }

        paths.push(PathBuf::from("/etc/tree-fs/config.toml"));

        paths
    }

    /// Finds the first existing config file from search paths.
    fn find_config_file() -> Option<PathBuf> {
        Self::config_search_paths().into_iter().find(|p| p.exists())
    }

    /// Loads config from a single TOML file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = ?path, "Loading configuration file.");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from the external path if given, otherwise from the
    /// first config file found. Falls back to defaults when there is none.
    pub fn load(external_config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = external_config_path {
            return Self::load_from_file(path);
        }

        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => {
                debug!("No configuration file found, using defaults.");
                Ok(Self::default())
            }
        }
    }

    /// Apply command line overrides.
    #[must_use]
    pub fn with_overrides(mut self, source: Option<PathBuf>, mount_point: Option<PathBuf>) -> Self {
        if source.is_some() {
            self.source = source;
        }
        if let Some(mount_point) = mount_point {
            self.mount_point = mount_point;
        }
        self
    }
}
