//! Configuration snapshot
//!
//! A [`Configuration`] is an immutable value once published through the
//! [`ConfigurationManager`](super::config_manager::ConfigurationManager).
//! Changes are made on a copy that replaces the published snapshot in one
//! atomic swap.

use super::formatter::DEFAULT_PATTERN;
use super::log_level::LogLevel;
use super::overflow_policy::OverflowPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the root logger.
pub const ROOT_LOGGER_NAME: &str = "ROOT";

/// Default grace period for draining the queue at shutdown (5 seconds)
///
/// This timeout is used when the manager is dropped without explicit shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(10);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_BACKUPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub target: ConsoleTarget,
    pub pattern: String,
    /// Colour the level name; needs the `console-colors` feature.
    pub colors: bool,
}

impl ConsoleConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: ConsoleTarget::Stdout,
            pattern: DEFAULT_PATTERN.to_string(),
            colors: false,
        }
    }
}

/// Settings of the configured rotating file appender.
///
/// `max_size` and `rotation_interval` select the rotation strategy: either,
/// both or neither may be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub pattern: String,
    pub max_size: Option<u64>,
    pub rotation_interval: Option<Duration>,
    pub max_backups: usize,
    /// Gzip rotated backups in the background.
    pub compress: bool,
    /// Hold an advisory exclusive lock on the active file.
    pub lock: bool,
}

impl FileConfig {
    /// An enabled file configuration writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    #[must_use]
    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// The file appender is built only when enabled with a path.
    pub fn is_active(&self) -> bool {
        self.enabled && self.path.is_some()
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            pattern: DEFAULT_PATTERN.to_string(),
            max_size: Some(DEFAULT_MAX_FILE_SIZE),
            rotation_interval: None,
            max_backups: DEFAULT_MAX_BACKUPS,
            compress: false,
            lock: false,
        }
    }
}

/// Queue and drain worker settings.
///
/// `capacity` and `overflow_policy` are fixed when the manager is built; the
/// batch and retry settings are read by the worker before every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::Block,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Complete engine configuration.
///
/// Logger levels are not hierarchical: a logger uses its exact-name override
/// if there is one, and the root level otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub root_level: LogLevel,
    pub logger_levels: HashMap<String, LogLevel>,
    pub console: ConsoleConfig,
    pub file: FileConfig,
    pub pipeline: PipelineConfig,
    /// Version stamped by the configuration manager when published.
    #[serde(skip)]
    pub generation: u32,
}

impl Configuration {
    /// Effective threshold for the logger called `name`.
    pub fn level_for(&self, name: &str) -> LogLevel {
        if name == ROOT_LOGGER_NAME {
            return self.root_level;
        }
        self.logger_levels
            .get(name)
            .copied()
            .unwrap_or(self.root_level)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            root_level: LogLevel::Info,
            logger_levels: HashMap::new(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            pipeline: PipelineConfig::default(),
            generation: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_uses_exact_override() {
        let mut config = Configuration::default();
        config.root_level = LogLevel::Warn;
        config
            .logger_levels
            .insert("app.db".to_string(), LogLevel::Debug);

        assert_eq!(config.level_for("app.db"), LogLevel::Debug);
        // No inheritance from "app.db" to its children
        assert_eq!(config.level_for("app.db.pool"), LogLevel::Warn);
        assert_eq!(config.level_for("app"), LogLevel::Warn);
        assert_eq!(config.level_for(ROOT_LOGGER_NAME), LogLevel::Warn);
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.root_level, LogLevel::Info);
        assert!(config.console.enabled);
        assert!(!config.file.is_active());
        assert_eq!(config.pipeline.overflow_policy, OverflowPolicy::Block);
        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.pipeline.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn test_file_config_builder() {
        let file = FileConfig::new("/tmp/app.log")
            .with_max_size(1024)
            .with_max_backups(3)
            .with_compression(true);
        assert!(file.is_active());
        assert_eq!(file.max_size, Some(1024));
        assert_eq!(file.max_backups, 3);
        assert!(file.compress);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let json = r#"{"root_level":"DEBUG","console":{"target":"STDERR"}}"#;
        let config: Configuration = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.root_level, LogLevel::Debug);
        assert_eq!(config.console.target, ConsoleTarget::Stderr);
        assert!(config.console.enabled);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }
}
