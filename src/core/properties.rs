//! Flat key/value configuration
//!
//! Translates `richlog.`-prefixed properties into changes on a
//! [`Configuration`]. Translation never fails as a whole: every entry gets a
//! [`ConfigOutcome`] and malformed entries are skipped.
//!
//! | key | value |
//! |---|---|
//! | `richlog.rootLevel` | level name |
//! | `richlog.logger.<name>` | level name (first comma-separated token) |
//! | `richlog.console.enabled` / `.colors` | bool |
//! | `richlog.console.target` | `STDOUT` / `STDERR` |
//! | `richlog.console.pattern` | conversion pattern |
//! | `richlog.file.enabled` / `.compress` / `.lock` | bool |
//! | `richlog.file.path` | path; enables the file appender unless `file.enabled` is given |
//! | `richlog.file.maxSize` | bytes, or with a `KB`/`MB`/`GB` suffix; `0` disables size rotation |
//! | `richlog.file.maxBackups` | integer |
//! | `richlog.file.pattern` | conversion pattern |
//! | `richlog.file.rotationInterval` | duration with `ms`/`s`/`m`/`h`/`d` suffix (seconds if bare) |
//! | `richlog.queue.capacity` | integer > 0 |
//! | `richlog.queue.overflowPolicy` | `BLOCK` / `DROP_OLDEST` / `DROP_NEWEST` |
//! | `richlog.batch.size` | integer > 0 |
//! | `richlog.batch.timeoutMs` / `richlog.shutdown.timeoutMs` / `richlog.appender.retryIntervalMs` | milliseconds |

use super::config::{Configuration, ConsoleTarget};
use super::log_level::LogLevel;
use super::overflow_policy::OverflowPolicy;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROPERTY_PREFIX: &str = "richlog.";

const FILE_PATH_KEY: &str = "file.path";
const FILE_ENABLED_KEY: &str = "file.enabled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    Applied,
    /// Not a key this engine understands.
    Ignored,
    /// Malformed value; the previous setting is kept.
    Skipped { reason: String },
    /// Well-formed, but the resource it names could not be used.
    Failed { reason: String },
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigStatus::Applied => write!(f, "applied"),
            ConfigStatus::Ignored => write!(f, "ignored"),
            ConfigStatus::Skipped { reason } => write!(f, "skipped: {}", reason),
            ConfigStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOutcome {
    pub key: String,
    pub value: String,
    pub status: ConfigStatus,
}

/// Per-key result of applying a property set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    outcomes: Vec<ConfigOutcome>,
}

impl ConfigReport {
    pub fn outcomes(&self) -> &[ConfigOutcome] {
        &self.outcomes
    }

    pub fn status_of(&self, key: &str) -> Option<&ConfigStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.key == key)
            .map(|outcome| &outcome.status)
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == ConfigStatus::Applied)
            .count()
    }

    /// Entries that were skipped or failed.
    pub fn problems(&self) -> impl Iterator<Item = &ConfigOutcome> {
        self.outcomes.iter().filter(|outcome| {
            matches!(
                outcome.status,
                ConfigStatus::Skipped { .. } | ConfigStatus::Failed { .. }
            )
        })
    }

    /// True when no entry was skipped or failed.
    pub fn is_clean(&self) -> bool {
        self.problems().next().is_none()
    }

    fn push(&mut self, key: &str, value: &str, status: ConfigStatus) {
        self.outcomes.push(ConfigOutcome {
            key: key.to_string(),
            value: value.to_string(),
            status,
        });
    }
}

/// Apply `properties` to `config`.
///
/// Entries are processed in key order so the result does not depend on the
/// iteration order of the source map. When the file appender ends up enabled
/// by this call, its path is opened once; if that fails the `file.path` entry
/// is reported as [`ConfigStatus::Failed`] and the previous path and enabled
/// flag are restored. Other `file.*` entries of the same call still apply.
pub fn apply_properties<I, K, V>(config: &mut Configuration, properties: I) -> ConfigReport
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut entries: Vec<(String, String)> = properties
        .into_iter()
        .map(|(k, v)| (k.as_ref().trim().to_string(), v.as_ref().trim().to_string()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let previous_file = config.file.clone();
    let mut report = ConfigReport::default();
    let mut path_applied = false;
    let mut enabled_given = false;

    for (key, value) in &entries {
        let Some(name) = key.strip_prefix(PROPERTY_PREFIX) else {
            report.push(key, value, ConfigStatus::Ignored);
            continue;
        };

        let status = match apply_one(config, name, value) {
            Ok(true) => ConfigStatus::Applied,
            Ok(false) => ConfigStatus::Ignored,
            Err(reason) => ConfigStatus::Skipped { reason },
        };

        if status == ConfigStatus::Applied {
            match name {
                FILE_PATH_KEY => path_applied = true,
                FILE_ENABLED_KEY => enabled_given = true,
                _ => {}
            }
        }
        report.push(key, value, status);
    }

    if path_applied && !enabled_given {
        config.file.enabled = true;
    }

    if path_applied && config.file.enabled {
        if let Some(path) = config.file.path.clone() {
            if let Err(reason) = probe_file(&path) {
                config.file.path = previous_file.path;
                config.file.enabled = previous_file.enabled;

                let path_key = format!("{}{}", PROPERTY_PREFIX, FILE_PATH_KEY);
                let enabled_key = format!("{}{}", PROPERTY_PREFIX, FILE_ENABLED_KEY);
                for outcome in report.outcomes.iter_mut() {
                    if (outcome.key == path_key || outcome.key == enabled_key)
                        && outcome.status == ConfigStatus::Applied
                    {
                        outcome.status = ConfigStatus::Failed {
                            reason: reason.clone(),
                        };
                    }
                }
            }
        }
    }

    report
}

/// Returns `Ok(false)` for keys that are not recognized.
fn apply_one(config: &mut Configuration, name: &str, value: &str) -> Result<bool, String> {
    if let Some(logger) = name.strip_prefix("logger.") {
        if logger.is_empty() {
            return Err("empty logger name".to_string());
        }
        let level_name = value.split(',').next().unwrap_or_default();
        let level = parse_level(level_name)?;
        config.logger_levels.insert(logger.to_string(), level);
        return Ok(true);
    }

    match name {
        "rootLevel" => config.root_level = parse_level(value)?,

        "console.enabled" => config.console.enabled = parse_bool(value)?,
        "console.target" => config.console.target = parse_target(value)?,
        "console.pattern" => config.console.pattern = non_empty(value)?,
        "console.colors" => config.console.colors = parse_bool(value)?,

        FILE_ENABLED_KEY => config.file.enabled = parse_bool(value)?,
        FILE_PATH_KEY => config.file.path = Some(PathBuf::from(non_empty(value)?)),
        "file.pattern" => config.file.pattern = non_empty(value)?,
        "file.maxSize" => {
            config.file.max_size = match parse_size(value)? {
                0 => None,
                size => Some(size),
            }
        }
        "file.maxBackups" => config.file.max_backups = parse_number(value)?,
        "file.compress" => config.file.compress = parse_bool(value)?,
        "file.rotationInterval" => config.file.rotation_interval = Some(parse_duration(value)?),
        "file.lock" => config.file.lock = parse_bool(value)?,

        "queue.capacity" => config.pipeline.capacity = parse_positive(value)?,
        "queue.overflowPolicy" => {
            config.pipeline.overflow_policy = OverflowPolicy::from_name(value)
                .ok_or_else(|| format!("unknown overflow policy '{}'", value))?
        }
        "batch.size" => config.pipeline.batch_size = parse_positive(value)?,
        "batch.timeoutMs" => config.pipeline.batch_timeout = parse_millis(value)?,
        "shutdown.timeoutMs" => config.pipeline.shutdown_timeout = parse_millis(value)?,
        "appender.retryIntervalMs" => config.pipeline.retry_interval = parse_millis(value)?,

        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_level(value: &str) -> Result<LogLevel, String> {
    value.parse::<LogLevel>().map_err(|e| e.to_string())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("'{}' is not a boolean", value)),
    }
}

fn parse_target(value: &str) -> Result<ConsoleTarget, String> {
    match value.to_ascii_uppercase().as_str() {
        "STDOUT" | "SYSTEM.OUT" => Ok(ConsoleTarget::Stdout),
        "STDERR" | "SYSTEM.ERR" => Ok(ConsoleTarget::Stderr),
        _ => Err(format!("unknown console target '{}'", value)),
    }
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("value is empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", value))
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match parse_number::<usize>(value)? {
        0 => Err("value must be greater than zero".to_string()),
        n => Ok(n),
    }
}

fn parse_millis(value: &str) -> Result<Duration, String> {
    parse_number(value).map(Duration::from_millis)
}

/// Parse a size such as `512`, `64KB` or `10 MB`.
pub fn parse_size(value: &str) -> Result<u64, String> {
    let upper = value.trim().to_ascii_uppercase();
    let digits_end = upper
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(upper.len());
    let (number, unit) = upper.split_at(digits_end);

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit '{}'", other)),
    };

    let number: u64 = number
        .parse()
        .map_err(|_| format!("'{}' is not a valid size", value))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' is too large", value))
}

/// Parse a duration such as `500ms`, `30s`, `15m`, `1h` or `1d`.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let lower = value.trim().to_ascii_lowercase();
    let digits_end = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (number, unit) = lower.split_at(digits_end);

    let number: u64 = number
        .parse()
        .map_err(|_| format!("'{}' is not a valid duration", value))?;
    let duration = match unit.trim() {
        "ms" => Duration::from_millis(number),
        "" | "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(number.saturating_mul(60)),
        "h" => Duration::from_secs(number.saturating_mul(3600)),
        "d" => Duration::from_secs(number.saturating_mul(86_400)),
        other => return Err(format!("unknown duration unit '{}'", other)),
    };

    if duration.is_zero() {
        Err("duration must be greater than zero".to_string())
    } else {
        Ok(duration)
    }
}

fn probe_file(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                format!("cannot create directory '{}': {}", parent.display(), e)
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| format!("cannot open '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_levels() {
        let mut config = Configuration::default();
        let report = apply_properties(
            &mut config,
            props(&[
                ("richlog.rootLevel", "warn"),
                ("richlog.logger.app.db", "DEBUG, dbFile"),
            ]),
        );

        assert!(report.is_clean());
        assert_eq!(report.applied_count(), 2);
        assert_eq!(config.root_level, LogLevel::Warn);
        assert_eq!(config.level_for("app.db"), LogLevel::Debug);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let mut config = Configuration::default();
        let report = apply_properties(
            &mut config,
            props(&[
                ("richlog.rootLevel", "LOUD"),
                ("richlog.batch.size", "0"),
                ("richlog.file.maxSize", "ten"),
                ("richlog.console.enabled", "maybe"),
            ]),
        );

        assert_eq!(report.problems().count(), 4);
        assert!(matches!(
            report.status_of("richlog.rootLevel"),
            Some(ConfigStatus::Skipped { .. })
        ));
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn test_unknown_and_unprefixed_keys_are_ignored() {
        let mut config = Configuration::default();
        let report = apply_properties(
            &mut config,
            props(&[("richlog.nonsense", "1"), ("log4j.rootLogger", "INFO")]),
        );

        assert_eq!(report.status_of("richlog.nonsense"), Some(&ConfigStatus::Ignored));
        assert_eq!(report.status_of("log4j.rootLogger"), Some(&ConfigStatus::Ignored));
        assert!(report.is_clean());
    }

    #[test]
    fn test_file_path_enables_file_appender() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("app.log");
        let mut config = Configuration::default();

        let report = apply_properties(
            &mut config,
            props(&[
                ("richlog.file.path", path.to_str().unwrap()),
                ("richlog.file.maxSize", "1MB"),
                ("richlog.file.maxBackups", "3"),
                ("richlog.file.compress", "true"),
                ("richlog.file.rotationInterval", "1h"),
            ]),
        );

        assert!(report.is_clean(), "{:?}", report);
        assert!(config.file.is_active());
        assert_eq!(config.file.max_size, Some(1024 * 1024));
        assert_eq!(config.file.max_backups, 3);
        assert_eq!(config.file.rotation_interval, Some(Duration::from_secs(3600)));
        assert!(path.exists());
    }

    #[test]
    fn test_explicit_file_enabled_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut config = Configuration::default();

        apply_properties(
            &mut config,
            props(&[
                ("richlog.file.path", path.to_str().unwrap()),
                ("richlog.file.enabled", "false"),
            ]),
        );

        assert!(!config.file.enabled);
        assert_eq!(config.file.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_unwritable_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("app.log");

        let mut config = Configuration::default();
        let report = apply_properties(
            &mut config,
            props(&[("richlog.file.path", path.to_str().unwrap())]),
        );

        assert!(matches!(
            report.status_of("richlog.file.path"),
            Some(ConfigStatus::Failed { .. })
        ));
        assert!(!config.file.is_active());
    }

    #[test]
    fn test_failed_path_keeps_other_file_settings() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("app.log");

        let mut config = Configuration::default();
        let report = apply_properties(
            &mut config,
            props(&[
                ("richlog.file.path", path.to_str().unwrap()),
                ("richlog.file.enabled", "true"),
                ("richlog.file.maxSize", "1KB"),
                ("richlog.file.maxBackups", "3"),
            ]),
        );

        assert!(matches!(
            report.status_of("richlog.file.path"),
            Some(ConfigStatus::Failed { .. })
        ));
        assert!(matches!(
            report.status_of("richlog.file.enabled"),
            Some(ConfigStatus::Failed { .. })
        ));
        assert_eq!(report.status_of("richlog.file.maxSize"), Some(&ConfigStatus::Applied));
        assert_eq!(report.status_of("richlog.file.maxBackups"), Some(&ConfigStatus::Applied));

        assert_eq!(config.file.path, None);
        assert!(!config.file.enabled);
        assert_eq!(config.file.max_size, Some(1024));
        assert_eq!(config.file.max_backups, 3);
    }

    #[test]
    fn test_pipeline_keys() {
        let mut config = Configuration::default();
        let report = apply_properties(
            &mut config,
            props(&[
                ("richlog.queue.capacity", "128"),
                ("richlog.queue.overflowPolicy", "drop_oldest"),
                ("richlog.batch.timeoutMs", "25"),
                ("richlog.console.target", "System.err"),
            ]),
        );

        assert!(report.is_clean());
        assert_eq!(config.pipeline.capacity, 128);
        assert_eq!(config.pipeline.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.pipeline.batch_timeout, Duration::from_millis(25));
        assert_eq!(config.console.target, ConsoleTarget::Stderr);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512"), Ok(512));
        assert_eq!(parse_size("64KB"), Ok(64 * 1024));
        assert_eq!(parse_size("10 mb"), Ok(10 * 1024 * 1024));
        assert_eq!(parse_size("2G"), Ok(2 * 1024 * 1024 * 1024));
        assert!(parse_size("MB").is_err());
        assert!(parse_size("10TB").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("1d"), Ok(Duration::from_secs(86_400)));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("soon").is_err());
    }
}
