//! Rotating file appender with automatic log rotation
//!
//! This module provides a file appender that rotates log files by size, by
//! time interval, or by whichever of the two comes first. Rotated files are
//! kept as numbered backups next to the active file (`app.log.1` is the most
//! recent) and can be gzip-compressed in the background.

use super::compressor::{with_suffix, Compressor};
use crate::core::appender::Appender;
use crate::core::config::{FileConfig, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_FILE_SIZE};
use crate::core::diagnostics::{DiagnosticKind, Diagnostics};
use crate::core::error::{LoggerError, Result};
use crate::core::formatter::PatternFormatter;
use crate::core::log_event::LogEvent;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const MAX_DELETION_FAILURES: usize = 5;

/// Rotation strategy defining when to rotate log files
///
/// # Examples
///
/// ```
/// use richlog::appenders::RotationStrategy;
/// use std::time::Duration;
///
/// // Rotate when file reaches 100 MB
/// let size_strategy = RotationStrategy::Size { max_bytes: 100 * 1024 * 1024 };
///
/// // Rotate every hour
/// let time_strategy = RotationStrategy::Time { interval: Duration::from_secs(3600) };
///
/// // Rotate on size OR time, whichever comes first
/// let hybrid_strategy = RotationStrategy::Hybrid {
///     max_bytes: 50 * 1024 * 1024,
///     interval: Duration::from_secs(24 * 3600),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationStrategy {
    /// Rotate as soon as the file reaches `max_bytes`
    Size { max_bytes: u64 },

    /// Rotate before the first write after `interval` has passed
    Time { interval: Duration },

    /// Rotate on size OR time, whichever comes first
    Hybrid { max_bytes: u64, interval: Duration },

    /// No rotation (useful for testing or when external rotation is used)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl RotationStrategy {
    #[must_use]
    pub fn size(max_bytes: u64) -> Self {
        RotationStrategy::Size { max_bytes }
    }

    #[must_use]
    pub fn time(interval: Duration) -> Self {
        RotationStrategy::Time { interval }
    }

    /// Create a hybrid rotation strategy (size OR time)
    #[must_use]
    pub fn hybrid(max_bytes: u64, interval: Duration) -> Self {
        RotationStrategy::Hybrid { max_bytes, interval }
    }

    #[must_use]
    pub fn never() -> Self {
        RotationStrategy::Never
    }

    /// Strategy implied by an optional size limit and an optional interval.
    pub fn from_limits(max_bytes: Option<u64>, interval: Option<Duration>) -> Self {
        match (max_bytes, interval) {
            (Some(max_bytes), Some(interval)) => RotationStrategy::Hybrid { max_bytes, interval },
            (Some(max_bytes), None) => RotationStrategy::Size { max_bytes },
            (None, Some(interval)) => RotationStrategy::Time { interval },
            (None, None) => RotationStrategy::Never,
        }
    }

    pub fn max_bytes(&self) -> Option<u64> {
        match self {
            RotationStrategy::Size { max_bytes } | RotationStrategy::Hybrid { max_bytes, .. } => {
                Some(*max_bytes)
            }
            _ => None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        match self {
            RotationStrategy::Time { interval } | RotationStrategy::Hybrid { interval, .. } => {
                Some(*interval)
            }
            _ => None,
        }
    }
}

/// Configuration for rotating file appender
///
/// # Examples
///
/// ```
/// use richlog::appenders::{RotationPolicy, RotationStrategy};
/// use std::time::Duration;
///
/// // Size-based rotation with compression
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Size { max_bytes: 50 * 1024 * 1024 })
///     .with_max_backups(7)
///     .with_compression(true);
///
/// assert_eq!(policy.max_file_size(), Some(50 * 1024 * 1024));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotation strategy defining when to rotate
    pub strategy: RotationStrategy,
    /// Maximum number of rotated files to keep; 0 truncates on rotation
    pub max_backup_files: usize,
    /// Whether to compress rotated files
    pub compress: bool,
    /// Hold an advisory exclusive lock on the active file
    pub lock: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backup_files: DEFAULT_MAX_BACKUPS,
            compress: false,
            lock: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FileConfig) -> Self {
        Self {
            strategy: RotationStrategy::from_limits(config.max_size, config.rotation_interval),
            max_backup_files: config.max_backups,
            compress: config.compress,
            lock: config.lock,
        }
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set maximum file size (convenience method for size-based rotation)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, size: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes: size };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backup_files = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_lock(mut self, enabled: bool) -> Self {
        self.lock = enabled;
        self
    }

    /// Get the maximum file size if using size-based rotation
    #[must_use]
    pub fn max_file_size(&self) -> Option<u64> {
        self.strategy.max_bytes()
    }
}

/// Rotating file appender
///
/// The file is opened on the first write, creating parent directories as
/// needed. A batch is rendered into one buffer; the buffer is written out
/// before every rotation so each event lands in exactly one file.
///
/// # Examples
///
/// ```no_run
/// use richlog::appenders::{RotatingFileAppender, RotationPolicy, RotationStrategy};
/// use std::time::Duration;
///
/// // Size-based rotation (default)
/// let appender = RotatingFileAppender::new("/var/log/app.log").unwrap();
///
/// // Hourly rotation keeping a day of compressed backups
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::Time { interval: Duration::from_secs(3600) })
///     .with_max_backups(24)
///     .with_compression(true);
/// let appender = RotatingFileAppender::with_policy("/var/log/app.log", policy)
///     .unwrap()
///     .with_pattern("%date{HH:mm:ss.SSS} %-5level %logger - %message%n");
/// ```
pub struct RotatingFileAppender {
    base_path: PathBuf,
    policy: RotationPolicy,
    formatter: PatternFormatter,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    /// Timestamp of the last rotation (used for time-based strategies)
    last_rotation: SystemTime,
    /// Counter for consecutive deletion failures (reset on successful deletion)
    deletion_failure_count: usize,
    buffer: String,
    compressor: Option<Compressor>,
    diagnostics: Arc<Diagnostics>,
}

impl RotatingFileAppender {
    /// Create a rotating file appender with the default policy
    ///
    /// # Errors
    ///
    /// Returns error if `path` has no file name
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// Create a rotating file appender with a custom policy
    ///
    /// # Errors
    ///
    /// Returns error if `path` has no file name
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        if base_path.file_name().is_none() {
            return Err(LoggerError::file_appender(
                base_path.display().to_string(),
                "path does not name a file",
            ));
        }

        Ok(Self {
            base_path,
            policy,
            formatter: PatternFormatter::default(),
            writer: None,
            current_size: 0,
            last_rotation: SystemTime::now(),
            deletion_failure_count: 0,
            buffer: String::new(),
            compressor: None,
            diagnostics: Arc::new(Diagnostics::new()),
        })
    }

    /// Build the appender described by a file configuration.
    pub fn from_config(config: &FileConfig) -> Result<Self> {
        let path = config
            .path
            .as_ref()
            .ok_or_else(|| LoggerError::config("file.path", "no log file path configured"))?;
        Ok(Self::with_policy(path, RotationPolicy::from_config(config))?
            .with_formatter(PatternFormatter::compile(&config.pattern)))
    }

    #[must_use]
    pub fn with_pattern(self, pattern: &str) -> Self {
        self.with_formatter(PatternFormatter::compile(pattern))
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: PatternFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Report rotation and compression problems here instead of stderr.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    fn ensure_open(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.base_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let file = self.open_file(false)?;
        let metadata = file.metadata().map_err(|e| {
            LoggerError::file_appender(
                self.base_path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;

        self.current_size = metadata.len();
        // An existing file keeps aging from its last modification
        self.last_rotation = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn open_file(&self, truncate: bool) -> Result<File> {
        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }

        let file = options.open(&self.base_path).map_err(|e| {
            LoggerError::file_appender(
                self.base_path.display().to_string(),
                format!("Failed to open: {}", e),
            )
        })?;

        if self.policy.lock {
            file.try_lock_exclusive()
                .map_err(|_| LoggerError::file_lock(self.base_path.display().to_string()))?;
        }
        Ok(file)
    }

    /// Backups must not be renamed while the compressor still works on one,
    /// so rotation is put off until a later write instead of waiting here.
    fn compression_busy(&self) -> bool {
        self.compressor
            .as_ref()
            .is_some_and(|compressor| compressor.pending() > 0)
    }

    fn time_rotation_due(&self) -> bool {
        match self.policy.strategy.interval() {
            Some(interval) => {
                SystemTime::now()
                    .duration_since(self.last_rotation)
                    .unwrap_or(Duration::ZERO)
                    >= interval
            }
            None => false,
        }
    }

    /// Write the rendered buffer to the active file.
    fn write_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::file_appender(self.base_path.display().to_string(), "file is not open"))?;
        writer.write_all(self.buffer.as_bytes()).map_err(|e| {
            LoggerError::file_appender(
                self.base_path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        self.current_size += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Rotate, falling back to the current file when rotation fails.
    fn rotate_or_continue(&mut self) -> Result<()> {
        let Err(e) = self.rotate() else {
            return Ok(());
        };

        self.diagnostics.report(
            DiagnosticKind::Sink,
            format!("Log rotation failed: {}. Continuing with current file.", e),
        );

        if self.writer.is_none() {
            if let Err(reopen_err) = self.ensure_open() {
                self.diagnostics.report(
                    DiagnosticKind::Sink,
                    format!("Failed to reopen log file after rotation failure: {}", reopen_err),
                );
                return Err(e);
            }
        }

        // Let the file grow past its limit rather than retrying every write
        self.current_size = 0;
        self.last_rotation = SystemTime::now();
        Ok(())
    }

    /// Perform log rotation
    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
            // Dropping the writer closes the file and releases its lock
        }

        if self.policy.max_backup_files == 0 {
            let file = self.open_file(true)?;
            self.writer = Some(BufWriter::new(file));
            self.current_size = 0;
            self.last_rotation = SystemTime::now();
            return Ok(());
        }

        self.remove_oldest_backup()?;

        for i in (1..self.policy.max_backup_files).rev() {
            let old_path = self.backup_path(i);
            let new_path = self.backup_path(i + 1);
            shift(&with_suffix(&old_path, ".gz"), &with_suffix(&new_path, ".gz"))?;
            shift(&old_path, &new_path)?;
        }

        let backup_path = self.backup_path(1);
        if self.base_path.exists() {
            fs::rename(&self.base_path, &backup_path).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;

            if self.policy.compress {
                self.compress_later(backup_path);
            }
        }

        let file = self.open_file(false).map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        self.last_rotation = SystemTime::now();

        Ok(())
    }

    /// Delete the backup at index `max_backup_files` so disk use stays bounded.
    fn remove_oldest_backup(&mut self) -> Result<()> {
        let oldest_backup = self.backup_path(self.policy.max_backup_files);
        let oldest_compressed = with_suffix(&oldest_backup, ".gz");

        let mut deletion_failed = false;
        for path in [&oldest_compressed, &oldest_backup] {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    deletion_failed = true;
                    self.diagnostics.report(
                        DiagnosticKind::Sink,
                        format!(
                            "Failed to remove oldest backup {}: {} (failure #{}/{})",
                            path.display(),
                            e,
                            self.deletion_failure_count + 1,
                            MAX_DELETION_FAILURES
                        ),
                    );
                }
            }
        }

        if !deletion_failed {
            self.deletion_failure_count = 0;
            return Ok(());
        }

        self.deletion_failure_count += 1;
        if self.deletion_failure_count >= MAX_DELETION_FAILURES {
            return Err(LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!(
                    "Rotation aborted: failed to delete old backup files {} consecutive times",
                    self.deletion_failure_count
                ),
            ));
        }
        Ok(())
    }

    fn compress_later(&mut self, path: PathBuf) {
        if self.compressor.is_none() {
            match Compressor::start(Arc::clone(&self.diagnostics)) {
                Ok(compressor) => self.compressor = Some(compressor),
                Err(e) => {
                    self.diagnostics
                        .report(DiagnosticKind::Compression, e.to_string());
                    return;
                }
            }
        }

        if let Some(ref compressor) = self.compressor {
            if let Err(e) = compressor.submit(path) {
                self.diagnostics
                    .report(DiagnosticKind::Compression, e.to_string());
            }
        }
    }

    /// Path of the backup with the given index, e.g. `app.log.2`.
    #[must_use]
    pub fn backup_path(&self, index: usize) -> PathBuf {
        with_suffix(&self.base_path, &format!(".{}", index))
    }

    /// Bytes in the active file
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Get the timestamp of the last rotation
    #[must_use]
    pub fn last_rotation(&self) -> SystemTime {
        self.last_rotation
    }

    #[must_use]
    pub fn strategy(&self) -> &RotationStrategy {
        &self.policy.strategy
    }

    /// Wait for background compression of rotated files to finish.
    pub fn wait_for_compression(&self, timeout: Duration) -> bool {
        self.compressor
            .as_ref()
            .map_or(true, |compressor| compressor.wait_idle(timeout))
    }
}

/// Move `from` to `to` if it exists, replacing `to`.
fn shift(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Ok(());
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // On some platforms rename fails if the destination exists
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to).map_err(|e| {
        LoggerError::file_rotation(
            from.display().to_string(),
            format!("Failed to rotate backup files: {}", e),
        )
    })
}

impl Appender for RotatingFileAppender {
    fn name(&self) -> &str {
        "RotatingFileAppender"
    }

    fn append(&mut self, event: &LogEvent) -> Result<()> {
        self.append_batch(std::slice::from_ref(event))
    }

    fn append_batch(&mut self, events: &[LogEvent]) -> Result<()> {
        self.ensure_open()?;
        if self.time_rotation_due() && !self.compression_busy() {
            self.rotate_or_continue()?;
        }

        let max_bytes = self.policy.strategy.max_bytes();
        let mut written = 0;
        self.buffer.clear();
        for (i, event) in events.iter().enumerate() {
            self.formatter.format_into(event, &mut self.buffer);

            if let Some(max_bytes) = max_bytes {
                if self.current_size + self.buffer.len() as u64 >= max_bytes
                    && !self.compression_busy()
                {
                    self.write_buffer()
                        .map_err(|e| LoggerError::partial_batch(written, e))?;
                    written = i + 1;
                    self.rotate_or_continue()
                        .map_err(|e| LoggerError::partial_batch(written, e))?;
                }
            }
        }
        self.write_buffer()
            .map_err(|e| LoggerError::partial_batch(written, e))
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let result = self.flush();
        self.writer = None;
        // Dropping the compressor finishes queued jobs
        self.compressor = None;
        result
    }

    /// Reopen the file from scratch.
    fn recover(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
        self.ensure_open()
    }
}

impl Drop for RotatingFileAppender {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            // Best effort flush - ignore errors during drop
            let _ = writer.flush();
        }
    }
}
