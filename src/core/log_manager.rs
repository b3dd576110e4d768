//! The logging service
//!
//! A [`LogManager`] owns everything a process needs to log: the logger
//! registry, the configuration, the event pipeline and the drain worker
//! thread. It is created explicitly and torn down by [`LogManager::shutdown`]
//! or by dropping it.
//!
//! # Example
//!
//! ```
//! use richlog::{LogLevel, LogManager, OverflowPolicy};
//!
//! let manager = LogManager::builder()
//!     .root_level(LogLevel::Debug)
//!     .logger_level("app.net", LogLevel::Warn)
//!     .console(false)
//!     .capacity(4096)
//!     .overflow_policy(OverflowPolicy::DropOldest)
//!     .build()
//!     .unwrap();
//!
//! let logger = manager.get_logger("app.db");
//! logger.debug("connection pool ready");
//!
//! let report = manager.shutdown();
//! assert!(report.is_clean());
//! ```

use super::{
    appender::Appender,
    config::{Configuration, ConsoleConfig, FileConfig, PipelineConfig},
    config_manager::{self, ConfigurationManager},
    diagnostics::{DiagnosticKind, DiagnosticSink, Diagnostics},
    error::{LoggerError, Result},
    log_level::LogLevel,
    logger::Logger,
    metrics::LoggerMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy},
    pipeline::{Control, EventPipeline},
    properties::{self, ConfigReport},
    registry::LoggerRegistry,
    worker::{DrainWorker, ShutdownReport},
};
use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Extra time given to the worker to report back after the grace period.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(1);

/// State shared by every logger handle.
pub(crate) struct Backend {
    pub(crate) config: Arc<ConfigurationManager>,
    pub(crate) pipeline: EventPipeline,
}

pub struct LogManager {
    backend: Arc<Backend>,
    registry: LoggerRegistry,
    diagnostics: Arc<Diagnostics>,
    metrics: Arc<LoggerMetrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Set by the first shutdown; later calls return it unchanged.
    last_report: Mutex<Option<ShutdownReport>>,
}

impl LogManager {
    /// Start with the default configuration: INFO to stdout.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> LogManagerBuilder {
        LogManagerBuilder::new()
    }

    /// Start from flat `richlog.*` properties.
    ///
    /// Malformed entries are skipped and reported to diagnostics; the report
    /// lists the outcome of every entry.
    ///
    /// # Example
    ///
    /// ```
    /// use richlog::{ConfigStatus, LogManager};
    ///
    /// let (manager, report) = LogManager::from_properties([
    ///     ("richlog.rootLevel", "WARN"),
    ///     ("richlog.console.enabled", "false"),
    ///     ("richlog.queue.capacity", "lots"),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!(report.status_of("richlog.rootLevel"), Some(&ConfigStatus::Applied));
    /// assert!(!report.is_clean());
    /// assert!(!manager.root_logger().is_info_enabled());
    /// ```
    pub fn from_properties<I, K, V>(props: I) -> Result<(Self, ConfigReport)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut configuration = Configuration::default();
        let report = properties::apply_properties(&mut configuration, props);
        let manager = Self::builder().configuration(configuration).build()?;
        config_manager::report_problems(&report, &manager.diagnostics);
        Ok((manager, report))
    }

    fn start(
        configuration: Configuration,
        appenders: Vec<Box<dyn Appender>>,
        diagnostics: Arc<Diagnostics>,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Self> {
        let metrics = Arc::new(LoggerMetrics::new());
        let pipeline_config = configuration.pipeline.clone();
        let config = Arc::new(ConfigurationManager::new(
            configuration,
            Arc::clone(&diagnostics),
        ));

        let (pipeline, channels) = EventPipeline::new(
            pipeline_config.capacity,
            pipeline_config.overflow_policy,
            Arc::clone(&metrics),
            Arc::clone(&diagnostics),
            on_overflow,
        );
        let worker = DrainWorker::new(
            channels,
            Arc::clone(&config),
            Arc::clone(&metrics),
            Arc::clone(&diagnostics),
            appenders,
        )
        .spawn()?;

        let backend = Arc::new(Backend { config, pipeline });
        Ok(Self {
            registry: LoggerRegistry::new(Arc::clone(&backend)),
            backend,
            diagnostics,
            metrics,
            worker: Mutex::new(Some(worker)),
            last_report: Mutex::new(None),
        })
    }

    /// The logger called `name`; `"ROOT"` is the root logger.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        self.registry.get_logger(name)
    }

    pub fn root_logger(&self) -> Arc<Logger> {
        self.registry.root_logger()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.registry.exists(name)
    }

    pub fn logger_count(&self) -> usize {
        self.registry.count()
    }

    /// Names of the cached loggers, sorted.
    pub fn loggers(&self) -> Vec<String> {
        self.registry.loggers()
    }

    /// Drop the logger cache. Levels, appenders and queued events are kept.
    pub fn reset_configuration(&self) {
        self.registry.reset();
    }

    pub fn configuration(&self) -> Arc<Configuration> {
        self.backend.config.snapshot()
    }

    pub fn set_root_level(&self, level: LogLevel) {
        self.backend.config.set_root_level(level);
    }

    pub fn set_logger_level(&self, name: &str, level: LogLevel) {
        self.backend.config.set_logger_level(name, level);
    }

    pub fn clear_logger_level(&self, name: &str) {
        self.backend.config.clear_logger_level(name);
    }

    pub fn set_console_config(&self, console: ConsoleConfig) {
        self.backend.config.set_console_config(console);
    }

    pub fn set_file_config(&self, file: FileConfig) {
        self.backend.config.set_file_config(file);
    }

    /// Batch size, batch timeout, shutdown timeout and retry interval apply
    /// immediately. Capacity and overflow policy are fixed at construction.
    pub fn set_pipeline_config(&self, pipeline: PipelineConfig) {
        self.backend.config.set_pipeline_config(pipeline);
    }

    /// Apply flat `richlog.*` properties to the running configuration.
    pub fn apply_properties<I, K, V>(&self, props: I) -> ConfigReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.backend.config.apply_properties(props)
    }

    /// Register an extra appender; it receives events queued after this call.
    pub fn add_appender<A: Appender + 'static>(&self, appender: A) -> Result<()> {
        self.backend
            .pipeline
            .send_control(Control::AddAppender(Box::new(appender)))
    }

    /// Wait until every event queued before this call has been delivered.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let (ack, done) = bounded(1);
        self.backend.pipeline.send_control(Control::Flush(ack))?;
        done.recv_timeout(timeout)
            .map_err(|_| LoggerError::timeout("flush"))
    }

    /// Retry failed appenders now instead of waiting for the retry interval.
    /// Returns how many recovered.
    pub fn retry_failed_appenders(&self) -> Result<usize> {
        let (ack, done) = bounded(1);
        self.backend
            .pipeline
            .send_control(Control::RetryFailed(ack))?;
        done.recv_timeout(self.configuration().pipeline.shutdown_timeout)
            .map_err(|_| LoggerError::timeout("retry failed appenders"))
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Events waiting for the drain worker.
    pub fn pending_events(&self) -> usize {
        self.backend.pipeline.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.backend.pipeline.is_stopped()
    }

    /// Shut down with the configured grace period.
    pub fn shutdown(&self) -> ShutdownReport {
        let grace = self.configuration().pipeline.shutdown_timeout;
        self.shutdown_with_timeout(grace)
    }

    /// Stop accepting events, drain the queue for at most `grace`, then
    /// flush and close every appender.
    ///
    /// Never fails. Only the first call does any work; later calls return
    /// the first report.
    pub fn shutdown_with_timeout(&self, grace: Duration) -> ShutdownReport {
        let mut last_report = self.last_report.lock();
        if let Some(report) = last_report.as_ref() {
            return report.clone();
        }

        self.backend.pipeline.stop();
        let mut report = match self.worker.lock().take() {
            Some(handle) => self.stop_worker(handle, grace),
            None => ShutdownReport::default(),
        };

        let abandoned = self.backend.pipeline.drain_abandoned(SHUTDOWN_SLACK);
        if abandoned > 0 {
            self.metrics.record_dropped_at_shutdown(abandoned);
            report.dropped += abandoned;
        }
        self.registry.reset();

        let dropped = self.metrics.total_dropped();
        if dropped > 0 {
            self.diagnostics.report(
                DiagnosticKind::Shutdown,
                format!(
                    "shut down with {} dropped events (drop rate: {:.2}%)",
                    dropped,
                    self.metrics.drop_rate()
                ),
            );
        }

        *last_report = Some(report.clone());
        report
    }

    fn stop_worker(&self, handle: JoinHandle<()>, grace: Duration) -> ShutdownReport {
        let (done, reply) = bounded(1);
        let request = Control::Shutdown {
            deadline: Instant::now() + grace,
            done,
        };
        if self.backend.pipeline.send_control(request).is_err() {
            // The worker already exited and closed its appenders
            let _ = handle.join();
            return ShutdownReport::default();
        }

        match reply.recv_timeout(grace + SHUTDOWN_SLACK) {
            Ok(report) => {
                let _ = handle.join();
                report
            }
            Err(RecvTimeoutError::Disconnected) => {
                let message = match handle.join() {
                    Err(_) => "drain worker panicked during shutdown",
                    Ok(()) => "drain worker exited without a shutdown report",
                };
                self.diagnostics.report(DiagnosticKind::Shutdown, message);
                ShutdownReport {
                    timed_out: true,
                    ..ShutdownReport::default()
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // Joining would wait on a stuck appender; leave the thread
                self.diagnostics.report(
                    DiagnosticKind::Shutdown,
                    format!("drain worker did not finish within {:?}", grace),
                );
                ShutdownReport {
                    timed_out: true,
                    ..ShutdownReport::default()
                }
            }
        }
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("config", &self.backend.config)
            .field("registry", &self.registry)
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Builder for constructing a [`LogManager`] with a fluent API
///
/// # Example
/// ```
/// use richlog::{FileConfig, LogLevel, LogManager, OverflowPolicy};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let dir = tempfile::tempdir().unwrap();
/// let manager = LogManager::builder()
///     .root_level(LogLevel::Debug)
///     .console(false)
///     .file(FileConfig::new(dir.path().join("app.log")).with_max_size(1024 * 1024))
///     .overflow_policy(OverflowPolicy::BlockWithTimeout(Duration::from_millis(50)))
///     .on_overflow(Arc::new(|count| {
///         eprintln!("ALERT: {} logs dropped", count);
///     }))
///     .build()
///     .unwrap();
/// ```
pub struct LogManagerBuilder {
    configuration: Configuration,
    appenders: Vec<Box<dyn Appender>>,
    on_overflow: Option<OverflowCallback>,
    diagnostics_sink: Option<DiagnosticSink>,
}

impl LogManagerBuilder {
    pub fn new() -> Self {
        Self {
            configuration: Configuration::default(),
            appenders: Vec::new(),
            on_overflow: None,
            diagnostics_sink: None,
        }
    }

    /// Replace the whole starting configuration
    #[must_use = "builder methods return a new value"]
    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn root_level(mut self, level: LogLevel) -> Self {
        self.configuration.root_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn logger_level(mut self, name: impl Into<String>, level: LogLevel) -> Self {
        self.configuration.logger_levels.insert(name.into(), level);
        self
    }

    /// Enable or disable the console appender
    #[must_use = "builder methods return a new value"]
    pub fn console(mut self, enabled: bool) -> Self {
        self.configuration.console.enabled = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn console_config(mut self, console: ConsoleConfig) -> Self {
        self.configuration.console = console;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn file(mut self, file: FileConfig) -> Self {
        self.configuration.file = file;
        self
    }

    /// Log to `path` with the default rotation settings
    #[must_use = "builder methods return a new value"]
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.configuration.file = FileConfig::new(path);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.configuration.pipeline = pipeline;
        self
    }

    /// Set queue capacity
    #[must_use = "builder methods return a new value"]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.configuration.pipeline.capacity = capacity;
        self
    }

    /// Set overflow policy for when the queue is full
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.configuration.pipeline.overflow_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.configuration.pipeline.batch_size = batch_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.configuration.pipeline.batch_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.configuration.pipeline.shutdown_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.configuration.pipeline.retry_interval = interval;
        self
    }

    /// Add an appender next to the configured console and file appenders
    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    /// Set callback invoked on the first overflow drop and every 1000th
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Receive diagnostics here instead of stderr
    #[must_use = "builder methods return a new value"]
    pub fn diagnostics_sink(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics_sink = Some(sink);
        self
    }

    /// Start the drain worker and return the running manager
    pub fn build(self) -> Result<LogManager> {
        let diagnostics = Arc::new(match self.diagnostics_sink {
            Some(sink) => Diagnostics::with_sink(sink),
            None => Diagnostics::new(),
        });
        LogManager::start(
            self.configuration,
            self.appenders,
            diagnostics,
            self.on_overflow,
        )
    }
}

impl Default for LogManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::Diagnostic;
    use crate::core::log_event::LogEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Counting {
        events: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl Appender for Counting {
        fn append(&mut self, _event: &LogEvent) -> Result<()> {
            self.events.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    /// Fails until `healthy` is set.
    #[derive(Clone, Default)]
    struct Flaky {
        healthy: Arc<AtomicUsize>,
    }

    impl Appender for Flaky {
        fn append(&mut self, _event: &LogEvent) -> Result<()> {
            if self.healthy.load(Ordering::SeqCst) == 0 {
                return Err(LoggerError::other("sink unavailable"));
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn recover(&mut self) -> Result<()> {
            if self.healthy.load(Ordering::SeqCst) == 0 {
                return Err(LoggerError::other("still down"));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn collecting_sink() -> (DiagnosticSink, Arc<Mutex<Vec<Diagnostic>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: DiagnosticSink = Arc::new(move |d: &Diagnostic| seen_clone.lock().push(d.clone()));
        (sink, seen)
    }

    #[test]
    fn test_flush_delivers_queued_events() {
        let counting = Counting::default();
        let manager = LogManager::builder()
            .console(false)
            .appender(counting.clone())
            .build()
            .unwrap();

        let logger = manager.get_logger("flush");
        for i in 0..100 {
            logger.info(format!("event {}", i));
        }
        manager.flush(Duration::from_secs(5)).unwrap();

        assert_eq!(counting.events.load(Ordering::SeqCst), 100);
        assert_eq!(manager.metrics().delivered(), 100);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let counting = Counting::default();
        let manager = LogManager::builder()
            .console(false)
            .appender(counting.clone())
            .build()
            .unwrap();
        let logger = manager.get_logger("app");
        logger.info("before shutdown");

        let first = manager.shutdown_with_timeout(Duration::from_secs(5));
        let second = manager.shutdown();

        assert!(first.is_clean());
        assert_eq!(first, second);
        assert!(manager.is_shut_down());
        assert_eq!(counting.events.load(Ordering::SeqCst), 1);
        assert_eq!(counting.closed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.logger_count(), 0);

        logger.info("after shutdown");
        assert_eq!(manager.metrics().rejected(), 1);
        assert!(manager.flush(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_drop_shuts_down() {
        let counting = Counting::default();
        {
            let manager = LogManager::builder()
                .console(false)
                .appender(counting.clone())
                .build()
                .unwrap();
            manager.get_logger("scoped").warn("last words");
        }
        assert_eq!(counting.events.load(Ordering::SeqCst), 1);
        assert_eq!(counting.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_added_appender_sees_later_events() {
        let manager = LogManager::builder().console(false).build().unwrap();
        let counting = Counting::default();
        manager.add_appender(counting.clone()).unwrap();

        manager.root_logger().error("after add");
        manager.flush(Duration::from_secs(5)).unwrap();
        assert_eq!(counting.events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_appender_reported_once_and_retried() {
        let (sink, seen) = collecting_sink();
        let flaky = Flaky::default();
        let manager = LogManager::builder()
            .console(false)
            .appender(flaky.clone())
            .diagnostics_sink(sink)
            .retry_interval(Duration::from_secs(3600))
            .batch_size(1)
            .build()
            .unwrap();

        let logger = manager.get_logger("retry");
        for _ in 0..5 {
            logger.info("lost");
            manager.flush(Duration::from_secs(5)).unwrap();
        }

        let failures = seen
            .lock()
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Sink)
            .count();
        assert_eq!(failures, 1);
        assert_eq!(manager.metrics().sink_dropped(), 5);

        assert_eq!(manager.retry_failed_appenders().unwrap(), 0);
        flaky.healthy.store(1, Ordering::SeqCst);
        assert_eq!(manager.retry_failed_appenders().unwrap(), 1);

        logger.info("delivered");
        manager.flush(Duration::from_secs(5)).unwrap();
        assert_eq!(manager.metrics().sink_dropped(), 5);
    }

    #[test]
    fn test_from_properties_reports_problems() {
        let (manager, report) = LogManager::from_properties([
            ("richlog.rootLevel", "ERROR"),
            ("richlog.console.enabled", "false"),
            ("richlog.queue.capacity", "0"),
            ("other.key", "x"),
        ])
        .unwrap();

        assert_eq!(report.applied_count(), 2);
        assert_eq!(manager.configuration().root_level, LogLevel::Error);
        assert!(!manager.configuration().console.enabled);
        assert!(manager.diagnostics().reported_count() >= 1);
    }

    #[test]
    fn test_capacity_and_policy_from_builder() {
        let manager = LogManager::builder()
            .console(false)
            .capacity(16)
            .overflow_policy(OverflowPolicy::DropNewest)
            .build()
            .unwrap();
        assert_eq!(manager.backend.pipeline.capacity(), 16);
        assert_eq!(manager.backend.pipeline.policy(), OverflowPolicy::DropNewest);
    }
}
