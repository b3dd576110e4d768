//! Named logger handles
//!
//! A [`Logger`] is cheap to share and safe to call from any thread. Its only
//! state besides the name is a cached threshold: one `AtomicU64` packing the
//! configuration generation it was resolved against and the level index.
//! While the generation is current, [`Logger::is_enabled`] is a pair of
//! atomic loads and a compare.

use super::{
    log_event::{ErrorInfo, Location, LogEvent},
    log_level::LogLevel,
    log_manager::Backend,
};
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// No threshold resolved yet.
const UNRESOLVED: u64 = u64::MAX;

#[inline]
fn pack(generation: u32, level: LogLevel) -> u64 {
    (u64::from(generation) << 32) | u64::from(level.index())
}

pub struct Logger {
    name: Arc<str>,
    backend: Arc<Backend>,
    resolved: AtomicU64,
}

impl Logger {
    pub(crate) fn new(name: Arc<str>, backend: Arc<Backend>) -> Self {
        Self {
            name,
            backend,
            resolved: AtomicU64::new(UNRESOLVED),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective threshold: the logger's own override, else the root level.
    #[inline]
    pub fn level(&self) -> LogLevel {
        let generation = self.backend.config.generation();
        let packed = self.resolved.load(Ordering::Acquire);
        if packed != UNRESOLVED && (packed >> 32) as u32 == generation {
            return LogLevel::from_index(packed as u8);
        }
        self.resolve()
    }

    #[cold]
    fn resolve(&self) -> LogLevel {
        let snapshot = self.backend.config.snapshot();
        let level = snapshot.level_for(&self.name);
        self.resolved
            .store(pack(snapshot.generation, level), Ordering::Release);
        level
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.level()
    }

    #[inline]
    pub fn is_trace_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Trace)
    }

    #[inline]
    pub fn is_debug_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Debug)
    }

    #[inline]
    pub fn is_info_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Info)
    }

    #[inline]
    pub fn is_warn_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Warn)
    }

    #[inline]
    pub fn is_error_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Error)
    }

    #[inline]
    pub fn is_fatal_enabled(&self) -> bool {
        self.is_enabled(LogLevel::Fatal)
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if self.is_enabled(level) {
            self.emit(LogEvent::new(Arc::clone(&self.name), level, message.into()));
        }
    }

    /// Log `message` together with `error` and its source chain.
    pub fn log_error<E>(&self, level: LogLevel, message: impl Into<String>, error: &E)
    where
        E: StdError + ?Sized,
    {
        if self.is_enabled(level) {
            let event = LogEvent::new(Arc::clone(&self.name), level, message.into())
                .with_error(ErrorInfo::capture(error));
            self.emit(event);
        }
    }

    /// Build the message only when `level` is enabled.
    ///
    /// # Example
    ///
    /// ```
    /// use richlog::{LogLevel, LogManager};
    ///
    /// let manager = LogManager::builder().console(false).build().unwrap();
    /// let logger = manager.get_logger("app.cache");
    /// logger.log_with(LogLevel::Trace, || format!("{:?}", vec![1, 2, 3]));
    /// ```
    pub fn log_with<F>(&self, level: LogLevel, message: F)
    where
        F: FnOnce() -> String,
    {
        if self.is_enabled(level) {
            self.emit(LogEvent::new(Arc::clone(&self.name), level, message()));
        }
    }

    pub fn log_args(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if self.is_enabled(level) {
            self.emit(LogEvent::new(Arc::clone(&self.name), level, fmt::format(args)));
        }
    }

    /// Used by the logging macros, which check the level first.
    #[doc(hidden)]
    pub fn log_at(&self, level: LogLevel, location: Location, message: String) {
        if self.is_enabled(level) {
            let event =
                LogEvent::new(Arc::clone(&self.name), level, message).with_location(location);
            self.emit(event);
        }
    }

    #[doc(hidden)]
    pub fn log_error_at<E>(&self, level: LogLevel, location: Location, message: String, error: &E)
    where
        E: StdError + ?Sized,
    {
        if self.is_enabled(level) {
            let event = LogEvent::new(Arc::clone(&self.name), level, message)
                .with_location(location)
                .with_error(ErrorInfo::capture(error));
            self.emit(event);
        }
    }

    /// The outcome is already counted in the metrics; callers never see it.
    fn emit(&self, event: LogEvent) {
        let _ = self.backend.pipeline.submit(event);
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    pub fn warn_error<E: StdError + ?Sized>(&self, message: impl Into<String>, error: &E) {
        self.log_error(LogLevel::Warn, message, error);
    }

    pub fn error_error<E: StdError + ?Sized>(&self, message: impl Into<String>, error: &E) {
        self.log_error(LogLevel::Error, message, error);
    }

    pub fn fatal_error<E: StdError + ?Sized>(&self, message: impl Into<String>, error: &E) {
        self.log_error(LogLevel::Fatal, message, error);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::appender::Appender;
    use crate::core::error::Result;
    use crate::core::log_manager::LogManager;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<LogEvent>>>);

    impl Appender for Capture {
        fn append(&mut self, event: &LogEvent) -> Result<()> {
            self.0.lock().push(event.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "capture"
        }
    }

    fn manager(capture: &Capture) -> LogManager {
        LogManager::builder()
            .console(false)
            .appender(capture.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_pack_keeps_generation_and_level() {
        let packed = pack(7, LogLevel::Warn);
        assert_eq!((packed >> 32) as u32, 7);
        assert_eq!(LogLevel::from_index(packed as u8), LogLevel::Warn);
        assert_ne!(pack(u32::MAX, LogLevel::Off), UNRESOLVED);
    }

    #[test]
    fn test_threshold_follows_reconfiguration() {
        let capture = Capture::default();
        let manager = manager(&capture);
        let logger = manager.get_logger("app.db");

        assert_eq!(logger.level(), LogLevel::Info);
        assert!(!logger.is_debug_enabled());

        manager.set_logger_level("app.db", LogLevel::Debug);
        assert!(logger.is_debug_enabled());
        assert!(!logger.is_trace_enabled());

        manager.set_root_level(LogLevel::Error);
        assert_eq!(logger.level(), LogLevel::Debug);
        assert!(!manager.get_logger("app").is_warn_enabled());

        manager.clear_logger_level("app.db");
        assert_eq!(logger.level(), LogLevel::Error);
    }

    #[test]
    fn test_off_is_never_enabled() {
        let capture = Capture::default();
        let manager = manager(&capture);
        let logger = manager.get_logger("quiet");

        manager.set_logger_level("quiet", LogLevel::All);
        assert!(logger.is_trace_enabled());
        assert!(!logger.is_enabled(LogLevel::Off));

        manager.set_logger_level("quiet", LogLevel::Off);
        assert!(!logger.is_fatal_enabled());
    }

    #[test]
    fn test_disabled_closure_is_not_evaluated() {
        let capture = Capture::default();
        let manager = manager(&capture);
        let logger = manager.get_logger("lazy");

        let mut evaluated = false;
        logger.log_with(LogLevel::Debug, || {
            evaluated = true;
            String::from("expensive")
        });
        assert!(!evaluated);
    }

    #[test]
    fn test_emitted_events_reach_appender() {
        let capture = Capture::default();
        let manager = manager(&capture);
        let logger = manager.get_logger("svc");

        logger.info("started");
        logger.debug("hidden");
        logger.log_args(LogLevel::Warn, format_args!("load {}%", 93));
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        logger.error_error("write failed", &io);
        manager.flush(Duration::from_secs(5)).unwrap();

        let events = capture.0.lock();
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["started", "load 93%", "write failed"]);
        assert_eq!(&*events[0].logger_name, "svc");
        assert_eq!(events[2].error.as_ref().map(|e| e.message()), Some("disk full"));
    }
}
