//! Log event structure

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<Arc<str>>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<Arc<str>>>> = const { RefCell::new(None) };
}

/// Get cached thread ID, computing and caching it on first access
fn get_thread_id() -> Arc<str> {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| Arc::from(format!("{:?}", std::thread::current().id())))
            .clone()
    })
}

/// Get cached thread name, computing and caching it on first access
fn get_thread_name() -> Option<Arc<str>> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(Arc::from))
            .clone()
    })
}

/// Call site of a log statement, captured by the logging macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    module_path: &'static str,
    file: &'static str,
    line: u32,
    function_path: &'static str,
}

impl Location {
    pub const fn new(
        module_path: &'static str,
        file: &'static str,
        line: u32,
        function_path: &'static str,
    ) -> Self {
        Self {
            module_path,
            file,
            line,
            function_path,
        }
    }

    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Name of the enclosing function, skipping closure frames.
    pub fn function(&self) -> &'static str {
        self.function_path
            .rsplit("::")
            .find(|segment| !segment.is_empty() && *segment != "{{closure}}")
            .unwrap_or("?")
    }
}

/// An error rendered at the moment it was logged.
///
/// Errors are not `Send` in general and may change after the call returns, so
/// the message, the `source()` chain and an optional backtrace are turned into
/// text on the calling thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    message: String,
    causes: Vec<String>,
    backtrace: Option<String>,
}

impl ErrorInfo {
    /// Render `error` and its source chain.
    ///
    /// A backtrace of the logging call is included when backtraces are enabled
    /// through `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`.
    pub fn capture<E: StdError + ?Sized>(error: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        let backtrace = Backtrace::capture();
        let backtrace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            message: error.to_string(),
            causes,
            backtrace,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for cause in &self.causes {
            write!(f, "\nCaused by: {}", cause)?;
        }
        if let Some(ref backtrace) = self.backtrace {
            write!(f, "\n{}", backtrace.trim_end())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LogEvent {
    pub logger_name: Arc<str>,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub thread_id: Arc<str>,
    pub thread_name: Option<Arc<str>>,
    pub error: Option<ErrorInfo>,
    pub location: Option<Location>,
}

impl LogEvent {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: String) -> String {
        if !message.contains(['\n', '\r', '\t']) {
            return message;
        }
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(logger_name: Arc<str>, level: LogLevel, message: String) -> Self {
        Self {
            logger_name,
            level,
            message: Self::sanitize_message(message),
            timestamp: Utc::now(),
            thread_id: get_thread_id(),
            thread_name: get_thread_name(),
            error: None,
            location: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Nanoseconds since the Unix epoch.
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| self.timestamp.timestamp_micros().saturating_mul(1_000))
    }

    /// Thread name when the thread has one, otherwise its id.
    pub fn thread(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "disk unplugged")
        }
    }

    impl StdError for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "write failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_message_is_sanitized() {
        let event = LogEvent::new(Arc::from("app"), LogLevel::Info, "a\nb\tc\r".to_string());
        assert_eq!(event.message, "a\\nb\\tc\\r");
    }

    #[test]
    fn test_error_chain_is_rendered() {
        let info = ErrorInfo::capture(&Outer(Inner));
        assert_eq!(info.message(), "write failed");
        assert_eq!(info.causes(), ["disk unplugged".to_string()]);
        assert!(info.to_string().starts_with("write failed\nCaused by: disk unplugged"));
    }

    #[test]
    fn test_location_function_skips_closures() {
        let location = Location::new("app::db", "src/db.rs", 10, "app::db::connect::{{closure}}");
        assert_eq!(location.function(), "connect");
        assert_eq!(location.line(), 10);
    }

    #[test]
    fn test_thread_falls_back_to_id() {
        let event = std::thread::spawn(|| {
            LogEvent::new(Arc::from("app"), LogLevel::Info, "x".to_string())
        })
        .join()
        .unwrap();
        assert!(event.thread_name.is_none());
        assert!(event.thread().starts_with("ThreadId("));
    }

    #[test]
    fn test_timestamp_nanos_is_positive() {
        let event = LogEvent::new(Arc::from("app"), LogLevel::Info, String::new());
        assert!(event.timestamp_nanos() > 0);
    }
}
