//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. The level is
//! checked before the arguments are evaluated, and the call site is recorded
//! for the `%class`, `%method`, `%file` and `%line` placeholders.
//!
//! # Examples
//!
//! ```
//! use richlog::{info, error, LogManager};
//!
//! let manager = LogManager::builder().console(false).build().unwrap();
//! let logger = manager.get_logger("app.server");
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // With an error and its source chain
//! let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
//! error!(logger, cause = err; "Failed to bind port {}", port);
//! ```

/// Call site of the macro invocation as a [`Location`](crate::Location).
#[doc(hidden)]
#[macro_export]
macro_rules! location {
    () => {{
        fn __richlog_here() {}
        fn __richlog_type_name<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let path = __richlog_type_name(__richlog_here);
        $crate::Location::new(
            ::std::module_path!(),
            ::std::file!(),
            ::std::line!(),
            match path.strip_suffix("::__richlog_here") {
                Some(function) => function,
                None => path,
            },
        )
    }};
}

/// Log a message with automatic formatting.
///
/// Prefix the message with `cause = err;` to attach an error.
///
/// # Examples
///
/// ```
/// # use richlog::prelude::*;
/// # let manager = LogManager::builder().console(false).build().unwrap();
/// # let logger = manager.get_logger("doc");
/// use richlog::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, cause = $err:expr; $($arg:tt)+) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.log_error_at(level, $crate::location!(), ::std::format!($($arg)+), &$err);
        }
    }};
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.log_at(level, $crate::location!(), ::std::format!($($arg)+));
        }
    }};
}

/// Log a trace-level message.
///
/// # Examples
///
/// ```
/// # use richlog::prelude::*;
/// # let manager = LogManager::builder().console(false).root_level(LogLevel::Trace).build().unwrap();
/// # let logger = manager.get_logger("doc");
/// use richlog::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use richlog::prelude::*;
/// # let manager = LogManager::builder().console(false).build().unwrap();
/// # let logger = manager.get_logger("doc");
/// use richlog::info;
/// info!(logger, "Application started");
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use richlog::prelude::*;
/// # let manager = LogManager::builder().console(false).build().unwrap();
/// # let logger = manager.get_logger("doc");
/// use richlog::error;
/// error!(logger, "Failed to connect to database");
///
/// let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
/// error!(logger, cause = err; "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
