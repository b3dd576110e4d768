//! # richlog
//!
//! A high-throughput logging engine: named loggers with a lock-free level
//! check, a bounded queue drained in batches by a background thread, pattern
//! layouts, and console and rotating file output with gzip-compressed
//! backups.
//!
//! ## Features
//!
//! - **Cheap when disabled**: a disabled log call is two atomic loads
//! - **Asynchronous delivery**: producers never touch a sink; one worker
//!   thread batches events to every appender
//! - **Overflow policies**: block, block with timeout, drop newest or drop
//!   oldest when the queue is full
//! - **Live reconfiguration**: levels and appender settings swap atomically
//! - **Rotation**: by size, by interval or both, with retention and
//!   background compression
//!
//! ## Example
//!
//! ```
//! use richlog::{info, LogLevel, LogManager};
//!
//! let manager = LogManager::builder()
//!     .root_level(LogLevel::Info)
//!     .console(false)
//!     .build()
//!     .unwrap();
//!
//! let logger = manager.get_logger("app.server");
//! info!(logger, "listening on port {}", 8080);
//!
//! manager.shutdown();
//! ```

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, RotatingFileAppender, RotationPolicy, RotationStrategy};
    pub use crate::core::{
        Appender, ConfigReport, ConfigStatus, Configuration, ConsoleConfig, ConsoleTarget,
        FileConfig, LogEvent, LogLevel, LogManager, LogManagerBuilder, Logger, LoggerError,
        LoggerMetrics, OverflowCallback, OverflowPolicy, PatternFormatter, PipelineConfig, Result,
        ShutdownReport, DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

pub use appenders::{ConsoleAppender, RotatingFileAppender, RotationPolicy, RotationStrategy};
pub use crate::core::{
    Appender, ConfigOutcome, ConfigReport, ConfigStatus, Configuration, ConfigurationManager,
    ConsoleConfig, ConsoleTarget, Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics,
    ErrorInfo, EventPipeline, FileConfig, Location, LogEvent, LogLevel, LogManager,
    LogManagerBuilder, Logger, LoggerError, LoggerMetrics, LoggerRegistry, OverflowCallback,
    OverflowPolicy, PatternFormatter, PipelineConfig, Result, ShutdownReport, TimestampFormat,
    DEFAULT_PATTERN, DEFAULT_SHUTDOWN_TIMEOUT, ROOT_LOGGER_NAME,
};
