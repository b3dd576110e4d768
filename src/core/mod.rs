//! Core logger types and traits

pub mod appender;
pub mod config;
pub mod config_manager;
pub mod diagnostics;
pub mod error;
pub mod formatter;
pub mod log_event;
pub mod log_level;
pub mod log_manager;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod pipeline;
pub mod properties;
pub mod registry;
pub mod timestamp;
pub mod worker;

pub use appender::Appender;
pub use config::{
    Configuration, ConsoleConfig, ConsoleTarget, FileConfig, PipelineConfig,
    DEFAULT_SHUTDOWN_TIMEOUT, ROOT_LOGGER_NAME,
};
pub use config_manager::ConfigurationManager;
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics};
pub use error::{LoggerError, Result};
pub use formatter::{PatternFormatter, DEFAULT_PATTERN};
pub use log_event::{ErrorInfo, Location, LogEvent};
pub use log_level::LogLevel;
pub use log_manager::{LogManager, LogManagerBuilder};
pub use logger::Logger;
pub use metrics::LoggerMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use pipeline::EventPipeline;
pub use properties::{ConfigOutcome, ConfigReport, ConfigStatus};
pub use registry::LoggerRegistry;
pub use timestamp::TimestampFormat;
pub use worker::ShutdownReport;
