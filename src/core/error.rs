//! Error types for the logging engine

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Level name that is not one of the known levels
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// Malformed configuration entry
    #[error("Invalid configuration for '{key}': {message}")]
    InvalidConfiguration { key: String, message: String },

    /// File appender error with path
    #[error("File appender error for '{path}': {message}")]
    FileAppenderError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// File lock error
    #[error("Failed to acquire file lock on '{path}'")]
    FileLockError { path: String },

    /// Compression of a rotated file failed
    #[error("Compression failed for '{path}': {message}")]
    CompressionError { path: String, message: String },

    /// Event dropped by the overflow policy
    #[error("Log queue overflow: dropped {dropped_count} events")]
    QueueOverflow { dropped_count: u64 },

    /// Pipeline no longer accepts events
    #[error("Log pipeline is shut down; event rejected")]
    Rejected,

    /// Batch delivery stopped after the first `written` events were written
    #[error("Batch interrupted after {written} events: {source}")]
    PartialBatch {
        written: usize,
        #[source]
        source: Box<LoggerError>,
    },

    /// Appender panicked while handling a batch
    #[error("Appender '{name}' panicked: {message}")]
    AppenderPanicked { name: String, message: String },

    /// Operation did not complete in time
    #[error("Timed out while {0}")]
    Timeout(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    pub fn invalid_level(name: impl Into<String>) -> Self {
        LoggerError::InvalidLevel(name.into())
    }

    /// Create an invalid configuration error
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a file appender error
    pub fn file_appender(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileAppenderError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file lock error
    pub fn file_lock(path: impl Into<String>) -> Self {
        LoggerError::FileLockError { path: path.into() }
    }

    pub fn compression(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::CompressionError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a queue overflow error
    pub fn queue_overflow(dropped_count: u64) -> Self {
        LoggerError::QueueOverflow { dropped_count }
    }

    /// Record that `written` events of a batch were written before `source`.
    /// With nothing written the source error is returned unchanged.
    pub fn partial_batch(written: usize, source: LoggerError) -> Self {
        if written == 0 {
            return source;
        }
        LoggerError::PartialBatch {
            written,
            source: Box::new(source),
        }
    }

    /// Events of the failed batch that were written anyway.
    pub fn events_written(&self) -> usize {
        match self {
            LoggerError::PartialBatch { written, .. } => *written,
            _ => 0,
        }
    }

    pub fn appender_panicked(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::AppenderPanicked {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        LoggerError::Timeout(operation.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}
