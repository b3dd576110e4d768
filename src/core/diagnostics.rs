//! Side channel for problems inside the engine itself
//!
//! The engine cannot log through its own pipeline, so configuration, sink,
//! overflow, compression and shutdown problems are reported here. By default
//! they are written to stderr; embedders and tests can install their own sink.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Configuration,
    Sink,
    Overflow,
    Compression,
    Shutdown,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Configuration => "CONFIG",
            DiagnosticKind::Sink => "SINK",
            DiagnosticKind::Overflow => "OVERFLOW",
            DiagnosticKind::Compression => "COMPRESSION",
            DiagnosticKind::Shutdown => "SHUTDOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[richlog {}] {}", self.kind.as_str(), self.message)
    }
}

/// Receiver for diagnostics. Called on whichever thread hit the problem.
pub type DiagnosticSink = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

pub struct Diagnostics {
    sink: RwLock<Option<DiagnosticSink>>,
    reported: AtomicU64,
}

impl Diagnostics {
    /// Diagnostics written to stderr.
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(None),
            reported: AtomicU64::new(0),
        }
    }

    pub fn with_sink(sink: DiagnosticSink) -> Self {
        Self {
            sink: RwLock::new(Some(sink)),
            reported: AtomicU64::new(0),
        }
    }

    /// Replace the sink; `None` restores stderr output.
    pub fn set_sink(&self, sink: Option<DiagnosticSink>) {
        *self.sink.write() = sink;
    }

    pub fn report(&self, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            message: message.into(),
        };
        self.reported.fetch_add(1, Ordering::Relaxed);

        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink(&diagnostic),
            None => eprintln!("{}", diagnostic),
        }
    }

    /// Number of diagnostics reported so far.
    pub fn reported_count(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("custom_sink", &self.sink.read().is_some())
            .field("reported", &self.reported_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_custom_sink_receives_reports() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let diagnostics = Diagnostics::with_sink(Arc::new(move |d: &Diagnostic| {
            seen_clone.lock().push(d.clone());
        }));

        diagnostics.report(DiagnosticKind::Sink, "disk full");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::Sink);
        assert_eq!(seen[0].to_string(), "[richlog SINK] disk full");
        assert_eq!(diagnostics.reported_count(), 1);
    }

    #[test]
    fn test_set_sink_replaces_previous() {
        let diagnostics = Diagnostics::new();
        let count = Arc::new(AtomicU64::new(0));
        let count_clone = Arc::clone(&count);
        diagnostics.set_sink(Some(Arc::new(move |_: &Diagnostic| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        })));

        diagnostics.report(DiagnosticKind::Overflow, "a");
        diagnostics.report(DiagnosticKind::Shutdown, "b");
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }
}
