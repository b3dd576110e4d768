//! Appender trait for log output destinations

use super::{error::Result, log_event::LogEvent};

/// A sink for log events.
///
/// Appenders are owned by the drain worker and only ever called from its
/// thread, so they need `Send` but not `Sync`. Errors are reported to the
/// diagnostics channel; they never reach the code that logged the event.
pub trait Appender: Send {
    fn append(&mut self, event: &LogEvent) -> Result<()>;

    /// Write a batch of events in order.
    ///
    /// The default calls [`append`](Appender::append) per event and stops at
    /// the first error. Appenders that can render a batch into one write
    /// should override it.
    fn append_batch(&mut self, events: &[LogEvent]) -> Result<()> {
        for event in events {
            self.append(event)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()>;

    /// Release the underlying resource. Called once, at reconfiguration or
    /// shutdown.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    /// Try to bring a failed appender back, e.g. by reopening its file.
    fn recover(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
