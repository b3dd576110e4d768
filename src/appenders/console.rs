//! Console appender implementation

use crate::core::config::{ConsoleConfig, ConsoleTarget};
use crate::core::error::Result;
use crate::core::formatter::PatternFormatter;
use crate::core::log_event::LogEvent;
use crate::core::Appender;
#[cfg(feature = "console-colors")]
use colored::Colorize;
use std::io::Write;

/// Writes formatted events to stdout or stderr.
///
/// A batch is rendered into one buffer and written with a single call while
/// the stream is locked, so lines from one batch are never interleaved with
/// other output.
pub struct ConsoleAppender {
    target: ConsoleTarget,
    formatter: PatternFormatter,
    use_colors: bool,
    buffer: String,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            target: ConsoleTarget::Stdout,
            formatter: PatternFormatter::default(),
            use_colors: false,
            buffer: String::new(),
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self::new()
            .with_target(config.target)
            .with_pattern(&config.pattern)
            .with_colors(config.colors)
    }

    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    /// Set the layout pattern for this appender
    ///
    /// # Example
    ///
    /// ```
    /// use richlog::appenders::ConsoleAppender;
    ///
    /// let appender = ConsoleAppender::new()
    ///     .with_pattern("%date{HH:mm:ss} %-5level %logger - %message%n");
    /// ```
    #[must_use]
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.formatter = PatternFormatter::compile(pattern);
        self
    }

    /// Color each line by level. Ignored without the `console-colors` feature.
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    /// Append the rendered form of `events` to `out`.
    pub(crate) fn render(&self, events: &[LogEvent], out: &mut String) {
        for event in events {
            if self.use_colors {
                self.render_colored(event, out);
            } else {
                self.formatter.format_into(event, out);
            }
        }
    }

    #[cfg(feature = "console-colors")]
    fn render_colored(&self, event: &LogEvent, out: &mut String) {
        let line = self.formatter.format(event);
        let body = line.trim_end_matches(['\r', '\n']);
        out.push_str(&body.color(event.level.color_code()).to_string());
        out.push_str(&line[body.len()..]);
    }

    #[cfg(not(feature = "console-colors"))]
    fn render_colored(&self, event: &LogEvent, out: &mut String) {
        self.formatter.format_into(event, out);
    }

    fn write_out(&self, bytes: &[u8]) -> std::io::Result<()> {
        match self.target {
            ConsoleTarget::Stdout => std::io::stdout().lock().write_all(bytes),
            ConsoleTarget::Stderr => std::io::stderr().lock().write_all(bytes),
        }
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        self.append_batch(std::slice::from_ref(event))
    }

    fn append_batch(&mut self, events: &[LogEvent]) -> Result<()> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.clear();
        self.render(events, &mut buffer);
        let result = self.write_out(buffer.as_bytes());
        self.buffer = buffer;
        Ok(result?)
    }

    fn flush(&mut self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => std::io::stdout().flush()?,
            ConsoleTarget::Stderr => std::io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;
    use std::sync::Arc;

    fn event(level: LogLevel, message: &str) -> LogEvent {
        LogEvent::new(Arc::from("console.test"), level, message.to_string())
    }

    #[test]
    fn test_from_config() {
        let config = ConsoleConfig::default()
            .with_target(ConsoleTarget::Stderr)
            .with_pattern("%level %message%n");
        let appender = ConsoleAppender::from_config(&config);
        assert_eq!(appender.target(), ConsoleTarget::Stderr);
        assert_eq!(appender.name(), "console");
    }

    #[test]
    fn test_render_batch_in_order() {
        let appender = ConsoleAppender::new().with_pattern("%-5level %logger - %message%n");
        let mut out = String::new();
        appender.render(
            &[event(LogLevel::Info, "one"), event(LogLevel::Warn, "two")],
            &mut out,
        );
        assert_eq!(out, "INFO  console.test - one\nWARN  console.test - two\n");
    }

    #[cfg(feature = "console-colors")]
    #[test]
    fn test_colored_render_keeps_line_ending() {
        colored::control::set_override(true);
        let appender = ConsoleAppender::new()
            .with_pattern("%message%n")
            .with_colors(true);
        let mut out = String::new();
        appender.render(&[event(LogLevel::Error, "boom")], &mut out);
        assert!(out.contains("boom"));
        assert!(out.ends_with("\n"));
        assert!(out.contains('\u{1b}'));
    }

    #[test]
    fn test_append_writes_without_error() {
        let mut appender = ConsoleAppender::new().with_pattern("%message%n");
        appender.append(&event(LogLevel::Info, "console smoke test")).unwrap();
        appender.flush().unwrap();
    }
}
