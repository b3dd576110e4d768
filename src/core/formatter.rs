//! Pattern-based rendering of log events
//!
//! A conversion pattern such as
//! `%date{HH:mm:ss.SSS} [%thread] %-5level %logger - %message%n`
//! is compiled once into a list of segments. Rendering an event walks the
//! segments and appends to a caller-provided buffer, so appenders can render
//! a whole batch into one allocation.
//!
//! | placeholder | output |
//! |---|---|
//! | `%date`, `%date{fmt}` | event timestamp, see [`TimestampFormat::parse`] |
//! | `%level` | level name |
//! | `%thread` | thread name, or thread id for unnamed threads |
//! | `%logger` | logger name |
//! | `%class` | module path of the call site, or the logger name |
//! | `%method` | enclosing function of the call site |
//! | `%line` / `%file` | call-site line and file |
//! | `%message` | the message |
//! | `%throwable` | rendered error and its causes |
//! | `%n` | newline |
//! | `%%` | literal `%` |
//!
//! A width may follow the `%`: `%-5level` pads on the right, `%8thread` on the
//! left. Widths are clamped to [`MAX_FIELD_WIDTH`]. Unknown placeholders are
//! copied to the output unchanged.

use super::log_event::LogEvent;
use super::timestamp::TimestampFormat;
use std::fmt::Write;

/// Pattern used when none is configured.
pub const DEFAULT_PATTERN: &str =
    "[%level] %date{yyyy-MM-dd HH:mm:ss} [%thread] %class.%method:%line - %message%n";

const UNKNOWN: &str = "?";

/// Widths above this are clamped.
pub const MAX_FIELD_WIDTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Date(TimestampFormat),
    Level,
    Thread,
    Logger,
    Class,
    Method,
    Line,
    File,
    Message,
    Throwable,
    Newline,
}

impl Field {
    fn from_name(name: &str, argument: Option<&str>) -> Option<Field> {
        let field = match name {
            "date" => Field::Date(argument.map(TimestampFormat::parse).unwrap_or_default()),
            "level" => Field::Level,
            "thread" => Field::Thread,
            "logger" => Field::Logger,
            "class" => Field::Class,
            "method" => Field::Method,
            "line" => Field::Line,
            "file" => Field::File,
            "message" => Field::Message,
            "throwable" => Field::Throwable,
            "n" => Field::Newline,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Width {
    min: usize,
    left_align: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field { field: Field, width: Option<Width> },
}

/// A compiled conversion pattern.
///
/// # Examples
///
/// ```
/// use richlog::{LogEvent, LogLevel, PatternFormatter};
/// use std::sync::Arc;
///
/// let formatter = PatternFormatter::compile("%-5level %logger: %message");
/// let event = LogEvent::new(Arc::from("db"), LogLevel::Warn, "slow query".to_string());
/// assert_eq!(formatter.format(&event), "WARN  db: slow query");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PatternFormatter {
    pattern: String,
    segments: Vec<Segment>,
    renders_throwable: bool,
}

impl PatternFormatter {
    pub fn compile(pattern: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;

        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(stripped) = after.strip_prefix('%') {
                literal.push('%');
                rest = stripped;
                continue;
            }

            match parse_placeholder(after) {
                Some((field, width, consumed)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field { field, width });
                    rest = &after[consumed..];
                }
                None => {
                    literal.push('%');
                    rest = after;
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let renders_throwable = segments.iter().any(|segment| {
            matches!(
                segment,
                Segment::Field {
                    field: Field::Throwable,
                    ..
                }
            )
        });

        Self {
            pattern: pattern.to_string(),
            segments,
            renders_throwable,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn format(&self, event: &LogEvent) -> String {
        let mut out = String::with_capacity(self.pattern.len() + event.message.len() + 64);
        self.format_into(event, &mut out);
        out
    }

    /// Append the rendering of `event` to `out`.
    ///
    /// Errors attached to the event are written after the pattern output when
    /// the pattern has no `%throwable` placeholder.
    pub fn format_into(&self, event: &LogEvent, out: &mut String) {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { field, width } => {
                    let start = out.len();
                    render_field(field, event, out);
                    if let Some(width) = width {
                        pad(out, start, *width);
                    }
                }
            }
        }

        if let (Some(error), false) = (&event.error, self.renders_throwable) {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", error);
        }
    }
}

impl Default for PatternFormatter {
    fn default() -> Self {
        Self::compile(DEFAULT_PATTERN)
    }
}

/// Parse the text following a `%`; returns the field, its width and the
/// number of bytes consumed.
fn parse_placeholder(s: &str) -> Option<(Field, Option<Width>, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0;

    let left_align = bytes.first() == Some(&b'-');
    if left_align {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let width = if i > digits_start {
        let min = s[digits_start..i]
            .parse::<usize>()
            .map_or(MAX_FIELD_WIDTH, |min| min.min(MAX_FIELD_WIDTH));
        Some(Width { min, left_align })
    } else if left_align {
        return None;
    } else {
        None
    };

    let name_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let name = &s[name_start..i];
    if name.is_empty() {
        return None;
    }

    let mut argument = None;
    if bytes.get(i) == Some(&b'{') {
        if let Some(close) = s[i..].find('}') {
            argument = Some(&s[i + 1..i + close]);
            i += close + 1;
        }
    }

    Field::from_name(name, argument).map(|field| (field, width, i))
}

fn render_field(field: &Field, event: &LogEvent, out: &mut String) {
    match field {
        Field::Date(format) => format.format_into(&event.timestamp, out),
        Field::Level => out.push_str(event.level.as_str()),
        Field::Thread => out.push_str(event.thread()),
        Field::Logger => out.push_str(&event.logger_name),
        Field::Class => match event.location {
            Some(location) => out.push_str(location.module_path()),
            None => out.push_str(&event.logger_name),
        },
        Field::Method => match event.location {
            Some(location) => out.push_str(location.function()),
            None => out.push_str(UNKNOWN),
        },
        Field::Line => match event.location {
            Some(location) => {
                let _ = write!(out, "{}", location.line());
            }
            None => out.push_str(UNKNOWN),
        },
        Field::File => match event.location {
            Some(location) => out.push_str(location.file()),
            None => out.push_str(UNKNOWN),
        },
        Field::Message => out.push_str(&event.message),
        Field::Throwable => {
            if let Some(ref error) = event.error {
                let _ = write!(out, "{}", error);
            }
        }
        Field::Newline => out.push('\n'),
    }
}

fn pad(out: &mut String, start: usize, width: Width) {
    let written = out[start..].chars().count();
    if written >= width.min {
        return;
    }
    let padding = " ".repeat(width.min - written);
    if width.left_align {
        out.push_str(&padding);
    } else {
        out.insert_str(start, &padding);
    }
}
