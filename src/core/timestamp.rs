//! Timestamp formatting utilities
//!
//! Provides the date formats available to the `%date` pattern placeholder:
//! named formats (ISO 8601, RFC 3339, Unix timestamps), Java-style date
//! patterns such as `yyyy-MM-dd HH:mm:ss.SSS`, and raw strftime strings.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Standardized timestamp format options
///
/// # Examples
///
/// ```
/// use richlog::TimestampFormat;
/// use chrono::Utc;
///
/// let format = TimestampFormat::Iso8601;
/// let timestamp = format.format(&Utc::now());
/// assert!(timestamp.ends_with('Z'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// RFC 3339 format: `2025-01-08T10:30:45+00:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Unix timestamp in microseconds: `1736332245123456`
    UnixMicros,

    /// Custom strftime format, validated when built through [`TimestampFormat::parse`]
    Custom(String),
}

impl TimestampFormat {
    /// Interpret the argument of a `%date{...}` placeholder.
    ///
    /// Named formats are matched case-insensitively. An argument containing
    /// `%` is taken as a strftime string; anything else is read as a Java-style
    /// date pattern. Arguments chrono cannot render fall back to the default.
    ///
    /// ```
    /// use richlog::TimestampFormat;
    ///
    /// assert_eq!(TimestampFormat::parse("unix_millis"), TimestampFormat::UnixMillis);
    /// assert_eq!(
    ///     TimestampFormat::parse("yyyy-MM-dd HH:mm:ss"),
    ///     TimestampFormat::Custom("%Y-%m-%d %H:%M:%S".to_string())
    /// );
    /// ```
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input.to_ascii_uppercase().as_str() {
            "" | "ISO8601" => return TimestampFormat::Iso8601,
            "ISO8601_MICROS" => return TimestampFormat::Iso8601Micros,
            "RFC3339" => return TimestampFormat::Rfc3339,
            "UNIX" => return TimestampFormat::Unix,
            "UNIX_MILLIS" => return TimestampFormat::UnixMillis,
            "UNIX_MICROS" => return TimestampFormat::UnixMicros,
            _ => {}
        }

        let strftime = if input.contains('%') {
            input.to_string()
        } else {
            java_to_strftime(input)
        };

        if StrftimeItems::new(&strftime).any(|item| matches!(item, Item::Error)) {
            TimestampFormat::Iso8601
        } else {
            TimestampFormat::Custom(strftime)
        }
    }

    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        let mut out = String::with_capacity(32);
        self.format_into(datetime, &mut out);
        out
    }

    /// Append the formatted timestamp to `out`.
    pub fn format_into(&self, datetime: &DateTime<Utc>, out: &mut String) {
        // Writing into a String only fails for invalid strftime items, which
        // `parse` filters out.
        let _ = match self {
            TimestampFormat::Iso8601 => {
                write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
            }
            TimestampFormat::Iso8601Micros => {
                write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
            }
            TimestampFormat::Rfc3339 => write!(out, "{}", datetime.to_rfc3339()),
            TimestampFormat::Unix => write!(out, "{}", datetime.timestamp()),
            TimestampFormat::UnixMillis => write!(out, "{}", datetime.timestamp_millis()),
            TimestampFormat::UnixMicros => write!(out, "{}", datetime.timestamp_micros()),
            TimestampFormat::Custom(format_str) => write!(out, "{}", datetime.format(format_str)),
        };
    }
}

/// Translate a Java `SimpleDateFormat`-style pattern into strftime.
///
/// Letters chrono has no equivalent for are copied literally; text in single
/// quotes is literal and `''` is an escaped quote.
pub fn java_to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        let translated = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('h', 1) => Some("%-I"),
            ('h', _) => Some("%I"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            ('S', 1..=3) => Some("%3f"),
            ('S', 4..=6) => Some("%6f"),
            ('S', _) => Some("%9f"),
            ('E', 1..=3) => Some("%a"),
            ('E', _) => Some("%A"),
            ('a', _) => Some("%p"),
            ('D', _) => Some("%j"),
            ('z', _) => Some("%Z"),
            ('Z', _) => Some("%z"),
            ('X', _) => Some("%:z"),
            _ => None,
        };

        match translated {
            Some(item) => out.push_str(item),
            None => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
