//! Log level definitions

use super::error::LoggerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log event, also used as a logger threshold.
///
/// Ordering follows the declaration order, so `All` sorts below `Trace` and
/// `Off` above `Fatal`. A logger whose threshold is `Off` emits nothing; a
/// threshold of `All` emits everything.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    All = 0,
    Trace = 1,
    Debug = 2,
    #[default]
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
    Off = 7,
}

impl LogLevel {
    /// Every level, lowest first.
    pub const VALUES: [LogLevel; 8] = [
        LogLevel::All,
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
        LogLevel::Off,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::All => "ALL",
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::Off => "OFF",
        }
    }

    /// Integer rank used by [`LogLevel::from_int`].
    pub const fn rank(&self) -> i32 {
        match self {
            LogLevel::All => i32::MIN,
            LogLevel::Trace => 5_000,
            LogLevel::Debug => 10_000,
            LogLevel::Info => 20_000,
            LogLevel::Warn => 30_000,
            LogLevel::Error => 40_000,
            LogLevel::Fatal => 50_000,
            LogLevel::Off => i32::MAX,
        }
    }

    #[inline]
    pub fn is_greater_or_equal(&self, other: LogLevel) -> bool {
        *self >= other
    }

    /// Lenient name lookup.
    ///
    /// Surrounding whitespace and case are ignored. Names that are not
    /// recognized map to [`LogLevel::Debug`] instead of failing; use
    /// [`str::parse`] when an unknown name must be rejected.
    ///
    /// ```
    /// use richlog::LogLevel;
    ///
    /// assert_eq!(LogLevel::from_name("  Info "), LogLevel::Info);
    /// assert_eq!(LogLevel::from_name("verbose"), LogLevel::Debug);
    /// ```
    pub fn from_name(name: &str) -> LogLevel {
        name.parse().unwrap_or(LogLevel::Debug)
    }

    /// Maps an integer onto the highest level whose rank does not exceed it.
    ///
    /// Values below the `TRACE` rank map to [`LogLevel::All`].
    pub fn from_int(value: i32) -> LogLevel {
        Self::VALUES
            .iter()
            .rev()
            .copied()
            .find(|level| *level != LogLevel::All && value >= level.rank())
            .unwrap_or(LogLevel::All)
    }

    /// Compact index stored in packed atomics.
    #[inline]
    pub(crate) const fn index(&self) -> u8 {
        *self as u8
    }

    #[inline]
    pub(crate) const fn from_index(index: u8) -> LogLevel {
        match index {
            0 => LogLevel::All,
            1 => LogLevel::Trace,
            2 => LogLevel::Debug,
            3 => LogLevel::Info,
            4 => LogLevel::Warn,
            5 => LogLevel::Error,
            6 => LogLevel::Fatal,
            _ => LogLevel::Off,
        }
    }

    #[cfg(feature = "console-colors")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::All | LogLevel::Trace => BrightBlack,
            LogLevel::Debug => Blue,
            LogLevel::Info => Green,
            LogLevel::Warn => Yellow,
            LogLevel::Error => Red,
            LogLevel::Fatal | LogLevel::Off => BrightRed,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(LogLevel::All),
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            "OFF" => Ok(LogLevel::Off),
            _ => Err(LoggerError::invalid_level(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(LogLevel::All < LogLevel::Trace);
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
        assert!(LogLevel::Fatal < LogLevel::Off);

        for pair in LogLevel::VALUES.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_is_greater_or_equal() {
        assert!(LogLevel::Error.is_greater_or_equal(LogLevel::Warn));
        assert!(LogLevel::Debug.is_greater_or_equal(LogLevel::Trace));
        assert!(LogLevel::Info.is_greater_or_equal(LogLevel::Info));
        assert!(!LogLevel::Debug.is_greater_or_equal(LogLevel::Info));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(LogLevel::from_name("info"), LogLevel::Info);
        assert_eq!(LogLevel::from_name("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from_name("  Info "), LogLevel::Info);
        assert_eq!(LogLevel::from_name("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from_name("off"), LogLevel::Off);
        assert_eq!(LogLevel::from_name("nonsense"), LogLevel::Debug);
        assert_eq!(LogLevel::from_name(""), LogLevel::Debug);
    }

    #[test]
    fn test_strict_parse_rejects_unknown() {
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!("fatal".parse::<LogLevel>().unwrap(), LogLevel::Fatal);
    }

    #[test]
    fn test_from_int() {
        assert_eq!(LogLevel::from_int(i32::MAX), LogLevel::Off);
        assert_eq!(LogLevel::from_int(50_000), LogLevel::Fatal);
        assert_eq!(LogLevel::from_int(45_000), LogLevel::Error);
        assert_eq!(LogLevel::from_int(20_000), LogLevel::Info);
        assert_eq!(LogLevel::from_int(10_001), LogLevel::Debug);
        assert_eq!(LogLevel::from_int(5_000), LogLevel::Trace);
        assert_eq!(LogLevel::from_int(4_999), LogLevel::All);
        assert_eq!(LogLevel::from_int(i32::MIN), LogLevel::All);
    }

    #[test]
    fn test_index_round_trip() {
        for level in LogLevel::VALUES {
            assert_eq!(LogLevel::from_index(level.index()), level);
        }
    }

    #[test]
    fn test_display_padding() {
        assert_eq!(format!("{:<5}", LogLevel::Info), "INFO ");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }
}
