use serde::Serialize;
use std::fmt;

/// Ordered severity scale, 1 (`Trace`) to 24 (`Fatal4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Trace = 1,
    Trace2 = 2,
    Trace3 = 3,
    Trace4 = 4,
    Debug = 5,
    Debug2 = 6,
    Debug3 = 7,
    Debug4 = 8,
    Info = 9,
    Info2 = 10,
    Info3 = 11,
    Info4 = 12,
    Warn = 13,
    Warn2 = 14,
    Warn3 = 15,
    Warn4 = 16,
    Error = 17,
    Error2 = 18,
    Error3 = 19,
    Error4 = 20,
    Fatal = 21,
    Fatal2 = 22,
    Fatal3 = 23,
    Fatal4 = 24,
}

impl Severity {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Short upper-case name, e.g. `"DEBUG"` or `"WARN3"`.
    pub fn name(self) -> &'static str {
        use Severity::*;
        match self {
            Trace => "TRACE",
            Trace2 => "TRACE2",
            Trace3 => "TRACE3",
            Trace4 => "TRACE4",
            Debug => "DEBUG",
            Debug2 => "DEBUG2",
            Debug3 => "DEBUG3",
            Debug4 => "DEBUG4",
            Info => "INFO",
            Info2 => "INFO2",
            Info3 => "INFO3",
            Info4 => "INFO4",
            Warn => "WARN",
            Warn2 => "WARN2",
            Warn3 => "WARN3",
            Warn4 => "WARN4",
            Error => "ERROR",
            Error2 => "ERROR2",
            Error3 => "ERROR3",
            Error4 => "ERROR4",
            Fatal => "FATAL",
            Fatal2 => "FATAL2",
            Fatal3 => "FATAL3",
            Fatal4 => "FATAL4",
        }
    }

    pub fn from_number(n: u8) -> Option<Severity> {
        use Severity::*;
        const ALL: [Severity; 24] = [
            Trace, Trace2, Trace3, Trace4, Debug, Debug2, Debug3, Debug4, Info, Info2, Info3,
            Info4, Warn, Warn2, Warn3, Warn4, Error, Error2, Error3, Error4, Fatal, Fatal2,
            Fatal3, Fatal4,
        ];
        ALL.get(usize::from(n).checked_sub(1)?).copied()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}
