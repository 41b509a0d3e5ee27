use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a [`LogEvent`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

/// Error attached to a [`LogEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    /// Type name or field name that identifies the error.
    pub kind: String,
    pub message: String,
    /// Formatted trace, one frame or cause per line.
    pub trace: Option<String>,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionInfo {
            kind: kind.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Build from a `std::error::Error`, rendering its `source()` chain as
    /// the trace.
    pub fn from_error(kind: impl Into<String>, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("Caused by: {}", cause));
            source = cause.source();
        }

        let info = ExceptionInfo::new(kind, error.to_string());
        if causes.is_empty() {
            info
        } else {
            info.with_trace(causes.join("\n"))
        }
    }
}

/// Normalized event handed to message creators.
///
/// Built by [`DiscordLayer`](crate::layer::DiscordLayer) from a `tracing`
/// event, or directly by callers that feed
/// [`DiscordHandler::emit`](crate::handler::DiscordHandler::emit).
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub target: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub message: String,
    pub exception: Option<ExceptionInfo>,
}

impl LogEvent {
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            target: String::new(),
            module_path: None,
            file: None,
            line: None,
            fields: BTreeMap::new(),
            message: message.into(),
            exception: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// "In <file> at line <n>", or just the target when no location is known.
    pub fn location(&self) -> String {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("In {} at line {}", file, line),
            (Some(file), None) => format!("In {}", file),
            _ => format!("In {}", self.target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk full")
        }
    }

    impl std::error::Error for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("write failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
        assert_eq!(Severity::from(&tracing::Level::WARN), Severity::Warn);
    }

    #[test]
    fn exception_from_error_renders_cause_chain() {
        let err = Outer(Inner);
        let info = ExceptionInfo::from_error("IoError", &err);
        assert_eq!(info.kind, "IoError");
        assert_eq!(info.message, "write failed");
        assert_eq!(info.trace.as_deref(), Some("Caused by: disk full"));

        let leaf = ExceptionInfo::from_error("Inner", &Inner);
        assert_eq!(leaf.trace, None);
    }

    #[test]
    fn location_prefers_file_and_line() {
        let event = LogEvent::new(Severity::Info, "hi").with_target("app::db");
        assert_eq!(event.location(), "In app::db");

        let event = event.with_location("src/db.rs", 12);
        assert_eq!(event.location(), "In src/db.rs at line 12");
    }
}
