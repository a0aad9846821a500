//! Append-only transfer log shown to the user.

use std::fmt;

use chrono::{Local, NaiveTime};

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    text: String,
    stamped_at: Option<NaiveTime>,
}

impl LogEntry {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_timestamped(&self) -> bool {
        self.stamped_at.is_some()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stamped_at {
            Some(at) => write!(f, "[{}] {}", at.format("%H:%M:%S"), self.text),
            None => f.write_str(&self.text),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferLog {
    entries: Vec<LogEntry>,
}

impl TransferLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line, prefixed with the local wall-clock time when `timestamped`.
    pub fn push(&mut self, line: impl Into<String>, timestamped: bool) {
        let stamped_at = timestamped.then(|| Local::now().time());
        self.entries.push(LogEntry {
            text: line.into(),
            stamped_at,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Rendered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    /// Raw texts without timestamp prefixes.
    #[cfg(test)]
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(LogEntry::text).collect()
    }
}
