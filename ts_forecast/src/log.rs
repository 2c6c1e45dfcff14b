//! Append-only diagnostic log returned with every run

use chrono::Local;
use tracing::{error, info, warn};

/// Severity of a [`RunLog`] entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Timestamped messages collected during one run.
///
/// Each entry renders as `HH:MM:SS - message`; every entry is also forwarded
/// to `tracing` at the matching level.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<(LogLevel, String)>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        info!("{}", message.as_ref());
        self.push(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        warn!("{}", message.as_ref());
        self.push(LogLevel::Warning, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        error!("{}", message.as_ref());
        self.push(LogLevel::Error, message.as_ref());
    }

    fn push(&mut self, level: LogLevel, message: &str) {
        let stamp = Local::now().format("%H:%M:%S");
        self.entries.push((level, format!("{} - {}", stamp, message)));
    }

    /// Rendered entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, line)| line.as_str())
    }

    /// Rendered entries at a given level
    pub fn entries_at(&self, level: LogLevel) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(l, _)| *l == level)
            .map(|(_, line)| line.as_str())
    }

    /// Whether any entry contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().any(|line| line.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newline-joined log text
    pub fn render(&self) -> String {
        self.entries().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_timestamped_and_joined() {
        let mut log = RunLog::new();
        log.info("first");
        log.warn("second");

        let text = log.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - first"));
        assert_eq!(lines[0].find(" - "), Some(8));
        assert_eq!(log.entries_at(LogLevel::Warning).count(), 1);
        assert!(log.contains("second"));
    }
}
