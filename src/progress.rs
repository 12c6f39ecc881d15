//! Run progress reporting.
//!
//! The pipeline narrates what it is doing as newline-delimited lines on
//! **stdout**, flushed after every line, so a supervising process can tail
//! the stream and show live status. Lines that carry an outcome are prefixed
//! with a bracketed marker (`[OK]`, `[WARNING]`, `[ERROR]`). Diagnostics that
//! are not part of this stream go through `tracing` on stderr.

use std::io::Write;
use std::sync::Mutex;

/// Outcome marker attached to a progress line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    /// Plain narration, no marker.
    Info,
    Ok,
    Warning,
    Error,
}

impl Level {
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Level::Info => None,
            Level::Ok => Some("[OK]"),
            Level::Warning => Some("[WARNING]"),
            Level::Error => Some("[ERROR]"),
        }
    }
}

/// Receives progress lines from the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.report(Level::Info, message);
    }

    fn ok(&self, message: &str) {
        self.report(Level::Ok, message);
    }

    fn warn(&self, message: &str) {
        self.report(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.report(Level::Error, message);
    }
}

/// Render a progress line as it appears on stdout.
pub fn format_line(level: Level, message: &str) -> String {
    match level.marker() {
        Some(marker) => format!("{} {}", marker, message),
        None => message.to_string(),
    }
}

/// Writes each line to stdout and flushes immediately.
pub struct StdoutProgress;

impl ProgressReporter for StdoutProgress {
    fn report(&self, level: Level, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", format_line(level, message));
        let _ = out.flush();
    }
}

/// No-op reporter.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _level: Level, _message: &str) {}
}

/// Keeps every line in memory. Used by tests and by callers that want to
/// inspect a run after the fact.
#[derive(Default)]
pub struct RecordingProgress {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_markers() {
        assert_eq!(format_line(Level::Info, "Round 1/2"), "Round 1/2");
        assert_eq!(format_line(Level::Ok, "done"), "[OK] done");
        assert_eq!(format_line(Level::Warning, "hm"), "[WARNING] hm");
        assert_eq!(format_line(Level::Error, "bad"), "[ERROR] bad");
    }

    #[test]
    fn test_recording_progress_keeps_order() {
        let progress = RecordingProgress::new();
        progress.info("first");
        progress.error("second");
        let lines = progress.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], (Level::Info, "first".to_string()));
        assert!(progress.contains(Level::Error, "sec"));
        assert!(!progress.contains(Level::Ok, "first"));
    }
}
