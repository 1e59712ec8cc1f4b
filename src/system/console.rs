// src/system/console.rs

use colored::Colorize;
use std::io::Write;
use std::sync::Arc;

/// Formats an informational status line.
pub fn info_line(message: &str) -> String {
    format!("INFO: {message}")
}

/// Formats a warning status line (`WARN` in yellow).
pub fn warn_line(message: &str) -> String {
    format!("{}: {message}", "WARN".yellow())
}

/// Formats an error status line (`ERROR` in red).
pub fn error_line(message: &str) -> String {
    format!("{}: {message}", "ERROR".red())
}

/// Destination for status lines and prefixed child output.
///
/// Several stream readers write at once, so implementations must write each line
/// atomically: one call, one uninterrupted line.
pub trait OutputSink: Send + Sync {
    /// Writes one complete line.
    fn emit(&self, line: &str);

    /// Writes an `INFO:` status line.
    fn info(&self, message: &str) {
        self.emit(&info_line(message));
    }

    /// Writes a `WARN:` status line.
    fn warn(&self, message: &str) {
        self.emit(&warn_line(message));
    }

    /// Writes an `ERROR:` status line.
    fn error(&self, message: &str) {
        self.emit(&error_line(message));
    }
}

/// A sink shared between the orchestrator and its reader tasks.
pub type SharedSink = Arc<dyn OutputSink>;

/// Writes lines to the process's standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&self, line: &str) {
        // The lock is held for the whole line so concurrent writers never interleave.
        let mut out = std::io::stdout().lock();
        if writeln!(out, "{line}").and_then(|()| out.flush()).is_err() {
            log::trace!("stdout closed; dropped line: {}", line);
        }
    }
}

/// Collects lines in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CapturingSink {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl CapturingSink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl OutputSink for CapturingSink {
    fn emit(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
