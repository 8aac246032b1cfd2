//! Buffered run log and service monitor.
//!
//! Every pass appends its log lines here so the end-of-run report can be
//! emailed as one document. `tracing` remains the console/ops surface; the
//! [`RunLog`] is the per-run artifact. Buffers are bounded ring buffers so a
//! noisy pass cannot grow without limit.

pub mod http;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::Utc;

pub use http::serve as serve_monitor;

/// Maximum number of entries returned by the monitor endpoint. Buffers are
/// trimmed at twice this value.
const MAX_ENTRIES: usize = 200;

/// Shared, thread-safe buffer of log lines for one service lifetime.
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Mutex<Vec<String>>,
    error_lines: Mutex<Vec<String>>,
    warnings: AtomicU32,
    errors: AtomicU32,
}

fn push_bounded(buf: &Mutex<Vec<String>>, line: String) {
    let mut buf = buf.lock().expect("log buffer poisoned");
    if buf.len() >= MAX_ENTRIES * 2 {
        buf.drain(..MAX_ENTRIES);
    }
    buf.push(line);
}

fn stamp(level: &str, msg: &str) -> String {
    format!("[{level}] [{}] {msg}", Utc::now().to_rfc3339())
}

impl RunLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational line.
    pub fn log(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::info!("{msg}");
        push_bounded(&self.lines, stamp("log", msg));
    }

    /// Record a warning.
    pub fn warn(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::warn!("{msg}");
        self.warnings.fetch_add(1, Ordering::Relaxed);
        push_bounded(&self.lines, stamp("warn", msg));
    }

    /// Record an error. Errors are kept in a second buffer as well so they
    /// survive even when routine lines rotate out.
    pub fn error(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        tracing::error!("{msg}");
        self.errors.fetch_add(1, Ordering::Relaxed);
        let line = stamp("err", msg);
        push_bounded(&self.error_lines, line.clone());
        push_bounded(&self.lines, line);
    }

    /// Record a line about a specific issue, prefixed with its URL.
    pub fn issue_log(&self, html_url: &str, msg: impl AsRef<str>) {
        self.log(format!("{html_url} {}", msg.as_ref()));
    }

    /// Warning variant of [`RunLog::issue_log`].
    pub fn issue_warn(&self, html_url: &str, msg: impl AsRef<str>) {
        self.warn(format!("{html_url} {}", msg.as_ref()));
    }

    /// Error variant of [`RunLog::issue_log`].
    pub fn issue_error(&self, html_url: &str, msg: impl AsRef<str>) {
        self.error(format!("{html_url} {}", msg.as_ref()));
    }

    /// Snapshot of the most recent log lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        let buf = self.lines.lock().expect("log buffer poisoned");
        let start = buf.len().saturating_sub(MAX_ENTRIES);
        buf[start..].to_vec()
    }

    /// Snapshot of the most recent error lines.
    pub fn error_lines(&self) -> Vec<String> {
        let buf = self.error_lines.lock().expect("log buffer poisoned");
        let start = buf.len().saturating_sub(MAX_ENTRIES);
        buf[start..].to_vec()
    }

    /// Number of warnings recorded so far.
    pub fn warning_count(&self) -> u32 {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Number of errors recorded so far.
    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }
}
