//! Error taxonomy for the tracker.
//!
//! Three families matter operationally: transient I/O failures (retried, then
//! surfaced per repository), data inconsistencies (logged, processing
//! continues), and structural failures (abort the whole pass). The first two
//! are ordinary `TrackerError` values; the structural case has its own
//! variant so the driver can fail fast on it.

use thiserror::Error;

/// Errors that can occur while loading feeds, talking to GitHub, or running
/// a reconciliation pass.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// HTTP transport error (cache proxy or feed fetch).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GitHub API error from the authenticated client.
    #[error("GitHub API error: {0}")]
    GitHub(#[from] octocrab::Error),

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// A published feed returned something we could not use.
    #[error("feed error: {url}: {reason}")]
    Feed {
        /// Feed URL that failed.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// An upstream endpoint answered with a status we will not retry.
    #[error("{url} answered HTTP {status}")]
    Upstream {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// An upstream endpoint kept failing after the retry cap.
    #[error("{url} still failing after {attempts} attempts: {reason}")]
    RetriesExhausted {
        /// Request URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure observed.
        reason: String,
    },

    /// A horizontal repository could not be loaded at all. Partial horizontal
    /// data produces unreliable shortname evidence, so this aborts the pass.
    #[error("horizontal repository unavailable: {0}")]
    HorizontalRepoUnavailable(String),
}

impl TrackerError {
    /// Whether this error must abort the current reconciliation pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TrackerError::HorizontalRepoUnavailable(_))
    }
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
