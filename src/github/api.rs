//! The `GithubApi` seam.
//!
//! Everything the reconciliation engine needs from GitHub, as an abstract
//! async trait. The production implementation ([`crate::github::RestClient`])
//! reads through the caching proxy and mutates through the authenticated
//! REST API; the test-suite substitutes an in-memory fake.

use async_trait::async_trait;

use crate::error::Result;
use crate::github::types::{FileContent, Issue, Label, Team, W3cConfig};

/// Abstract GitHub operations used by the tracker.
///
/// Repository arguments are full names (`owner/name`), lowercased by callers.
/// Mutating operations must be no-ops (beyond logging) when the
/// implementation is in dry-run mode.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// All issues of a repository, every state. `ttl` tunes cache freshness
    /// in minutes; `-1` forces a refresh; `None` accepts whatever the cache
    /// holds.
    async fn issues(&self, repo: &str, ttl: Option<i64>) -> Result<Vec<Issue>>;

    /// Fetch one issue directly from the API, bypassing the cache. Used as a
    /// fallback when a linked issue is missing from the cached list.
    /// `Ok(None)` on 404.
    async fn issue_direct(&self, repo: &str, number: u64) -> Result<Option<Issue>>;

    /// All labels of a repository.
    async fn labels(&self, repo: &str, ttl: Option<i64>) -> Result<Vec<Label>>;

    /// Create a label.
    async fn create_label(&self, repo: &str, label: &Label) -> Result<()>;

    /// Update color/description of an existing label.
    async fn update_label(&self, repo: &str, label: &Label) -> Result<()>;

    /// Rename `oldname` to `label.name`, updating color/description too.
    async fn rename_label(&self, repo: &str, oldname: &str, label: &Label) -> Result<()>;

    /// Add labels to an issue.
    async fn add_issue_labels(&self, repo: &str, number: u64, labels: &[String]) -> Result<()>;

    /// Remove one label from an issue.
    async fn remove_issue_label(&self, repo: &str, number: u64, label: &str) -> Result<()>;

    /// Open a new issue. Returns the created issue.
    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue>;

    /// The repository's `w3c.json` metadata, if any.
    async fn repo_config(&self, repo: &str) -> Result<Option<W3cConfig>>;

    /// Teams attached to a repository.
    async fn teams(&self, repo: &str) -> Result<Vec<Team>>;

    /// Attach an org team to a repository with the given permission.
    async fn grant_team(&self, repo: &str, team: &str, permission: &str) -> Result<()>;

    /// Fetch a file through the contents API. `Ok(None)` on 404.
    async fn get_content(&self, repo: &str, path: &str) -> Result<Option<FileContent>>;

    /// Create or update a file through the contents API. `sha` must be the
    /// current blob SHA when updating an existing file.
    async fn put_content(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
        branch: &str,
    ) -> Result<()>;

    /// Current rate-limit document, for the monitor endpoint.
    async fn rate_limit(&self) -> Result<serde_json::Value>;

    /// Whether mutations are suppressed.
    fn dry_run(&self) -> bool {
        false
    }
}
