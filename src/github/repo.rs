//! Per-run repository handle.
//!
//! A `RepoHandle` owns the cached issue and label lists for one repository
//! for the lifetime of one reconciliation pass. Label mutations go through
//! the handle so the remote and the cached copy change together; the add and
//! remove operations check the cached state first, which makes re-running a
//! pass over already-consistent data a no-op.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::github::api::GithubApi;
use crate::github::types::{Issue, Label};

/// Cached view of one repository, plus the mutation API.
pub struct RepoHandle {
    full_name: String,
    api: Arc<dyn GithubApi>,
    issues: RwLock<Option<Vec<Issue>>>,
    labels: RwLock<Option<Vec<Label>>>,
}

impl RepoHandle {
    /// Create a handle. `full_name` is stored lowercased.
    pub fn new(full_name: &str, api: Arc<dyn GithubApi>) -> Self {
        Self {
            full_name: full_name.to_lowercase(),
            api,
            issues: RwLock::new(None),
            labels: RwLock::new(None),
        }
    }

    /// Repository full name, lowercased.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Repository owner (the part before the slash).
    pub fn owner(&self) -> &str {
        self.full_name.split('/').next().unwrap_or(&self.full_name)
    }

    /// All issues, from the cache when already loaded.
    pub async fn issues(&self, ttl: Option<i64>) -> Result<Vec<Issue>> {
        if let Some(cached) = self.issues.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let fetched = self.api.issues(&self.full_name, ttl).await?;
        let mut guard = self.issues.write().await;
        *guard = Some(fetched.clone());
        Ok(fetched)
    }

    /// One issue by number, from the cached list.
    pub async fn issue(&self, number: u64) -> Result<Option<Issue>> {
        Ok(self
            .issues(None)
            .await?
            .into_iter()
            .find(|issue| issue.number == number))
    }

    /// All labels, from the cache when already loaded.
    pub async fn labels(&self, ttl: Option<i64>) -> Result<Vec<Label>> {
        if let Some(cached) = self.labels.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let fetched = self.api.labels(&self.full_name, ttl).await?;
        let mut guard = self.labels.write().await;
        *guard = Some(fetched.clone());
        Ok(fetched)
    }

    /// Add labels to an issue, remote and cache together. Labels already on
    /// the cached issue are skipped. Returns the names actually added.
    pub async fn add_issue_labels(&self, number: u64, names: &[String]) -> Result<Vec<String>> {
        let mut guard = self.issues.write().await;
        let missing: Vec<String> = match guard.as_ref().and_then(|v| v.iter().find(|i| i.number == number)) {
            Some(issue) => names
                .iter()
                .filter(|n| !issue.has_label(n))
                .cloned()
                .collect(),
            // not cached (direct fetch); trust the caller's list
            None => names.to_vec(),
        };
        if missing.is_empty() {
            return Ok(missing);
        }
        self.api
            .add_issue_labels(&self.full_name, number, &missing)
            .await?;
        if let Some(issue) = guard.as_mut().and_then(|v| v.iter_mut().find(|i| i.number == number)) {
            issue.add_labels_local(&missing);
        }
        Ok(missing)
    }

    /// Remove a label from an issue, remote and cache together. A label not
    /// present on the cached issue is left alone. Returns whether a removal
    /// happened.
    pub async fn remove_issue_label(&self, number: u64, name: &str) -> Result<bool> {
        let mut guard = self.issues.write().await;
        if let Some(issue) = guard.as_ref().and_then(|v| v.iter().find(|i| i.number == number)) {
            if !issue.has_label(name) {
                return Ok(false);
            }
        }
        self.api
            .remove_issue_label(&self.full_name, number, name)
            .await?;
        if let Some(issue) = guard.as_mut().and_then(|v| v.iter_mut().find(|i| i.number == number)) {
            issue.remove_label_local(name);
        }
        Ok(true)
    }

    /// Open a new issue and append it to the cached list.
    pub async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue> {
        let created = self
            .api
            .create_issue(&self.full_name, title, body, labels)
            .await?;
        if let Some(cached) = self.issues.write().await.as_mut() {
            cached.push(created.clone());
        }
        Ok(created)
    }

    /// Make sure a label exists in the repository, creating it when absent.
    /// Returns whether it had to be created.
    pub async fn ensure_label(&self, label: &Label) -> Result<bool> {
        let known = self.labels(None).await?;
        if known.iter().any(|l| l.name == label.name) {
            return Ok(false);
        }
        self.api.create_label(&self.full_name, label).await?;
        if let Some(cached) = self.labels.write().await.as_mut() {
            cached.push(label.clone());
        }
        Ok(true)
    }

    /// Update an existing label's color/description.
    pub async fn update_label(&self, label: &Label) -> Result<()> {
        self.api.update_label(&self.full_name, label).await?;
        if let Some(cached) = self.labels.write().await.as_mut() {
            if let Some(existing) = cached.iter_mut().find(|l| l.name == label.name) {
                *existing = label.clone();
            }
        }
        Ok(())
    }

    /// Rename a label.
    pub async fn rename_label(&self, oldname: &str, label: &Label) -> Result<()> {
        self.api
            .rename_label(&self.full_name, oldname, label)
            .await?;
        if let Some(cached) = self.labels.write().await.as_mut() {
            cached.retain(|l| l.name != oldname);
            cached.push(label.clone());
        }
        Ok(())
    }
}
