//! In-memory `GithubApi` fake used by the test-suite.
//!
//! Seeded with issues and labels per repository; every mutation is applied
//! to the in-memory state and recorded so tests can assert on exactly what
//! a pass did (or did not) touch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::error::{Result, TrackerError};
use crate::github::api::GithubApi;
use crate::github::types::{FileContent, Issue, IssueState, Label, Team, W3cConfig};

/// Build a plain open issue for tests.
pub fn make_issue(repo: &str, number: u64, title: &str, labels: &[&str]) -> Issue {
    Issue {
        number,
        html_url: format!("https://github.com/{repo}/issues/{number}"),
        title: title.to_string(),
        body: None,
        state: IssueState::Open,
        labels: labels.iter().map(|n| Label::new(*n)).collect(),
        created_at: Utc.with_ymd_and_hms(2023, 3, 14, 9, 0, 0).single().expect("timestamp"),
    }
}

/// In-memory fake.
#[derive(Default)]
pub struct FakeGithub {
    issues: Mutex<HashMap<String, Vec<Issue>>>,
    direct: Mutex<HashMap<(String, u64), Issue>>,
    labels: Mutex<HashMap<String, Vec<Label>>>,
    configs: Mutex<HashMap<String, W3cConfig>>,
    teams: Mutex<HashMap<String, Vec<Team>>>,
    files: Mutex<HashMap<(String, String), FileContent>>,
    failing: Mutex<Vec<String>>,
    mutations: Mutex<Vec<String>>,
    mutation_count: AtomicU32,
}

impl FakeGithub {
    /// Empty fake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the issue list of a repository.
    pub fn seed_issues(&self, repo: &str, issues: Vec<Issue>) {
        self.issues
            .lock()
            .expect("fake poisoned")
            .insert(repo.to_lowercase(), issues);
    }

    /// Seed an issue only reachable through the direct (uncached) lookup.
    pub fn seed_direct(&self, repo: &str, issue: Issue) {
        self.direct
            .lock()
            .expect("fake poisoned")
            .insert((repo.to_lowercase(), issue.number), issue);
    }

    /// Replace the label list of a repository.
    pub fn seed_labels(&self, repo: &str, labels: Vec<Label>) {
        self.labels
            .lock()
            .expect("fake poisoned")
            .insert(repo.to_lowercase(), labels);
    }

    /// Seed a `w3c.json` for a repository.
    pub fn seed_config(&self, repo: &str, config: W3cConfig) {
        self.configs
            .lock()
            .expect("fake poisoned")
            .insert(repo.to_lowercase(), config);
    }

    /// Make `issues()` fail for a repository.
    pub fn fail_issues_for(&self, repo: &str) {
        self.failing
            .lock()
            .expect("fake poisoned")
            .push(repo.to_lowercase());
    }

    /// Number of mutating calls made so far.
    pub fn mutation_count(&self) -> u32 {
        self.mutation_count.load(Ordering::Relaxed)
    }

    /// Human-readable record of every mutation, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().expect("fake poisoned").clone()
    }

    /// Current issue list of a repository (post-mutation view).
    pub fn issues_of(&self, repo: &str) -> Vec<Issue> {
        self.issues
            .lock()
            .expect("fake poisoned")
            .get(&repo.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Current stored file, if any.
    pub fn file_of(&self, repo: &str, path: &str) -> Option<FileContent> {
        self.files
            .lock()
            .expect("fake poisoned")
            .get(&(repo.to_lowercase(), path.to_string()))
            .cloned()
    }

    fn record(&self, what: String) {
        self.mutation_count.fetch_add(1, Ordering::Relaxed);
        self.mutations.lock().expect("fake poisoned").push(what);
    }
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn issues(&self, repo: &str, _ttl: Option<i64>) -> Result<Vec<Issue>> {
        if self.failing.lock().expect("fake poisoned").iter().any(|r| r == repo) {
            return Err(TrackerError::Upstream {
                url: format!("/v3/repos/{repo}/issues"),
                status: 500,
            });
        }
        Ok(self
            .issues
            .lock()
            .expect("fake poisoned")
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn issue_direct(&self, repo: &str, number: u64) -> Result<Option<Issue>> {
        let direct = self.direct.lock().expect("fake poisoned");
        if let Some(issue) = direct.get(&(repo.to_string(), number)) {
            return Ok(Some(issue.clone()));
        }
        drop(direct);
        Ok(self
            .issues
            .lock()
            .expect("fake poisoned")
            .get(repo)
            .and_then(|v| v.iter().find(|i| i.number == number))
            .cloned())
    }

    async fn labels(&self, repo: &str, _ttl: Option<i64>) -> Result<Vec<Label>> {
        Ok(self
            .labels
            .lock()
            .expect("fake poisoned")
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_label(&self, repo: &str, label: &Label) -> Result<()> {
        self.record(format!("create_label {repo} {}", label.name));
        self.labels
            .lock()
            .expect("fake poisoned")
            .entry(repo.to_string())
            .or_default()
            .push(label.clone());
        Ok(())
    }

    async fn update_label(&self, repo: &str, label: &Label) -> Result<()> {
        self.record(format!("update_label {repo} {}", label.name));
        if let Some(labels) = self.labels.lock().expect("fake poisoned").get_mut(repo) {
            if let Some(existing) = labels.iter_mut().find(|l| l.name == label.name) {
                *existing = label.clone();
            }
        }
        Ok(())
    }

    async fn rename_label(&self, repo: &str, oldname: &str, label: &Label) -> Result<()> {
        self.record(format!("rename_label {repo} {oldname} -> {}", label.name));
        if let Some(labels) = self.labels.lock().expect("fake poisoned").get_mut(repo) {
            labels.retain(|l| l.name != oldname);
            labels.push(label.clone());
        }
        Ok(())
    }

    async fn add_issue_labels(&self, repo: &str, number: u64, names: &[String]) -> Result<()> {
        self.record(format!("add {repo}#{number} {names:?}"));
        if let Some(issues) = self.issues.lock().expect("fake poisoned").get_mut(repo) {
            if let Some(issue) = issues.iter_mut().find(|i| i.number == number) {
                issue.add_labels_local(names);
            }
        }
        Ok(())
    }

    async fn remove_issue_label(&self, repo: &str, number: u64, name: &str) -> Result<()> {
        self.record(format!("remove {repo}#{number} {name}"));
        if let Some(issues) = self.issues.lock().expect("fake poisoned").get_mut(repo) {
            if let Some(issue) = issues.iter_mut().find(|i| i.number == number) {
                issue.remove_label_local(name);
            }
        }
        Ok(())
    }

    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue> {
        let mut issues = self.issues.lock().expect("fake poisoned");
        let list = issues.entry(repo.to_string()).or_default();
        let number = list.iter().map(|i| i.number).max().unwrap_or(0) + 1;
        let issue = Issue {
            number,
            html_url: format!("https://github.com/{repo}/issues/{number}"),
            title: title.to_string(),
            body: Some(body.to_string()),
            state: IssueState::Open,
            labels: labels.iter().map(|n| Label::new(n.clone())).collect(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("timestamp"),
        };
        list.push(issue.clone());
        drop(issues);
        self.record(format!("create_issue {repo} \"{title}\" {labels:?}"));
        Ok(issue)
    }

    async fn repo_config(&self, repo: &str) -> Result<Option<W3cConfig>> {
        Ok(self.configs.lock().expect("fake poisoned").get(repo).cloned())
    }

    async fn teams(&self, repo: &str) -> Result<Vec<Team>> {
        Ok(self
            .teams
            .lock()
            .expect("fake poisoned")
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn grant_team(&self, repo: &str, team: &str, permission: &str) -> Result<()> {
        self.record(format!("grant_team {repo} {team} {permission}"));
        Ok(())
    }

    async fn get_content(&self, repo: &str, path: &str) -> Result<Option<FileContent>> {
        Ok(self
            .files
            .lock()
            .expect("fake poisoned")
            .get(&(repo.to_string(), path.to_string()))
            .cloned())
    }

    async fn put_content(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        _sha: Option<&str>,
        _branch: &str,
    ) -> Result<()> {
        self.record(format!("put_content {repo} {path} ({message})"));
        self.files.lock().expect("fake poisoned").insert(
            (repo.to_string(), path.to_string()),
            FileContent {
                content: content.to_string(),
                sha: format!("sha-{}", content.len()),
            },
        );
        Ok(())
    }

    async fn rate_limit(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "resources": { "core": { "limit": 5000, "remaining": 5000 } }
        }))
    }
}
