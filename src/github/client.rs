//! Production `GithubApi` implementation.
//!
//! Reads go through the shared caching proxy (plain HTTP, no auth needed);
//! mutations and direct reads go through the authenticated REST API via
//! octocrab. Transient upstream failures (rate limiting, abuse detection,
//! gateway errors) are retried with exponential backoff up to a fixed cap,
//! then surfaced as per-request errors.
//!
//! In dry-run mode every mutating call logs what it would have done and
//! returns successfully without touching the remote.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::github::api::GithubApi;
use crate::github::types::{FileContent, Issue, Label, Team, W3cConfig};
use crate::monitor::RunLog;

/// Base delay for the exponential backoff.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Statuses worth retrying: rate limiting, abuse detection, gateway trouble.
fn retryable(status: u16) -> bool {
    matches!(status, 429 | 403 | 502 | 503 | 504)
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. }
        if source.status_code.as_u16() == 404)
}

/// REST + cache-proxy GitHub client.
pub struct RestClient {
    http: reqwest::Client,
    octo: octocrab::Octocrab,
    cache: String,
    max_retries: u32,
    dry_run: bool,
    log: Arc<RunLog>,
}

impl RestClient {
    /// Build a client from the runtime configuration.
    pub fn new(cfg: &TrackerConfig, log: Arc<RunLog>) -> Result<Self> {
        let octo = octocrab::OctocrabBuilder::new()
            .personal_token(cfg.gh_token.clone())
            .build()?;
        Ok(Self {
            http: reqwest::Client::new(),
            octo,
            cache: cfg.cache.trim_end_matches('/').to_string(),
            max_retries: cfg.max_retries,
            dry_run: cfg.debug,
            log,
        })
    }

    /// GET a JSON document from the caching proxy, with bounded retries.
    async fn get_cached<T: DeserializeOwned>(&self, path: &str, ttl: Option<i64>) -> Result<T> {
        let mut url = format!("{}{}", self.cache, path);
        if let Some(ttl) = ttl {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&format!("ttl={ttl}"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.http.get(&url).send().await;
            match outcome {
                Ok(resp) if resp.status().is_success() => return Ok(resp.json().await?),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if retryable(status) && attempt <= self.max_retries {
                        self.log
                            .warn(format!("{url} answered {status}, retry {attempt}"));
                    } else if retryable(status) {
                        return Err(TrackerError::RetriesExhausted {
                            url,
                            attempts: attempt,
                            reason: format!("HTTP {status}"),
                        });
                    } else {
                        return Err(TrackerError::Upstream { url, status });
                    }
                }
                Err(err) => {
                    if attempt > self.max_retries {
                        return Err(TrackerError::RetriesExhausted {
                            url,
                            attempts: attempt,
                            reason: err.to_string(),
                        });
                    }
                    self.log
                        .warn(format!("{url} failed ({err}), retry {attempt}"));
                }
            }
            tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
        }
    }

    /// Log a mutation suppressed by dry-run mode.
    fn skip(&self, what: String) -> bool {
        if self.dry_run {
            self.log.log(format!("[dry-run] {what}"));
        }
        self.dry_run
    }
}

#[async_trait]
impl GithubApi for RestClient {
    async fn issues(&self, repo: &str, ttl: Option<i64>) -> Result<Vec<Issue>> {
        self.get_cached(&format!("/v3/repos/{repo}/issues?state=all"), ttl)
            .await
    }

    async fn issue_direct(&self, repo: &str, number: u64) -> Result<Option<Issue>> {
        let route = format!("/repos/{repo}/issues/{number}");
        match self.octo.get::<Issue, _, ()>(route, None).await {
            Ok(issue) => Ok(Some(issue)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn labels(&self, repo: &str, ttl: Option<i64>) -> Result<Vec<Label>> {
        self.get_cached(&format!("/v3/repos/{repo}/labels"), ttl)
            .await
    }

    async fn create_label(&self, repo: &str, label: &Label) -> Result<()> {
        if self.skip(format!("create label {} on {repo}", label.name)) {
            return Ok(());
        }
        let _: serde_json::Value = self
            .octo
            .post(
                format!("/repos/{repo}/labels"),
                Some(&json!({
                    "name": label.name,
                    "color": label.color,
                    "description": label.description,
                })),
            )
            .await?;
        Ok(())
    }

    async fn update_label(&self, repo: &str, label: &Label) -> Result<()> {
        if self.skip(format!("update label {} on {repo}", label.name)) {
            return Ok(());
        }
        let _: serde_json::Value = self
            .octo
            .patch(
                format!("/repos/{repo}/labels/{}", label.name),
                Some(&json!({
                    "color": label.color,
                    "description": label.description,
                })),
            )
            .await?;
        Ok(())
    }

    async fn rename_label(&self, repo: &str, oldname: &str, label: &Label) -> Result<()> {
        if self.skip(format!("rename label {oldname} -> {} on {repo}", label.name)) {
            return Ok(());
        }
        let _: serde_json::Value = self
            .octo
            .patch(
                format!("/repos/{repo}/labels/{oldname}"),
                Some(&json!({
                    "new_name": label.name,
                    "color": label.color,
                    "description": label.description,
                })),
            )
            .await?;
        Ok(())
    }

    async fn add_issue_labels(&self, repo: &str, number: u64, labels: &[String]) -> Result<()> {
        if self.skip(format!("add {labels:?} to {repo}#{number}")) {
            return Ok(());
        }
        let _: serde_json::Value = self
            .octo
            .post(
                format!("/repos/{repo}/issues/{number}/labels"),
                Some(&json!({ "labels": labels })),
            )
            .await?;
        Ok(())
    }

    async fn remove_issue_label(&self, repo: &str, number: u64, label: &str) -> Result<()> {
        if self.skip(format!("remove {label} from {repo}#{number}")) {
            return Ok(());
        }
        let _: serde_json::Value = self
            .octo
            .delete(
                format!("/repos/{repo}/issues/{number}/labels/{label}"),
                None::<&()>,
            )
            .await?;
        Ok(())
    }

    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue> {
        if self.skip(format!("create issue \"{title}\" in {repo} with {labels:?}")) {
            return Ok(Issue {
                number: 0,
                html_url: format!("https://github.com/{repo}/issues/0"),
                title: title.to_string(),
                body: Some(body.to_string()),
                state: crate::github::types::IssueState::Open,
                labels: labels.iter().map(|n| Label::new(n.clone())).collect(),
                created_at: chrono::Utc::now(),
            });
        }
        let issue: Issue = self
            .octo
            .post(
                format!("/repos/{repo}/issues"),
                Some(&json!({
                    "title": title,
                    "body": body,
                    "labels": labels,
                })),
            )
            .await?;
        Ok(issue)
    }

    async fn repo_config(&self, repo: &str) -> Result<Option<W3cConfig>> {
        match self
            .get_cached::<W3cConfig>(&format!("/extra/repos/{repo}/w3c.json"), None)
            .await
        {
            Ok(cfg) => Ok(Some(cfg)),
            Err(TrackerError::Upstream { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn teams(&self, repo: &str) -> Result<Vec<Team>> {
        Ok(self
            .octo
            .get::<Vec<Team>, _, ()>(format!("/repos/{repo}/teams"), None)
            .await?)
    }

    async fn grant_team(&self, repo: &str, team: &str, permission: &str) -> Result<()> {
        if self.skip(format!("grant {team} {permission} on {repo}")) {
            return Ok(());
        }
        let org = repo.split('/').next().unwrap_or(repo);
        let response = self
            .octo
            ._put(
                format!("/orgs/{org}/teams/{team}/repos/{repo}"),
                Some(&json!({ "permission": permission })),
            )
            .await?;
        if !response.status().is_success() {
            return Err(TrackerError::Upstream {
                url: format!("/orgs/{org}/teams/{team}/repos/{repo}"),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn get_content(&self, repo: &str, path: &str) -> Result<Option<FileContent>> {
        let route = format!("/repos/{repo}/contents/{path}");
        let value = match self.octo.get::<serde_json::Value, _, ()>(route, None).await {
            Ok(value) => value,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let encoded = value["content"].as_str().unwrap_or_default().replace('\n', "");
        let decoded = base64_decode(&encoded)?;
        Ok(Some(FileContent {
            content: String::from_utf8_lossy(&decoded).into_owned(),
            sha: value["sha"].as_str().unwrap_or_default().to_string(),
        }))
    }

    async fn put_content(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
        branch: &str,
    ) -> Result<()> {
        if self.skip(format!("put {path} in {repo} ({message})")) {
            return Ok(());
        }
        let _: serde_json::Value = self
            .octo
            .put(
                format!("/repos/{repo}/contents/{path}"),
                Some(&json!({
                    "message": message,
                    "content": base64_encode(content.as_bytes()),
                    "sha": sha,
                    "branch": branch,
                })),
            )
            .await?;
        Ok(())
    }

    async fn rate_limit(&self) -> Result<serde_json::Value> {
        Ok(self
            .octo
            .get::<serde_json::Value, _, ()>("/rate_limit", None)
            .await?)
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

// The contents API wraps base64 at 60 columns; strip the newlines before
// decoding.

fn base64_encode(input: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(input)
}

fn base64_decode(input: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input)
        .map_err(|e| TrackerError::Config(format!("invalid base64 content: {e}")))
}
