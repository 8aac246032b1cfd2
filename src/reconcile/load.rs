//! Horizontal issue loading and decoration.
//!
//! The load phase turns each raw horizontal issue into a [`HorizontalIssue`]:
//! marker links extracted, severity derived, linked specification issues
//! resolved through the per-pass repository arena. Loading doubles as the
//! shortname learning pass and as the place where moved or vanished link
//! targets are repaired with `moved?` + `pending`.

use std::sync::Arc;

use crate::error::Result;
use crate::feeds::Subcategory;
use crate::github::{GithubApi, Issue, RepoArena, RepoHandle};
use crate::monitor::RunLog;
use crate::reconcile::links;
use crate::reconcile::shortnames::ShortnameMap;

/// A resolved marker link: the specification issue as loaded this pass.
#[derive(Debug, Clone)]
pub struct SpecRef {
    /// Specification repository full name, lowercased, post-move.
    pub repo: String,
    /// The link as written in the horizontal issue body.
    pub url: String,
    /// Snapshot of the specification issue.
    pub snapshot: Issue,
}

/// A horizontal issue decorated for reconciliation.
#[derive(Debug, Clone)]
pub struct HorizontalIssue {
    /// Horizontal repository full name, lowercased.
    pub repo: String,
    /// Horizontal category served by that repository.
    pub category: String,
    /// The issue itself.
    pub issue: Issue,
    /// Marker links found in the body, in order.
    pub marker_links: Vec<String>,
    /// Linked specification issues that resolved.
    pub spec_issues: Vec<SpecRef>,
    /// Severity carried by the issue, needs-resolution dominating tracker.
    pub hr_label: Option<Subcategory>,
}

/// Severity from the labels: needs-resolution strictly dominates tracker.
pub fn severity_of(issue: &Issue) -> Option<Subcategory> {
    if issue.has_label("needs-resolution") {
        Some(Subcategory::NeedsResolution)
    } else if issue.has_label("tracker") {
        Some(Subcategory::Tracker)
    } else {
        None
    }
}

/// Repair labels applied when a link target has evidently moved or vanished.
const MOVED_LABELS: [&str; 2] = ["moved?", "pending"];

async fn mark_moved(
    handle: &Arc<RepoHandle>,
    issue: &mut Issue,
    log: &RunLog,
) {
    log.issue_warn(&issue.html_url, "new labels 'moved?','pending'");
    let labels: Vec<String> = MOVED_LABELS.iter().map(|s| s.to_string()).collect();
    match handle.add_issue_labels(issue.number, &labels).await {
        Ok(added) => {
            issue.add_labels_local(&added);
        }
        Err(err) => log.issue_error(&issue.html_url, format!("could not add moved?: {err}")),
    }
}

/// Load and decorate every issue of one horizontal repository.
///
/// Errors from resolving individual spec links degrade to log lines; only a
/// failure to list the repository's own issues is returned to the caller.
pub async fn load_horizontal_repo(
    handle: &Arc<RepoHandle>,
    category: &str,
    arena: &RepoArena,
    api: &Arc<dyn GithubApi>,
    shortnames: &mut ShortnameMap,
    log: &RunLog,
    ttl: i64,
) -> Result<Vec<HorizontalIssue>> {
    let issues = handle.issues(Some(ttl)).await?;
    let mut decorated = Vec::with_capacity(issues.len());

    for mut issue in issues {
        let body = issue.body.clone().unwrap_or_default();
        let marker_links = links::extract_links(&body);
        shortnames.observe(&issue, &marker_links);
        let hr_label = severity_of(&issue);

        let mut spec_issues = Vec::new();
        for link in &marker_links {
            let (Some(repo_name), Some(number)) = (links::repo_of(link), links::number_of(link))
            else {
                continue;
            };
            let spec_repo = arena.repo(&repo_name);
            match spec_repo.issue(number).await {
                Ok(Some(spec_issue)) => {
                    let mut resolved_repo = repo_name;
                    if !spec_issue.html_url.eq_ignore_ascii_case(link)
                        && !issue.has_label("moved?")
                    {
                        if let Some(new_repo) = links::repo_of(&spec_issue.html_url) {
                            log.warn(format!(
                                "moved repository: \"{resolved_repo}\" is now \"{new_repo}\""
                            ));
                            resolved_repo = new_repo;
                        }
                        mark_moved(handle, &mut issue, log).await;
                    }
                    spec_issues.push(SpecRef {
                        repo: resolved_repo,
                        url: link.clone(),
                        snapshot: spec_issue,
                    });
                }
                Ok(None) => {
                    // not in the cached list: moved, deleted, or the cache is
                    // stale; ask the API directly before judging
                    match api.issue_direct(&repo_name, number).await {
                        Ok(Some(direct))
                            if !direct.html_url.eq_ignore_ascii_case(link)
                                && !issue.has_label("moved?") =>
                        {
                            log.issue_log(&issue.html_url, format!("moved? {link}"));
                            mark_moved(handle, &mut issue, log).await;
                        }
                        Ok(None) if !issue.has_label("moved?") => {
                            // gone from cache and API: deleted or moved
                            // beyond tracing; flag for manual triage
                            log.issue_log(&issue.html_url, format!("moved? {link}"));
                            mark_moved(handle, &mut issue, log).await;
                        }
                        Ok(_) => {
                            if issue.is_open() {
                                log.issue_error(
                                    &issue.html_url,
                                    format!("invalid linked issue? {link}"),
                                );
                            } else {
                                log.issue_log(
                                    &issue.html_url,
                                    format!("invalid linked issue? {link}"),
                                );
                            }
                        }
                        Err(err) => {
                            log.issue_error(&issue.html_url, format!("lookup failed {link}: {err}"));
                        }
                    }
                }
                Err(err) => {
                    log.issue_error(&issue.html_url, format!("lookup failed {link}: {err}"));
                }
            }
        }

        if !spec_issues.is_empty() && spec_issues.len() != marker_links.len() {
            log.issue_error(
                &issue.html_url,
                format!(
                    "loaded {} issues instead of {}",
                    spec_issues.len(),
                    marker_links.len()
                ),
            );
        }

        decorated.push(HorizontalIssue {
            repo: handle.full_name().to_string(),
            category: category.to_string(),
            issue,
            marker_links,
            spec_issues,
            hr_label,
        });
    }

    Ok(decorated)
}
