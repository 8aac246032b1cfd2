//! Reconciliation driver.
//!
//! One pass walks the fixed phase sequence: load the horizontal repositories
//! (learning shortnames along the way), report shortname ambiguities, check
//! every horizontal issue, load the tracked specification repositories, then
//! check every specification issue and create missing tracker issues. All
//! per-pass state (repository arena, shortname map, statistics) is built
//! here and dropped at the end; nothing survives between passes.
//!
//! Horizontal repositories load sequentially to go easy on the shared cache;
//! a repository that cannot be loaded at all aborts the pass, because
//! partial horizontal data would poison the shortname evidence. Tracked
//! specification repositories load with bounded concurrency and degrade to
//! an empty contribution on error.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::{Result, TrackerError};
use crate::feeds::{HorizontalLabel, HorizontalLabels, Subcategory};
use crate::github::{GithubApi, Issue, Label, RepoArena};
use crate::monitor::RunLog;
use crate::reconcile::labels::{plan, LabelAction, Target};
use crate::reconcile::links;
use crate::reconcile::load::{load_horizontal_repo, HorizontalIssue};
use crate::reconcile::shortnames::ShortnameMap;
use crate::reconcile::synthesize::{
    self, find_tracking, requested_labels, skip_reason, SkipReason, SHORTNAME_LABEL_COLOR,
};

/// How many specification repositories to fetch at once.
const SPEC_FETCH_CONCURRENCY: usize = 4;

/// Options for one pass.
#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Cache TTL in minutes for horizontal repository loads; `-1` forces a
    /// refresh.
    pub horizontal_ttl: i64,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self { horizontal_ttl: -1 }
    }
}

/// Counters aggregated over one pass.
#[derive(Debug, Clone, Default)]
pub struct PassStats {
    /// Horizontal issues loaded.
    pub horizontal_issues: usize,
    /// Specification issues seen.
    pub spec_issues_total: usize,
    /// Of which open.
    pub spec_issues_open: usize,
    /// Labels added across both sides.
    pub labels_added: u64,
    /// Labels removed across both sides.
    pub labels_removed: u64,
    /// Tracker issues created.
    pub issues_created: u64,
    /// Closed-before-cutoff spec issues passed over.
    pub pre_cutoff_skips: u64,
}

/// Run one full reconciliation pass.
pub async fn run_pass(
    api: Arc<dyn GithubApi>,
    official: &HorizontalLabels,
    tracked_repos: &[String],
    opts: &PassOptions,
    log: &RunLog,
) -> Result<PassStats> {
    let arena = RepoArena::new(api.clone());
    let mut shortnames = ShortnameMap::new();
    let mut stats = PassStats::default();

    // LOAD_HORIZONTAL
    let hr_repos = official.repositories();
    log.log(format!(
        "Loading issues from {} horizontal repositories",
        hr_repos.len()
    ));
    let mut hr_issues: Vec<HorizontalIssue> = Vec::new();
    for repo in &hr_repos {
        let handle = arena.repo(&repo.full_name);
        let issues = load_horizontal_repo(
            &handle,
            &repo.category,
            &arena,
            &api,
            &mut shortnames,
            log,
            opts.horizontal_ttl,
        )
        .await
        .map_err(|err| {
            TrackerError::HorizontalRepoUnavailable(format!("{}: {err}", repo.full_name))
        })?;
        if issues.is_empty() {
            return Err(TrackerError::HorizontalRepoUnavailable(
                repo.full_name.clone(),
            ));
        }
        log.log(format!(
            "fetched {} horizontal issues from {}",
            issues.len(),
            repo.full_name
        ));
        hr_issues.extend(issues);
    }
    stats.horizontal_issues = hr_issues.len();

    // LEARN_SHORTNAMES: evidence accumulated during the load; report conflicts
    for (repo, names) in shortnames.ambiguities() {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        log.warn(format!(
            "multiple shortnames for {repo} : {}",
            names.join(",")
        ));
    }

    // CHECK_HORIZONTAL
    log.log(format!(
        "Loaded and checking {} horizontal issues for {} labels",
        hr_issues.len(),
        official.labels().len()
    ));
    for index in 0..hr_issues.len() {
        let actions = plan(&hr_issues[index], &shortnames);
        apply_actions(&mut hr_issues[index], &actions, &arena, log, &mut stats).await;
    }

    // LOAD_SPEC_REPOS
    log.log(format!(
        "Tracking issues from {} specification repositories",
        tracked_repos.len()
    ));
    warn_unknown_repos(&hr_issues, tracked_repos, log);

    let handles: Vec<_> = tracked_repos.iter().map(|r| arena.repo(r)).collect();
    let spec_issues: Vec<Issue> = stream::iter(handles)
        .map(|handle| async move {
            let name = handle.full_name().to_string();
            (name, handle.issues(None).await)
        })
        .buffer_unordered(SPEC_FETCH_CONCURRENCY)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flat_map(|(name, outcome)| match outcome {
            Ok(issues) => issues,
            Err(err) => {
                log.error(format!("failed to load issues from {name}: {err}"));
                Vec::new()
            }
        })
        .collect();

    stats.spec_issues_total = spec_issues.len();
    stats.spec_issues_open = spec_issues.iter().filter(|i| i.is_open()).count();
    log.log(format!(
        "Tracking {} specification issues ({} closed and {} open)",
        stats.spec_issues_total,
        stats.spec_issues_total - stats.spec_issues_open,
        stats.spec_issues_open
    ));

    // CHECK_SPEC_ISSUES
    for issue in &spec_issues {
        check_spec_issue(issue, official, &hr_issues, &shortnames, &arena, log, &mut stats)
            .await;
    }

    // DONE
    log.log(format!(
        "{} issues were not created since they got closed prior to the year {}",
        stats.pre_cutoff_skips,
        synthesize::CUTOFF_YEAR
    ));
    log.log(format!(
        "pass complete: {} labels added, {} removed, {} issues created",
        stats.labels_added, stats.labels_removed, stats.issues_created
    ));
    Ok(stats)
}

/// Apply planned actions for one horizontal issue. Each mutation is
/// attempted independently; a failure is logged and the rest continue.
/// Mutations for the same issue are awaited in order, never raced.
async fn apply_actions(
    hr: &mut HorizontalIssue,
    actions: &[LabelAction],
    arena: &RepoArena,
    log: &RunLog,
    stats: &mut PassStats,
) {
    for action in actions {
        match action {
            LabelAction::Warn { message } => log.warn(message),
            LabelAction::Add { target, labels } => {
                let (repo, number, url) = locate(hr, *target);
                match arena.repo(&repo).add_issue_labels(number, labels).await {
                    Ok(added) if !added.is_empty() => {
                        stats.labels_added += added.len() as u64;
                        log.issue_log(&url, format!("added label(s) {}", added.join(",")));
                        update_local(hr, *target, |issue| {
                            issue.add_labels_local(&added);
                        });
                    }
                    Ok(_) => {}
                    Err(err) => {
                        log.issue_error(&url, format!("could not add {labels:?}: {err}"));
                    }
                }
            }
            LabelAction::Remove { target, label } => {
                let (repo, number, url) = locate(hr, *target);
                match arena.repo(&repo).remove_issue_label(number, label).await {
                    Ok(true) => {
                        stats.labels_removed += 1;
                        log.issue_log(&url, format!("dropped label {label}"));
                        update_local(hr, *target, |issue| {
                            issue.remove_label_local(label);
                        });
                    }
                    Ok(false) => {}
                    Err(err) => {
                        log.issue_error(&url, format!("could not remove \"{label}\": {err}"));
                    }
                }
            }
        }
    }
}

fn locate(hr: &HorizontalIssue, target: Target) -> (String, u64, String) {
    match target {
        Target::Horizontal => (hr.repo.clone(), hr.issue.number, hr.issue.html_url.clone()),
        Target::Spec(i) => {
            let spec = &hr.spec_issues[i];
            (
                spec.repo.clone(),
                spec.snapshot.number,
                spec.snapshot.html_url.clone(),
            )
        }
    }
}

fn update_local(hr: &mut HorizontalIssue, target: Target, f: impl FnOnce(&mut Issue)) {
    match target {
        Target::Horizontal => f(&mut hr.issue),
        Target::Spec(i) => f(&mut hr.spec_issues[i].snapshot),
    }
}

/// Repositories reached through marker links but absent from the tracked
/// union deserve a heads-up; someone has to add them to a list.
fn warn_unknown_repos(hr_issues: &[HorizontalIssue], tracked: &[String], log: &RunLog) {
    let known: HashSet<&str> = tracked.iter().map(String::as_str).collect();
    let mut warned: HashSet<String> = HashSet::new();
    for hr in hr_issues {
        for spec in &hr.spec_issues {
            if !known.contains(spec.repo.as_str()) && warned.insert(spec.repo.clone()) {
                log.warn(format!(
                    "{} tracks an unknown repository: {}",
                    hr.category, spec.repo
                ));
            }
        }
    }
}

/// Check one specification issue: apply body-requested horizontal labels,
/// then create tracker issues for categories that lack one.
async fn check_spec_issue(
    issue: &Issue,
    official: &HorizontalLabels,
    hr_issues: &[HorizontalIssue],
    shortnames: &ShortnameMap,
    arena: &RepoArena,
    log: &RunLog,
    stats: &mut PassStats,
) {
    let body = issue.body.clone().unwrap_or_default();

    let mut found: Vec<&HorizontalLabel> = official
        .labels()
        .iter()
        .filter(|l| issue.has_label(&l.name))
        .collect();

    // body markers may request labels the issue doesn't carry yet
    let mut needed: Vec<&HorizontalLabel> = Vec::new();
    for request in requested_labels(&body, official) {
        if found.iter().any(|f| f.name == request.name)
            || needed.iter().any(|n| n.name == request.name)
        {
            continue;
        }
        if request.subcategory == Subcategory::Tracker {
            let escalated = format!("{}-needs-resolution", request.category);
            if found.iter().any(|f| f.name == escalated) {
                continue; // already tracked at the stronger severity
            }
        }
        needed.push(request);
    }
    if !needed.is_empty() {
        let names: Vec<String> = needed.iter().map(|l| l.name.clone()).collect();
        log.issue_log(
            &issue.html_url,
            format!("setting {} label(s): {}", names.len(), names.join(",")),
        );
        if let Some(repo_name) = links::repo_of(&issue.html_url) {
            match arena
                .repo(&repo_name)
                .add_issue_labels(issue.number, &names)
                .await
            {
                Ok(added) => stats.labels_added += added.len() as u64,
                Err(err) => {
                    log.issue_error(&issue.html_url, format!("could not add {names:?}: {err}"));
                }
            }
        }
        found.extend(needed);
    }

    if found.is_empty() {
        return;
    }

    // one tracker issue per category; needs-resolution beats tracker when a
    // spec issue carries both labels of one category
    let tracking = find_tracking(&issue.html_url, hr_issues);
    let mut create: Vec<&HorizontalLabel> = Vec::new();
    for hlabel in found {
        if tracking.iter().any(|hr| hr.repo == hlabel.repo) {
            continue; // already tracked
        }
        if let Some(existing) = create.iter_mut().find(|c| c.category == hlabel.category) {
            if hlabel.subcategory == Subcategory::NeedsResolution {
                *existing = hlabel;
            }
            continue;
        }
        create.push(hlabel);
    }
    if create.is_empty() {
        return;
    }

    match skip_reason(issue) {
        Some(SkipReason::ExcludedRepo) => return,
        Some(SkipReason::PreCutoff) => {
            stats.pre_cutoff_skips += 1;
            return;
        }
        None => {}
    }

    let (new_issues, notes) = synthesize::synthesize(issue, &create, shortnames);
    for note in notes {
        log.error(note);
    }

    for new_issue in new_issues {
        let handle = arena.repo(&new_issue.repo);
        log.issue_log(
            &issue.html_url,
            format!(
                "creating a new horizontal issue {} {} {}",
                new_issue.repo,
                new_issue.title,
                new_issue.labels.join(",")
            ),
        );

        // creation fails on labels unknown to the destination repository
        for name in &new_issue.shortname_labels {
            let label = Label {
                name: name.clone(),
                color: SHORTNAME_LABEL_COLOR.to_string(),
                description: Some("missing link".to_string()),
            };
            match handle.ensure_label(&label).await {
                Ok(true) => log.log(format!(
                    "{} got the new label {name}. Update the link?",
                    new_issue.repo
                )),
                Ok(false) => {}
                Err(err) => log.warn(format!(
                    "{} failed to create the new label {name}: {err}",
                    new_issue.repo
                )),
            }
        }

        match handle
            .create_issue(&new_issue.title, &new_issue.body, &new_issue.labels)
            .await
        {
            Ok(created) => {
                stats.issues_created += 1;
                log.issue_log(
                    &created.html_url,
                    format!("is a new horizontal issue for {}", issue.html_url),
                );
            }
            Err(err) => {
                log.issue_error(
                    &issue.html_url,
                    format!(
                        "something went wrong when creating a new issue in {}: {err}",
                        new_issue.repo
                    ),
                );
            }
        }
    }
}
