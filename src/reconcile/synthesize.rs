//! Tracker issue synthesis.
//!
//! A specification issue carrying a horizontal category label deserves one
//! tracking issue in that category's horizontal repository. This module
//! decides, purely over the loaded data, which categories are missing their
//! tracking issue and what the new issue must contain; the driver performs
//! the actual creation.

use regex::Regex;
use std::sync::OnceLock;

use crate::feeds::{HorizontalLabel, HorizontalLabels};
use crate::github::types::Issue;
use crate::reconcile::links::{self, MAGIC_CHARACTER};
use crate::reconcile::load::HorizontalIssue;
use crate::reconcile::policy::policy_for;
use crate::reconcile::shortnames::{ShortnameMap, CSS_DRAFTS_REPO};

/// Legacy repositories never back-filled with tracker issues.
pub const EXCLUDED_SPEC_REPOS: [&str; 2] = ["w3c/webex", "w3c/tr-pages"];

/// Closed spec issues created before this year are not worth back-filling.
pub const CUTOFF_YEAR: i32 = 2021;

/// Color given to shortname labels created on the fly.
pub const SHORTNAME_LABEL_COLOR: &str = "6bc5c6";

/// A tracker issue to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrackerIssue {
    /// Destination horizontal repository.
    pub repo: String,
    /// Category being tracked.
    pub category: String,
    /// Issue title (copied from the spec issue).
    pub title: String,
    /// Rendered body, marker link included.
    pub body: String,
    /// Labels for the new issue.
    pub labels: Vec<String>,
    /// Shortname labels among `labels`, to be ensured in the destination
    /// repository before creation.
    pub shortname_labels: Vec<String>,
}

/// Why a spec issue was passed over for creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// One of the excluded legacy repositories.
    ExcludedRepo,
    /// Closed before the back-fill cutoff.
    PreCutoff,
}

/// Check the creation skip rules.
pub fn skip_reason(issue: &Issue) -> Option<SkipReason> {
    let repo = links::repo_of(&issue.html_url).unwrap_or_default();
    if EXCLUDED_SPEC_REPOS.contains(&repo.as_str()) {
        return Some(SkipReason::ExcludedRepo);
    }
    if !issue.is_open() && issue.created_year() < CUTOFF_YEAR {
        return Some(SkipReason::PreCutoff);
    }
    None
}

/// The horizontal issues whose marker links include this spec issue URL.
pub fn find_tracking<'a>(
    spec_url: &str,
    hr_issues: &'a [HorizontalIssue],
) -> Vec<&'a HorizontalIssue> {
    hr_issues
        .iter()
        .filter(|hr| hr.marker_links.iter().any(|l| l.eq_ignore_ascii_case(spec_url)))
        .collect()
}

fn css_bracket_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([a-zA-Z_]+(?:-[a-zA-Z_]+)*)(-[0-9]+)?\]").expect("static regex")
    })
}

/// CSS drafts issues self-classify with bracketed title tags
/// (`[css-grid-2] clarify gap behavior`); derive `s:` labels from them,
/// trailing level numbers stripped. A deliberate, fenced heuristic.
pub fn css_title_shortnames(title: &str) -> Vec<String> {
    css_bracket_regex()
        .captures_iter(title)
        .map(|c| format!("s:{}", &c[1]))
        .collect()
}

fn lreq_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^i18n-([a-zA-Z0-9]+lreq)$").expect("static regex"))
}

fn request_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+([a-z0-9]+)-(tracker|needs-resolution)").expect("static regex"))
}

/// Official labels requested through `+<category>-tracker` /
/// `+<category>-needs-resolution` markers in a spec issue body.
/// `a11y-needs-resolution` is never applied from a body marker.
pub fn requested_labels<'a>(
    body: &str,
    official: &'a HorizontalLabels,
) -> Vec<&'a HorizontalLabel> {
    let body = body.to_lowercase();
    request_regex()
        .captures_iter(&body)
        .filter_map(|c| official.find(&c[0][1..]))
        .filter(|l| l.name != "a11y-needs-resolution")
        .collect()
}

/// Outcome of resolving shortname labels for a new tracker issue.
#[derive(Debug, Clone, Default)]
pub struct ShortnameResolution {
    /// Labels to apply; empty when resolution failed.
    pub labels: Vec<String>,
    /// Errors to put in the run log.
    pub notes: Vec<String>,
}

/// Resolve the shortname labels for a spec issue: single learned shortname,
/// else the CSS title heuristic for the drafts monorepo, else give up loudly.
pub fn resolve_shortnames(issue: &Issue, shortnames: &ShortnameMap) -> ShortnameResolution {
    let mut resolution = ShortnameResolution::default();
    let Some(repo) = links::repo_of(&issue.html_url) else {
        resolution
            .notes
            .push(format!("{} not a repository URL", issue.html_url));
        return resolution;
    };
    match shortnames.shortnames_for(&repo) {
        Some(set) if set.len() == 1 => {
            resolution.labels = set.iter().cloned().collect();
        }
        Some(set) => {
            if repo == CSS_DRAFTS_REPO {
                let derived = css_title_shortnames(&issue.title);
                if !derived.is_empty() {
                    resolution.labels = derived;
                    return resolution;
                }
            }
            let mut names: Vec<&str> = set.iter().map(String::as_str).collect();
            names.sort_unstable();
            resolution.notes.push(format!(
                "{} too many shortname labels: {}",
                issue.html_url,
                names.join(", ")
            ));
        }
        None => {
            if repo == CSS_DRAFTS_REPO {
                let derived = css_title_shortnames(&issue.title);
                if !derived.is_empty() {
                    resolution.labels = derived;
                    return resolution;
                }
            }
            resolution
                .notes
                .push(format!("{} no shortname labels for {repo}", issue.html_url));
        }
    }
    resolution
}

/// The fixed body template, marker link included, plus the category policy
/// suffix.
pub fn compose_body(category: &str, spec_url: &str) -> String {
    let mut body = format!(
        "**This is a tracker issue.** Only discuss things here if they are \
{category} group internal meta-discussions about the issue. \
**Contribute to the actual discussion at the following link:**\
\n\n{MAGIC_CHARACTER} {spec_url}\n"
    );
    if let Some(suffix) = policy_for(category).body_suffix {
        body.push_str(suffix);
    }
    body
}

/// Build the tracker issues to create for the given missing categories.
/// Returns the issues plus log notes gathered along the way.
pub fn synthesize(
    issue: &Issue,
    missing: &[&HorizontalLabel],
    shortnames: &ShortnameMap,
) -> (Vec<NewTrackerIssue>, Vec<String>) {
    let resolution = resolve_shortnames(issue, shortnames);
    let mut created = Vec::new();

    for hlabel in missing {
        let mut labels = vec![hlabel.subcategory.as_str().to_string(), "pending".to_string()];

        if policy_for(&hlabel.category).propagate_lreq {
            let mut found = false;
            for ilabel in &issue.labels {
                if let Some(captures) = lreq_regex().captures(&ilabel.name) {
                    labels.push(captures[1].to_string());
                    found = true;
                }
            }
            if found {
                labels.push("spec-type-issue".to_string());
            }
        }

        labels.extend(resolution.labels.iter().cloned());

        created.push(NewTrackerIssue {
            repo: hlabel.repo.clone(),
            category: hlabel.category.clone(),
            title: issue.title.clone(),
            body: compose_body(&hlabel.category, &issue.html_url),
            labels,
            shortname_labels: resolution.labels.clone(),
        });
    }

    (created, resolution.notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::Subcategory;
    use crate::github::testing::make_issue;
    use crate::github::IssueState;
    use chrono::{TimeZone, Utc};

    fn official(name: &str, repo: &str) -> HorizontalLabel {
        let (category, rest) = name.split_once('-').expect("category");
        HorizontalLabel {
            name: name.to_string(),
            category: category.to_string(),
            subcategory: Subcategory::parse(rest).expect("subcategory"),
            color: "F9C9FF".to_string(),
            description: None,
            exclude_groups: vec![],
            oldname: None,
            repo: repo.to_string(),
        }
    }

    #[test]
    fn test_css_bracket_heuristic() {
        assert_eq!(
            css_title_shortnames("[css-grid-2] clarify gap behavior"),
            vec!["s:css-grid"]
        );
        assert_eq!(
            css_title_shortnames("[css-fonts-4] [css-values] two specs"),
            vec!["s:css-fonts", "s:css-values"]
        );
        assert!(css_title_shortnames("no brackets here").is_empty());
        assert!(css_title_shortnames("[2022] not a tag").is_empty());
    }

    #[test]
    fn test_skip_rules() {
        let excluded = make_issue("w3c/webex", 1, "t", &[]);
        assert_eq!(skip_reason(&excluded), Some(SkipReason::ExcludedRepo));

        let mut old = make_issue("w3c/foo", 2, "t", &[]);
        old.state = IssueState::Closed;
        old.created_at = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).single().expect("ts");
        assert_eq!(skip_reason(&old), Some(SkipReason::PreCutoff));

        // open issues are back-filled no matter how old
        let mut open_old = old.clone();
        open_old.state = IssueState::Open;
        assert_eq!(skip_reason(&open_old), None);

        let recent = make_issue("w3c/foo", 3, "t", &[]);
        assert_eq!(skip_reason(&recent), None);
    }

    #[test]
    fn test_requested_labels_from_body() {
        let labels = HorizontalLabels::from_labels(vec![
            official("i18n-tracker", "w3c/i18n-activity"),
            official("a11y-needs-resolution", "w3c/a11y-request"),
            official("privacy-needs-resolution", "w3c/privacy-review"),
        ]);
        let body = "Please review. +i18n-tracker +a11y-needs-resolution +privacy-needs-resolution";
        let requested = requested_labels(body, &labels);
        let names: Vec<&str> = requested.iter().map(|l| l.name.as_str()).collect();
        // a11y-needs-resolution never comes from a body marker
        assert_eq!(names, vec!["i18n-tracker", "privacy-needs-resolution"]);
    }

    #[test]
    fn test_synthesize_basic_tracker() {
        let mut shortnames = ShortnameMap::new();
        shortnames.record("w3c/foo", "s:foo-spec");
        let issue = make_issue("w3c/foo", 5, "clarify behavior", &["i18n-tracker"]);
        let missing = [&official("i18n-tracker", "w3c/i18n-activity")];

        let (created, notes) = synthesize(&issue, &missing, &shortnames);
        assert!(notes.is_empty());
        assert_eq!(created.len(), 1);
        let new_issue = &created[0];
        assert_eq!(new_issue.repo, "w3c/i18n-activity");
        assert_eq!(new_issue.title, "clarify behavior");
        assert!(new_issue.body.contains("§ https://github.com/w3c/foo/issues/5"));
        assert!(new_issue.body.contains("Instructions:"));
        assert!(new_issue.labels.starts_with(&["tracker".to_string(), "pending".to_string()]));
        assert!(new_issue.labels.contains(&"s:foo-spec".to_string()));
    }

    #[test]
    fn test_synthesize_non_i18n_has_no_instructions() {
        let issue = make_issue("w3c/foo", 5, "t", &["privacy-tracker"]);
        let missing = [&official("privacy-tracker", "w3c/privacy-review")];
        let (created, _) = synthesize(&issue, &missing, &ShortnameMap::new());
        assert!(!created[0].body.contains("Instructions:"));
    }

    #[test]
    fn test_synthesize_propagates_lreq() {
        let issue = make_issue(
            "w3c/foo",
            5,
            "t",
            &["i18n-tracker", "i18n-alreq", "i18n-clreq", "i18n-other"],
        );
        let missing = [&official("i18n-tracker", "w3c/i18n-activity")];
        let (created, _) = synthesize(&issue, &missing, &ShortnameMap::new());
        let labels = &created[0].labels;
        assert!(labels.contains(&"alreq".to_string()));
        assert!(labels.contains(&"clreq".to_string()));
        assert!(labels.contains(&"spec-type-issue".to_string()));
        assert!(!labels.iter().any(|l| l == "other"));
    }

    #[test]
    fn test_synthesize_css_uses_title_tags() {
        let mut shortnames = ShortnameMap::new();
        shortnames.record(CSS_DRAFTS_REPO, "s:css-grid");
        shortnames.record(CSS_DRAFTS_REPO, "s:css-fonts");
        let issue = make_issue(CSS_DRAFTS_REPO, 5, "[css-grid-2] clarify gap behavior", &[]);

        let resolution = resolve_shortnames(&issue, &shortnames);
        assert_eq!(resolution.labels, vec!["s:css-grid"]);
        assert!(resolution.notes.is_empty());
    }

    #[test]
    fn test_ambiguity_outside_css_gives_up_loudly() {
        let mut shortnames = ShortnameMap::new();
        shortnames.record("w3c/foo", "s:one");
        shortnames.record("w3c/foo", "s:two");
        let issue = make_issue("w3c/foo", 5, "t", &[]);

        let resolution = resolve_shortnames(&issue, &shortnames);
        assert!(resolution.labels.is_empty());
        assert!(resolution.notes[0].contains("too many shortname labels"));
    }

    #[test]
    fn test_one_issue_per_missing_category() {
        let issue = make_issue("w3c/foo", 5, "t", &["i18n-tracker", "privacy-tracker"]);
        let i18n = official("i18n-tracker", "w3c/i18n-activity");
        let privacy = official("privacy-tracker", "w3c/privacy-review");
        let missing = vec![&i18n, &privacy];
        let (created, _) = synthesize(&issue, &missing, &ShortnameMap::new());
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].repo, "w3c/i18n-activity");
        assert_eq!(created[1].repo, "w3c/privacy-review");
    }

    #[test]
    fn test_find_tracking_matches_marker_links() {
        let spec_url = "https://github.com/w3c/foo/issues/5";
        let issue = make_issue("w3c/i18n-activity", 1, "t", &["tracker"]);
        let hr = HorizontalIssue {
            repo: "w3c/i18n-activity".to_string(),
            category: "i18n".to_string(),
            issue,
            marker_links: vec![spec_url.to_string()],
            spec_issues: vec![],
            hr_label: Some(Subcategory::Tracker),
        };
        let all = vec![hr];
        assert_eq!(find_tracking(spec_url, &all).len(), 1);
        assert!(find_tracking("https://github.com/w3c/bar/issues/9", &all).is_empty());
    }
}
