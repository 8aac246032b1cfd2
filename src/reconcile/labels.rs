//! Label state machine.
//!
//! For one decorated horizontal issue and its resolved specification issues,
//! decide which labels have to change on either side. Planning is pure: it
//! reads snapshots and the learned shortname map and returns a list of
//! [`LabelAction`]s for the driver to apply. Every add is conditioned on the
//! label being absent and every remove on it being present, so planning over
//! already-consistent state yields nothing.

use crate::feeds::Subcategory;
use crate::reconcile::load::HorizontalIssue;
use crate::reconcile::shortnames::{ShortnameMap, CSS_DRAFTS_REPO, SHORTNAME_EXCLUDED_REPO};

/// Which issue an action touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The horizontal issue itself.
    Horizontal,
    /// The n-th resolved specification issue.
    Spec(usize),
}

/// One corrective step decided by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelAction {
    /// Add labels to an issue.
    Add {
        /// Issue to touch.
        target: Target,
        /// Labels to add.
        labels: Vec<String>,
    },
    /// Remove one label from an issue.
    Remove {
        /// Issue to touch.
        target: Target,
        /// Label to remove.
        label: String,
    },
    /// Something needs human eyes; no mutation.
    Warn {
        /// Message for the run log.
        message: String,
    },
}

/// Plan the corrective actions for one horizontal issue.
pub fn plan(hr: &HorizontalIssue, shortnames: &ShortnameMap) -> Vec<LabelAction> {
    let mut actions = Vec::new();
    let needs_resolution = format!("{}-needs-resolution", hr.category);
    let tracker = format!("{}-tracker", hr.category);

    if hr.spec_issues.is_empty()
        && hr.issue.is_open()
        && hr.hr_label == Some(Subcategory::NeedsResolution)
    {
        actions.push(LabelAction::Warn {
            message: format!(
                "{} doesn't link to a specification issue but has needs-resolution",
                hr.issue.html_url
            ),
        });
    }

    if !hr.spec_issues.is_empty() && hr.hr_label.is_some() && hr.issue.is_open() {
        plan_shortname_repair(hr, shortnames, &mut actions);

        if hr.hr_label == Some(Subcategory::Tracker) {
            for spec in &hr.spec_issues {
                if spec.snapshot.has_label(&needs_resolution) {
                    // escalation stays a human decision
                    actions.push(LabelAction::Warn {
                        message: format!(
                            "{} links to {} and needs to add needs-resolution",
                            hr.issue.html_url, spec.snapshot.html_url
                        ),
                    });
                }
            }
        }

        let mut close_planned = false;
        for (index, spec) in hr.spec_issues.iter().enumerate() {
            if !spec.snapshot.is_open() && !hr.issue.has_label("close?") && !close_planned {
                close_planned = true;
                actions.push(LabelAction::Add {
                    target: Target::Horizontal,
                    labels: vec!["close?".to_string()],
                });
            }

            if hr.hr_label == Some(Subcategory::NeedsResolution) {
                if !spec.snapshot.has_label(&needs_resolution) {
                    actions.push(LabelAction::Add {
                        target: Target::Spec(index),
                        labels: vec![needs_resolution.clone()],
                    });
                }
                if spec.snapshot.has_label(&tracker) {
                    actions.push(LabelAction::Remove {
                        target: Target::Spec(index),
                        label: tracker.clone(),
                    });
                }
            }
        }
    }

    // an issue must never carry both severities
    if hr.hr_label == Some(Subcategory::NeedsResolution) && hr.issue.has_label("tracker") {
        actions.push(LabelAction::Remove {
            target: Target::Horizontal,
            label: "tracker".to_string(),
        });
    }

    actions
}

fn plan_shortname_repair(
    hr: &HorizontalIssue,
    shortnames: &ShortnameMap,
    actions: &mut Vec<LabelAction>,
) {
    if !hr.issue.shortname_labels().is_empty() {
        return;
    }
    let mut planned: Vec<String> = Vec::new();
    for spec in &hr.spec_issues {
        match shortnames.shortnames_for(&spec.repo) {
            Some(set) if set.len() == 1 => {
                let name = set.iter().next().expect("one element");
                if hr.repo != SHORTNAME_EXCLUDED_REPO && !planned.iter().any(|p| p == name) {
                    planned.push(name.clone());
                    actions.push(LabelAction::Add {
                        target: Target::Horizontal,
                        labels: vec![name.clone()],
                    });
                }
            }
            Some(set) => {
                if spec.repo != CSS_DRAFTS_REPO {
                    let mut names: Vec<&str> = set.iter().map(String::as_str).collect();
                    names.sort_unstable();
                    actions.push(LabelAction::Warn {
                        message: format!(
                            "{} multiple shortname matches: {}",
                            hr.issue.html_url,
                            names.join(",")
                        ),
                    });
                }
            }
            None => {
                if hr.issue.has_label("pending") {
                    actions.push(LabelAction::Warn {
                        message: format!("{} no shortname label found", hr.issue.html_url),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::make_issue;
    use crate::github::IssueState;
    use crate::reconcile::load::{severity_of, SpecRef};

    fn spec_ref(repo: &str, number: u64, labels: &[&str], open: bool) -> SpecRef {
        let mut snapshot = make_issue(repo, number, "spec issue", labels);
        if !open {
            snapshot.state = IssueState::Closed;
        }
        SpecRef {
            repo: repo.to_string(),
            url: snapshot.html_url.clone(),
            snapshot,
        }
    }

    fn hr_issue(labels: &[&str], specs: Vec<SpecRef>) -> HorizontalIssue {
        let issue = make_issue("w3c/i18n-activity", 1, "hr issue", labels);
        HorizontalIssue {
            repo: "w3c/i18n-activity".to_string(),
            category: "i18n".to_string(),
            marker_links: specs.iter().map(|s| s.url.clone()).collect(),
            spec_issues: specs,
            hr_label: severity_of(&issue),
            issue,
        }
    }

    /// Apply planned actions to the in-memory snapshots, the way the driver
    /// would against the remote.
    fn apply_locally(hr: &mut HorizontalIssue, actions: &[LabelAction]) {
        for action in actions {
            match action {
                LabelAction::Add { target, labels } => match target {
                    Target::Horizontal => {
                        hr.issue.add_labels_local(labels);
                    }
                    Target::Spec(i) => {
                        hr.spec_issues[*i].snapshot.add_labels_local(labels);
                    }
                },
                LabelAction::Remove { target, label } => match target {
                    Target::Horizontal => {
                        hr.issue.remove_label_local(label);
                    }
                    Target::Spec(i) => {
                        hr.spec_issues[*i].snapshot.remove_label_local(label);
                    }
                },
                LabelAction::Warn { .. } => {}
            }
        }
    }

    fn mutating(actions: &[LabelAction]) -> usize {
        actions
            .iter()
            .filter(|a| !matches!(a, LabelAction::Warn { .. }))
            .count()
    }

    #[test]
    fn test_needs_resolution_mirrored_to_spec() {
        let hr = hr_issue(
            &["needs-resolution", "s:foo"],
            vec![spec_ref("w3c/foo", 5, &["i18n-tracker"], true)],
        );
        let actions = plan(&hr, &ShortnameMap::new());

        assert!(actions.contains(&LabelAction::Add {
            target: Target::Spec(0),
            labels: vec!["i18n-needs-resolution".to_string()],
        }));
        assert!(actions.contains(&LabelAction::Remove {
            target: Target::Spec(0),
            label: "i18n-tracker".to_string(),
        }));
    }

    #[test]
    fn test_both_severities_drops_tracker() {
        let hr = hr_issue(
            &["needs-resolution", "tracker", "s:foo"],
            vec![spec_ref("w3c/foo", 5, &["i18n-needs-resolution"], true)],
        );
        let actions = plan(&hr, &ShortnameMap::new());
        assert!(actions.contains(&LabelAction::Remove {
            target: Target::Horizontal,
            label: "tracker".to_string(),
        }));
    }

    #[test]
    fn test_closed_spec_issue_adds_close_once() {
        let hr = hr_issue(
            &["tracker", "s:foo"],
            vec![
                spec_ref("w3c/foo", 5, &[], false),
                spec_ref("w3c/foo", 6, &[], false),
            ],
        );
        let actions = plan(&hr, &ShortnameMap::new());
        let close_adds = actions
            .iter()
            .filter(|a| {
                matches!(a, LabelAction::Add { target: Target::Horizontal, labels }
                    if labels == &vec!["close?".to_string()])
            })
            .count();
        assert_eq!(close_adds, 1);
    }

    #[test]
    fn test_tracker_with_escalated_spec_warns_only() {
        let hr = hr_issue(
            &["tracker", "s:foo"],
            vec![spec_ref("w3c/foo", 5, &["i18n-needs-resolution"], true)],
        );
        let actions = plan(&hr, &ShortnameMap::new());
        assert_eq!(mutating(&actions), 0);
        assert!(actions.iter().any(|a| matches!(a, LabelAction::Warn { message }
            if message.contains("needs to add needs-resolution"))));
    }

    #[test]
    fn test_shortname_repair_single_evidence() {
        let mut shortnames = ShortnameMap::new();
        shortnames.record("w3c/foo", "s:foo-spec");
        let hr = hr_issue(&["tracker"], vec![spec_ref("w3c/foo", 5, &[], true)]);
        let actions = plan(&hr, &shortnames);
        assert!(actions.contains(&LabelAction::Add {
            target: Target::Horizontal,
            labels: vec!["s:foo-spec".to_string()],
        }));
    }

    #[test]
    fn test_shortname_ambiguity_warns_except_css() {
        let mut shortnames = ShortnameMap::new();
        shortnames.record("w3c/foo", "s:one");
        shortnames.record("w3c/foo", "s:two");
        shortnames.record(CSS_DRAFTS_REPO, "s:css-grid");
        shortnames.record(CSS_DRAFTS_REPO, "s:css-fonts");

        let hr = hr_issue(&["tracker"], vec![spec_ref("w3c/foo", 5, &[], true)]);
        let actions = plan(&hr, &shortnames);
        assert_eq!(mutating(&actions), 0);
        assert!(actions.iter().any(|a| matches!(a, LabelAction::Warn { message }
            if message.contains("multiple shortname matches: s:one,s:two"))));

        let hr = hr_issue(
            &["tracker"],
            vec![spec_ref(CSS_DRAFTS_REPO, 5, &[], true)],
        );
        assert!(plan(&hr, &shortnames).is_empty());
    }

    #[test]
    fn test_excluded_repo_gets_no_shortname() {
        let mut shortnames = ShortnameMap::new();
        shortnames.record("w3c/foo", "s:foo-spec");
        let mut hr = hr_issue(&["tracker"], vec![spec_ref("w3c/foo", 5, &[], true)]);
        hr.repo = SHORTNAME_EXCLUDED_REPO.to_string();
        assert_eq!(mutating(&plan(&hr, &shortnames)), 0);
    }

    #[test]
    fn test_unlinked_needs_resolution_warns() {
        let hr = hr_issue(&["needs-resolution"], vec![]);
        let actions = plan(&hr, &ShortnameMap::new());
        assert_eq!(mutating(&actions), 0);
        assert!(actions.iter().any(|a| matches!(a, LabelAction::Warn { message }
            if message.contains("doesn't link to a specification issue"))));
    }

    #[test]
    fn test_closed_horizontal_issue_untouched_except_severity_repair() {
        let mut hr = hr_issue(
            &["needs-resolution", "tracker"],
            vec![spec_ref("w3c/foo", 5, &[], false)],
        );
        hr.issue.state = IssueState::Closed;
        let actions = plan(&hr, &ShortnameMap::new());
        // no close?/mirroring on closed horizontal issues, but the two
        // severities still get repaired
        assert_eq!(actions.len(), 1);
        assert!(actions.contains(&LabelAction::Remove {
            target: Target::Horizontal,
            label: "tracker".to_string(),
        }));
    }

    #[test]
    fn test_idempotent_after_apply() {
        let mut shortnames = ShortnameMap::new();
        shortnames.record("w3c/foo", "s:foo-spec");
        let mut hr = hr_issue(
            &["needs-resolution", "tracker"],
            vec![spec_ref("w3c/foo", 5, &["i18n-tracker"], false)],
        );

        let first = plan(&hr, &shortnames);
        assert!(mutating(&first) > 0);
        apply_locally(&mut hr, &first);

        let second = plan(&hr, &shortnames);
        assert_eq!(mutating(&second), 0, "second pass must be a no-op: {second:?}");
    }
}
