//! Shortname evidence.
//!
//! A specification repository's shortname label (`s:fetch`, `s:css-grid`)
//! is never declared anywhere; it is learned by observing horizontal issues
//! that link to exactly one specification repository while carrying `s:`
//! labels. The map is rebuilt from scratch every pass and is deterministic:
//! ordered containers throughout, so iteration order never depends on input
//! order.

use std::collections::{BTreeMap, BTreeSet};

use crate::github::types::Issue;
use crate::reconcile::links;

/// The CSS Working Group drafts monorepo. Many specifications share it, so
/// multiple shortnames are expected rather than an inconsistency.
pub const CSS_DRAFTS_REPO: &str = "w3c/csswg-drafts";

/// Legacy horizontal repository excluded from shortname handling.
pub const SHORTNAME_EXCLUDED_REPO: &str = "w3c/sealreq";

/// Evidence: specification repository name → observed shortname labels.
#[derive(Debug, Clone, Default)]
pub struct ShortnameMap {
    map: BTreeMap<String, BTreeSet<String>>,
}

impl ShortnameMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation.
    pub fn record(&mut self, repo: &str, label: &str) {
        self.map
            .entry(repo.to_lowercase())
            .or_default()
            .insert(label.to_string());
    }

    /// Learn from one horizontal issue. Contributes evidence only when the
    /// issue's marker links name exactly one specification repository.
    pub fn observe(&mut self, issue: &Issue, marker_links: &[String]) {
        let repos: BTreeSet<String> = marker_links
            .iter()
            .filter_map(|url| links::repo_of(url))
            .collect();
        if repos.len() != 1 {
            return; // ambiguous attribution
        }
        let repo = repos.into_iter().next().expect("one element");
        for label in issue.shortname_labels() {
            self.record(&repo, label);
        }
    }

    /// Observed shortnames for a repository.
    pub fn shortnames_for(&self, repo: &str) -> Option<&BTreeSet<String>> {
        self.map.get(&repo.to_lowercase())
    }

    /// The single learned shortname, when the evidence is unambiguous.
    pub fn single(&self, repo: &str) -> Option<&str> {
        let set = self.shortnames_for(repo)?;
        if set.len() == 1 {
            set.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Repositories with conflicting evidence, for the post-load report.
    /// The CSS drafts monorepo and the excluded legacy repository are not
    /// inconsistencies and are skipped.
    pub fn ambiguities(&self) -> Vec<(&str, &BTreeSet<String>)> {
        self.map
            .iter()
            .filter(|(repo, names)| {
                names.len() > 1
                    && repo.as_str() != CSS_DRAFTS_REPO
                    && repo.as_str() != SHORTNAME_EXCLUDED_REPO
            })
            .map(|(repo, names)| (repo.as_str(), names))
            .collect()
    }

    /// Number of repositories with any evidence.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no evidence was collected.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::make_issue;

    fn linked_issue(labels: &[&str], links: &[&str]) -> (Issue, Vec<String>) {
        (
            make_issue("w3c/i18n-activity", 1, "t", labels),
            links.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_learns_from_unique_link() {
        let mut map = ShortnameMap::new();
        let (issue, links) = linked_issue(
            &["s:foo-spec", "tracker"],
            &["https://github.com/w3c/foo/issues/5"],
        );
        map.observe(&issue, &links);
        let learned = map.shortnames_for("w3c/foo").expect("evidence");
        assert_eq!(learned.iter().collect::<Vec<_>>(), vec!["s:foo-spec"]);
        assert_eq!(map.single("w3c/foo"), Some("s:foo-spec"));
    }

    #[test]
    fn test_two_links_same_repo_still_learn() {
        let mut map = ShortnameMap::new();
        let (issue, links) = linked_issue(
            &["s:foo-spec"],
            &[
                "https://github.com/w3c/foo/issues/5",
                "https://github.com/w3c/foo/issues/6",
            ],
        );
        map.observe(&issue, &links);
        assert_eq!(map.single("w3c/foo"), Some("s:foo-spec"));
    }

    #[test]
    fn test_multi_repo_links_contribute_nothing() {
        let mut map = ShortnameMap::new();
        let (issue, links) = linked_issue(
            &["s:foo-spec"],
            &[
                "https://github.com/w3c/foo/issues/5",
                "https://github.com/w3c/bar/issues/6",
            ],
        );
        map.observe(&issue, &links);
        assert!(map.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let (a, links_a) = linked_issue(&["s:one"], &["https://github.com/w3c/foo/issues/1"]);
        let (b, links_b) = linked_issue(&["s:two"], &["https://github.com/w3c/foo/issues/2"]);

        let mut forward = ShortnameMap::new();
        forward.observe(&a, &links_a);
        forward.observe(&b, &links_b);

        let mut backward = ShortnameMap::new();
        backward.observe(&b, &links_b);
        backward.observe(&a, &links_a);

        assert_eq!(
            forward.shortnames_for("w3c/foo"),
            backward.shortnames_for("w3c/foo")
        );
        assert_eq!(forward.single("w3c/foo"), None); // ambiguous either way
    }

    #[test]
    fn test_ambiguities_skip_css_and_excluded() {
        let mut map = ShortnameMap::new();
        map.record("w3c/foo", "s:one");
        map.record("w3c/foo", "s:two");
        map.record(CSS_DRAFTS_REPO, "s:css-grid");
        map.record(CSS_DRAFTS_REPO, "s:css-fonts");
        map.record(SHORTNAME_EXCLUDED_REPO, "s:a");
        map.record(SHORTNAME_EXCLUDED_REPO, "s:b");

        let ambiguous = map.ambiguities();
        assert_eq!(ambiguous.len(), 1);
        assert_eq!(ambiguous[0].0, "w3c/foo");
        assert_eq!(
            ambiguous[0].1.iter().collect::<Vec<_>>(),
            vec!["s:one", "s:two"]
        );
    }

    #[test]
    fn test_evidence_deduplicated() {
        let mut map = ShortnameMap::new();
        map.record("w3c/foo", "s:one");
        map.record("W3C/Foo", "s:one");
        assert_eq!(map.shortnames_for("w3c/foo").expect("set").len(), 1);
    }
}
