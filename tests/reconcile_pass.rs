//! Integration tests for a full reconciliation pass.
//!
//! These drive `run_pass` end to end against the in-memory GitHub fake:
//! horizontal issues load and learn shortnames, label repairs land on both
//! sides, missing tracker issues are created exactly once, and a second
//! pass over the result is a no-op.

use std::sync::Arc;

use horizontal_tracker::error::TrackerError;
use horizontal_tracker::feeds::{HorizontalLabel, HorizontalLabels, Subcategory};
use horizontal_tracker::github::testing::{make_issue, FakeGithub};
use horizontal_tracker::github::{GithubApi, Issue};
use horizontal_tracker::monitor::RunLog;
use horizontal_tracker::reconcile::{run_pass, PassOptions};

const HR_REPO: &str = "w3c/i18n-activity";
const SPEC_REPO: &str = "w3c/foo";

fn official_labels() -> HorizontalLabels {
    let label = |name: &str| {
        let (category, rest) = name.split_once('-').expect("category");
        HorizontalLabel {
            name: name.to_string(),
            category: category.to_string(),
            subcategory: Subcategory::parse(rest).expect("subcategory"),
            color: "F9C9FF".to_string(),
            description: None,
            exclude_groups: vec![],
            oldname: None,
            repo: HR_REPO.to_string(),
        }
    };
    HorizontalLabels::from_labels(vec![
        label("i18n-tracker"),
        label("i18n-needs-resolution"),
    ])
}

fn with_body(mut issue: Issue, body: &str) -> Issue {
    issue.body = Some(body.to_string());
    issue
}

/// One horizontal issue escalated to needs-resolution, linked to spec issue
/// 5 which still carries the weaker marker; spec issue 6 wants i18n tracking
/// but has no tracker issue yet.
fn seed(fake: &FakeGithub) {
    fake.seed_issues(
        HR_REPO,
        vec![with_body(
            make_issue(HR_REPO, 1, "tracker for foo 5", &["needs-resolution", "s:foo-spec"]),
            "§ https://github.com/w3c/foo/issues/5\n",
        )],
    );
    fake.seed_issues(
        SPEC_REPO,
        vec![
            make_issue(SPEC_REPO, 5, "spec issue five", &["i18n-tracker"]),
            make_issue(SPEC_REPO, 6, "spec issue six", &["i18n-tracker"]),
        ],
    );
    fake.seed_labels(HR_REPO, vec![]);
}

async fn pass(fake: &Arc<FakeGithub>, tracked: &[String]) -> horizontal_tracker::Result<()> {
    let api: Arc<dyn GithubApi> = fake.clone();
    let log = RunLog::new();
    run_pass(
        api,
        &official_labels(),
        tracked,
        &PassOptions::default(),
        &log,
    )
    .await
    .map(|_| ())
}

#[tokio::test]
async fn test_full_pass_repairs_and_creates() {
    let fake = Arc::new(FakeGithub::new());
    seed(&fake);

    pass(&fake, &[SPEC_REPO.to_string()]).await.expect("pass");

    // needs-resolution mirrored onto spec issue 5, stale tracker removed
    let spec_issues = fake.issues_of(SPEC_REPO);
    let five = spec_issues.iter().find(|i| i.number == 5).expect("issue 5");
    assert!(five.has_label("i18n-needs-resolution"));
    assert!(!five.has_label("i18n-tracker"));

    // spec issue 6 got exactly one new tracker issue, in the i18n repository
    let hr_issues = fake.issues_of(HR_REPO);
    let created: Vec<&Issue> = hr_issues
        .iter()
        .filter(|i| {
            i.body
                .as_deref()
                .is_some_and(|b| b.contains("https://github.com/w3c/foo/issues/6"))
        })
        .collect();
    assert_eq!(created.len(), 1);
    let new_issue = created[0];
    assert!(new_issue.has_label("tracker"));
    assert!(new_issue.has_label("pending"));
    // learned shortname applied, and the label ensured in the destination
    assert!(new_issue.has_label("s:foo-spec"));
    assert!(new_issue.body.as_deref().expect("body").contains("§ "));
}

#[tokio::test]
async fn test_existing_tracker_issue_suppresses_creation() {
    let fake = Arc::new(FakeGithub::new());
    seed(&fake);

    pass(&fake, &[SPEC_REPO.to_string()]).await.expect("pass");
    let after_first = fake.issues_of(HR_REPO).len();
    let mutations_after_first = fake.mutation_count();

    // the created tracker issue now links to spec issue 6; nothing further
    // to create or repair
    pass(&fake, &[SPEC_REPO.to_string()]).await.expect("second pass");
    assert_eq!(fake.issues_of(HR_REPO).len(), after_first);
    assert_eq!(
        fake.mutation_count(),
        mutations_after_first,
        "second pass must be a no-op, got: {:?}",
        &fake.mutations()[mutations_after_first as usize..]
    );
}

#[tokio::test]
async fn test_unfetchable_horizontal_repo_aborts_pass() {
    let fake = Arc::new(FakeGithub::new());
    seed(&fake);
    fake.fail_issues_for(HR_REPO);

    let outcome = pass(&fake, &[SPEC_REPO.to_string()]).await;
    match outcome {
        Err(TrackerError::HorizontalRepoUnavailable(repo)) => {
            assert!(repo.contains(HR_REPO));
        }
        other => panic!("expected fail-fast, got {other:?}"),
    }
    // fail-fast means nothing was mutated
    assert_eq!(fake.mutation_count(), 0);
}

#[tokio::test]
async fn test_empty_horizontal_repo_aborts_pass() {
    let fake = Arc::new(FakeGithub::new());
    seed(&fake);
    fake.seed_issues(HR_REPO, vec![]);

    let outcome = pass(&fake, &[SPEC_REPO.to_string()]).await;
    assert!(matches!(
        outcome,
        Err(TrackerError::HorizontalRepoUnavailable(_))
    ));
}

#[tokio::test]
async fn test_broken_spec_repo_degrades_gracefully() {
    let fake = Arc::new(FakeGithub::new());
    seed(&fake);
    fake.fail_issues_for("w3c/broken");

    let tracked = vec![SPEC_REPO.to_string(), "w3c/broken".to_string()];
    pass(&fake, &tracked).await.expect("pass survives");

    // the healthy repository still got its tracker issue
    let hr_issues = fake.issues_of(HR_REPO);
    assert!(hr_issues
        .iter()
        .any(|i| i.body.as_deref().is_some_and(|b| b.contains("/issues/6"))));
}

#[tokio::test]
async fn test_pre_cutoff_closed_issues_not_backfilled() {
    let fake = Arc::new(FakeGithub::new());
    seed(&fake);

    let mut ancient = make_issue(SPEC_REPO, 7, "ancient", &["i18n-tracker"]);
    ancient.state = horizontal_tracker::github::IssueState::Closed;
    ancient.created_at = "2019-03-01T00:00:00Z".parse().expect("timestamp");
    let mut spec_issues = fake.issues_of(SPEC_REPO);
    spec_issues.push(ancient);
    fake.seed_issues(SPEC_REPO, spec_issues);

    pass(&fake, &[SPEC_REPO.to_string()]).await.expect("pass");

    let hr_issues = fake.issues_of(HR_REPO);
    assert!(!hr_issues
        .iter()
        .any(|i| i.body.as_deref().is_some_and(|b| b.contains("/issues/7"))));
}
