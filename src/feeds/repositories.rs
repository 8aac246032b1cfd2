//! Tracked specification repositories.
//!
//! The set of repositories whose issues the tracker reconciles is the
//! de-duplicated union of three sources: the W3C-maintained horizontal-review
//! list, the WHATWG workstream database, and a manually maintained extras
//! list. The extras list degrades gracefully (someone editing it by hand can
//! break it); the other two are required.

use regex::Regex;
use std::sync::Arc;

use crate::error::{Result, TrackerError};
use crate::github::GithubApi;
use crate::monitor::RunLog;

/// W3C-maintained list of repositories under horizontal review.
pub const HR_REPOS_URL: &str = "https://w3c.github.io/validate-repos/hr-repos.json";

/// Manually maintained extras.
pub const EXTRA_REPOS_URL: &str =
    "https://w3c.github.io/horizontal-issue-tracker/extra_repositories.json";

/// Repository holding the WHATWG workstream database.
const WHATWG_SG_REPO: &str = "whatwg/sg";

async fn fetch_name_list(http: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    let names: Vec<String> = http
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| TrackerError::Feed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .json()
        .await?;
    Ok(names.into_iter().map(|n| n.to_lowercase()).collect())
}

/// Derive `whatwg/<name>` repositories from the workstream database.
///
/// Each workstream standard links its living spec at
/// `https://<name>.spec.whatwg.org/`; the repository carries the same name.
pub fn parse_whatwg_db(db: &serde_json::Value) -> Vec<String> {
    let href_re = Regex::new(r"^https://([^.]+)\.spec\.whatwg\.org/").expect("static regex");
    let mut repos = Vec::new();
    let workstreams = db["workstreams"].as_array().cloned().unwrap_or_default();
    for stream in workstreams {
        let standards = stream["standards"].as_array().cloned().unwrap_or_default();
        for standard in standards {
            if let Some(href) = standard["href"].as_str() {
                if let Some(m) = href_re.captures(href).and_then(|c| c.get(1)) {
                    repos.push(format!("whatwg/{}", m.as_str().to_lowercase()));
                }
            }
        }
    }
    repos
}

/// De-duplicated union, preserving first-seen order.
pub fn dedup_union(sources: Vec<Vec<String>>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut union = Vec::new();
    for source in sources {
        for name in source {
            if seen.insert(name.clone()) {
                union.push(name);
            }
        }
    }
    union
}

/// The full tracked-repository union. W3C and WHATWG sources are required;
/// a broken extras list is logged and skipped.
pub async fn tracked(
    http: &reqwest::Client,
    api: &Arc<dyn GithubApi>,
    log: &RunLog,
) -> Result<Vec<String>> {
    let w3c = fetch_name_list(http, HR_REPOS_URL).await?;

    let db_file = api
        .get_content(WHATWG_SG_REPO, "db.json")
        .await?
        .ok_or_else(|| TrackerError::Feed {
            url: format!("{WHATWG_SG_REPO}/db.json"),
            reason: "missing".to_string(),
        })?;
    let whatwg = parse_whatwg_db(&serde_json::from_str(&db_file.content)?);

    let extras = match fetch_name_list(http, EXTRA_REPOS_URL).await {
        Ok(extras) => extras,
        Err(err) => {
            log.error(format!("error while loading extra repositories: {err}"));
            Vec::new()
        }
    };

    Ok(dedup_union(vec![w3c, whatwg, extras]))
}
