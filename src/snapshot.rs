//! Shortname snapshot.
//!
//! The label-synchronization utility publishes a JSON document mapping each
//! shortname to the canonical specification title and editor's draft link.
//! Shortname labels are collected across the horizontal repositories, their
//! descriptions reconciled (labels learn from their sister repositories),
//! and the shortname series matched against the W3C API specification list
//! plus a small WHATWG set. The result lands in `docs/shortnames.json`
//! through the contents API.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TrackerError};
use crate::github::types::Label;
use crate::github::GithubApi;
use crate::monitor::RunLog;
use crate::reconcile::synthesize::SHORTNAME_LABEL_COLOR;

/// Repository and path the snapshot is published to.
pub const SNAPSHOT_REPO: &str = "w3c/horizontal-tracker";
/// Path within [`SNAPSHOT_REPO`].
pub const SNAPSHOT_PATH: &str = "docs/shortnames.json";

/// W3C API root.
pub const W3C_API_URL: &str = "https://api.w3.org/";

/// Title decorations stripped while computing a series title.
const POSTFIXES: [&str; 11] = [
    ".", ":", "Level", "0", "1", "2", "3", "Revision", "Version", "Module", "-",
];

/// WHATWG standards matched by name rather than through the W3C API.
const WHATWG_SPECS: [&str; 4] = ["HTML", "DOM", "Storage", "Fetch"];

/// One published snapshot entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    /// Canonical specification title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Editor's draft link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// A deduplicated shortname label with its source repository.
#[derive(Debug, Clone)]
pub struct ShortnameRecord {
    /// Label name, `s:` prefix included.
    pub name: String,
    /// Reconciled description (an href when set properly).
    pub description: Option<String>,
    /// Repository the canonical copy came from.
    pub repo: String,
}

/// A label whose description should be backfilled upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFix {
    /// Repository carrying the label.
    pub repo: String,
    /// The corrected label.
    pub label: Label,
}

fn empty(description: &Option<String>) -> bool {
    description.as_deref().unwrap_or("").is_empty()
}

/// Deduplicate shortname labels across repositories, reconciling their
/// descriptions. Labels learn from each other: a missing description is
/// taken from a sister repository; a conflicting one is reported and left
/// alone.
pub fn reconcile_labels(labels: Vec<(String, Label)>, log: &RunLog) -> Vec<ShortnameRecord> {
    let mut map: BTreeMap<String, ShortnameRecord> = BTreeMap::new();
    for (repo, label) in labels {
        match map.get_mut(&label.name) {
            None => {
                if label.color != SHORTNAME_LABEL_COLOR {
                    log.warn(format!("{repo} : wrong color for {}", label.name));
                }
                map.insert(
                    label.name.clone(),
                    ShortnameRecord {
                        name: label.name,
                        description: label.description,
                        repo,
                    },
                );
            }
            Some(known) => {
                if empty(&known.description) {
                    if empty(&label.description) {
                        log.error(format!(
                            "{}#{} and {repo}#{} needs a label description",
                            known.repo, known.name, label.name
                        ));
                    } else {
                        log.warn(format!(
                            "{} : {} needs {}",
                            known.repo,
                            label.name,
                            label.description.clone().unwrap_or_default()
                        ));
                        known.description = label.description;
                    }
                } else if empty(&label.description) {
                    log.warn(format!(
                        "{repo} : {} needs {}",
                        label.name,
                        known.description.clone().unwrap_or_default()
                    ));
                } else if label.description != known.description {
                    log.error(format!(
                        "{} : [{} {}] != [{repo} {}]",
                        label.name,
                        known.repo,
                        known.description.clone().unwrap_or_default(),
                        label.description.clone().unwrap_or_default()
                    ));
                } else if label.color != SHORTNAME_LABEL_COLOR {
                    log.warn(format!("{repo} : wrong color for {}", label.name));
                }
            }
        }
    }
    map.into_values().collect()
}

/// Longest common prefix of the given strings.
pub fn common_prefix(strings: &[String]) -> String {
    let Some(first) = strings.first() else {
        return String::new();
    };
    let mut end = first.len();
    for s in &strings[1..] {
        end = first
            .chars()
            .zip(s.chars())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.len_utf8())
            .sum::<usize>()
            .min(end);
    }
    first[..end].to_string()
}

/// Series title from the individual level titles: common prefix, then level
/// decorations stripped.
pub fn clean_title(titles: &[String]) -> String {
    let mut title = common_prefix(titles).trim().to_string();
    loop {
        let mut stripped = false;
        for postfix in POSTFIXES {
            if let Some(rest) = title.strip_suffix(postfix) {
                title = rest.trim_end().to_string();
                stripped = true;
            }
        }
        if !stripped {
            break;
        }
    }
    title
}

fn series_of(spec: &Value) -> Option<String> {
    let href = spec["_links"]["series"]["href"].as_str()?;
    let serie = href.split("specification-series/").nth(1)?;
    Some(serie.to_lowercase())
}

fn collect_entry(specs: Vec<&Value>) -> Option<SnapshotEntry> {
    let mut titles: Vec<String> = Vec::new();
    let mut links: Vec<String> = Vec::new();
    for spec in specs {
        if let Some(title) = spec["title"].as_str() {
            if !titles.iter().any(|t| t == title) {
                titles.push(title.to_string());
            }
        }
        if let Some(link) = spec["editor-draft"].as_str() {
            if !links.iter().any(|l| l == link) {
                links.push(link.to_string());
            }
        }
    }
    if titles.is_empty() {
        return None;
    }
    let title = clean_title(&titles);
    if title.is_empty() {
        return None;
    }
    Some(SnapshotEntry {
        title: Some(title),
        link: links.into_iter().next(),
    })
}

/// Match a shortname series against the specification list.
pub fn find_spec_by_serie(specs: &[Value], serie: &str) -> Option<SnapshotEntry> {
    let serie = serie.to_lowercase();
    for whatwg in WHATWG_SPECS {
        if whatwg.to_lowercase() == serie {
            return Some(SnapshotEntry {
                title: Some(whatwg.to_string()),
                link: Some(format!("https://{}.spec.whatwg.org/", whatwg.to_lowercase())),
            });
        }
    }
    let matched: Vec<&Value> = specs
        .iter()
        .filter(|spec| series_of(spec).as_deref() == Some(serie.as_str()))
        .collect();
    collect_entry(matched)
}

/// Match an editor's draft link against the specification list. CSS-family
/// draft links are widened to match any level of the same series.
pub fn find_spec_by_link(specs: &[Value], link: &str) -> Option<SnapshotEntry> {
    let mut pattern = link.to_string();
    for family in [
        "https://drafts.csswg.org/",
        "https://drafts.css-houdini.org/",
        "https://drafts.fxtf.org/",
    ] {
        if pattern.starts_with(family) && pattern.ends_with('/') {
            pattern = format!("{}(-[0-9]+)?/", &pattern[..pattern.len() - 1]);
            break;
        }
    }
    let re = Regex::new(&pattern).ok()?;
    let matched: Vec<&Value> = specs
        .iter()
        .filter(|spec| {
            spec["editor-draft"]
                .as_str()
                .is_some_and(|draft| re.is_match(draft))
        })
        .collect();
    if link == "https://html.spec.whatwg.org/multipage/" {
        return Some(SnapshotEntry {
            title: Some("HTML".to_string()),
            link: Some(link.to_string()),
        });
    }
    collect_entry(matched)
}

/// Build the snapshot map plus the upstream label description fixes.
pub fn build_snapshot(
    records: &[ShortnameRecord],
    specs: &[Value],
    log: &RunLog,
) -> (BTreeMap<String, SnapshotEntry>, Vec<LabelFix>) {
    let mut snapshot: BTreeMap<String, SnapshotEntry> = BTreeMap::new();
    let mut fixes: Vec<LabelFix> = Vec::new();

    for record in records {
        let serie = record.name.trim_start_matches("s:").to_string();
        let mut entry = SnapshotEntry {
            title: None,
            link: record.description.clone().filter(|d| !d.is_empty()),
        };

        let mut spec = find_spec_by_serie(specs, &serie);
        match &spec {
            Some(found) => {
                if let (Some(draft), true) = (&found.link, empty(&record.description)) {
                    entry.link = Some(draft.clone());
                    fixes.push(LabelFix {
                        repo: record.repo.clone(),
                        label: Label {
                            name: record.name.clone(),
                            color: SHORTNAME_LABEL_COLOR.to_string(),
                            description: Some(draft.clone()),
                        },
                    });
                }
            }
            None => {
                if let Some(link) = &entry.link {
                    spec = find_spec_by_link(specs, link);
                }
            }
        }

        match spec {
            Some(found) => entry.title = found.title,
            None => {
                if empty(&record.description) {
                    log.error(format!("({}) not found", record.name));
                    continue;
                }
            }
        }

        if entry.link.is_none() {
            log.error(format!("discarding entry for {serie} (no editor draft)"));
            continue;
        }
        if entry.title.is_none() {
            log.error(format!(
                "discarding entry for {serie} [{}] (no title)",
                entry.link.clone().unwrap_or_default()
            ));
            continue;
        }
        if snapshot.contains_key(&serie) {
            log.error(format!("duplicate shortname entry for {serie}"));
            continue;
        }
        snapshot.insert(serie, entry);
    }

    (snapshot, fixes)
}

/// Fetch the full specification list from the W3C API, following pagination.
pub async fn fetch_specifications(http: &reqwest::Client, api_key: &str) -> Result<Vec<Value>> {
    let mut url = format!("{W3C_API_URL}specifications?apikey={api_key}&embed=1");
    let mut specs: Vec<Value> = Vec::new();
    loop {
        let page: Value = http
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| TrackerError::Feed {
                url: W3C_API_URL.to_string(),
                reason: e.to_string(),
            })?
            .json()
            .await?;
        if let Some(embedded) = page["_embedded"].as_object() {
            for value in embedded.values() {
                if let Some(list) = value.as_array() {
                    specs.extend(list.iter().cloned());
                }
            }
        }
        let current = page["page"].as_u64().unwrap_or(1);
        let total = page["pages"].as_u64().unwrap_or(1);
        if current >= total {
            break;
        }
        let Some(next) = page["_links"]["next"]["href"].as_str() else {
            break;
        };
        url = if next.starts_with("http") {
            format!("{next}&apikey={api_key}&embed=1")
        } else {
            format!("{W3C_API_URL}{}&apikey={api_key}&embed=1", next.trim_start_matches('/'))
        };
    }
    Ok(specs)
}

/// Publish the snapshot through the contents API.
pub async fn publish(
    api: &Arc<dyn GithubApi>,
    snapshot: &BTreeMap<String, SnapshotEntry>,
    log: &RunLog,
) -> Result<()> {
    let content = serde_json::to_string(snapshot)?;
    let existing = api.get_content(SNAPSHOT_REPO, SNAPSHOT_PATH).await?;
    api.put_content(
        SNAPSHOT_REPO,
        SNAPSHOT_PATH,
        "Shortnames snapshot",
        &content,
        existing.as_ref().map(|f| f.sha.as_str()),
        "main",
    )
    .await?;
    log.log(format!(
        "published {} shortnames to {SNAPSHOT_REPO}/{SNAPSHOT_PATH}",
        snapshot.len()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(title: &str, serie: &str, draft: &str) -> Value {
        json!({
            "title": title,
            "editor-draft": draft,
            "_links": { "series": { "href": format!("https://api.w3.org/specification-series/{serie}") } }
        })
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(
            common_prefix(&["CSS Grid Level 1".into(), "CSS Grid Level 2".into()]),
            "CSS Grid Level "
        );
        assert_eq!(common_prefix(&["only one".into()]), "only one");
        assert_eq!(common_prefix(&[]), "");
    }

    #[test]
    fn test_clean_title_strips_levels() {
        assert_eq!(
            clean_title(&["CSS Grid Layout Module Level 1".into(), "CSS Grid Layout Module Level 2".into()]),
            "CSS Grid Layout"
        );
        assert_eq!(clean_title(&["Pointer Events".into()]), "Pointer Events");
    }

    #[test]
    fn test_find_spec_by_serie() {
        let specs = vec![
            spec("CSS Grid Layout Module Level 1", "css-grid", "https://drafts.csswg.org/css-grid-1/"),
            spec("CSS Grid Layout Module Level 2", "css-grid", "https://drafts.csswg.org/css-grid-2/"),
            spec("Pointer Events", "pointerevents", "https://w3c.github.io/pointerevents/"),
        ];
        let entry = find_spec_by_serie(&specs, "css-grid").expect("match");
        assert_eq!(entry.title.as_deref(), Some("CSS Grid Layout"));
        assert_eq!(entry.link.as_deref(), Some("https://drafts.csswg.org/css-grid-1/"));
        assert!(find_spec_by_serie(&specs, "nope").is_none());
    }

    #[test]
    fn test_find_spec_by_serie_whatwg() {
        let entry = find_spec_by_serie(&[], "fetch").expect("whatwg");
        assert_eq!(entry.link.as_deref(), Some("https://fetch.spec.whatwg.org/"));
    }

    #[test]
    fn test_find_spec_by_link_widens_css_levels() {
        let specs = vec![spec(
            "CSS Fonts Module Level 4",
            "css-fonts",
            "https://drafts.csswg.org/css-fonts-4/",
        )];
        let entry =
            find_spec_by_link(&specs, "https://drafts.csswg.org/css-fonts/").expect("match");
        assert_eq!(entry.title.as_deref(), Some("CSS Fonts Module Level 4"));
    }

    #[test]
    fn test_reconcile_labels_learns_descriptions() {
        let log = RunLog::new();
        let with_desc = Label {
            name: "s:css-grid".into(),
            color: SHORTNAME_LABEL_COLOR.into(),
            description: Some("https://drafts.csswg.org/css-grid/".into()),
        };
        let without = Label {
            name: "s:css-grid".into(),
            color: SHORTNAME_LABEL_COLOR.into(),
            description: None,
        };
        let records = reconcile_labels(
            vec![
                ("w3c/i18n-activity".into(), without),
                ("w3c/privacy-review".into(), with_desc),
            ],
            &log,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].description.as_deref(),
            Some("https://drafts.csswg.org/css-grid/")
        );
    }

    #[test]
    fn test_reconcile_labels_reports_conflicts() {
        let log = RunLog::new();
        let a = Label {
            name: "s:fetch".into(),
            color: SHORTNAME_LABEL_COLOR.into(),
            description: Some("https://fetch.spec.whatwg.org/".into()),
        };
        let b = Label {
            name: "s:fetch".into(),
            color: SHORTNAME_LABEL_COLOR.into(),
            description: Some("https://example.org/other".into()),
        };
        reconcile_labels(vec![("w3c/a".into(), a), ("w3c/b".into(), b)], &log);
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn test_build_snapshot() {
        let log = RunLog::new();
        let specs = vec![spec(
            "CSS Grid Layout Module Level 1",
            "css-grid",
            "https://drafts.csswg.org/css-grid-1/",
        )];
        let records = vec![
            ShortnameRecord {
                name: "s:css-grid".into(),
                description: None,
                repo: "w3c/i18n-activity".into(),
            },
            ShortnameRecord {
                name: "s:unknown".into(),
                description: None,
                repo: "w3c/i18n-activity".into(),
            },
        ];
        let (snapshot, fixes) = build_snapshot(&records, &specs, &log);

        let entry = snapshot.get("css-grid").expect("entry");
        assert_eq!(entry.title.as_deref(), Some("CSS Grid Layout"));
        assert_eq!(entry.link.as_deref(), Some("https://drafts.csswg.org/css-grid-1/"));
        // backfills the label description upstream
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].repo, "w3c/i18n-activity");

        // the unmatched shortname is reported, not guessed
        assert!(!snapshot.contains_key("unknown"));
        assert!(log.error_count() >= 1);
    }
}
