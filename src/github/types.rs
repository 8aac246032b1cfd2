//! GitHub data model.
//!
//! Serde models matching the REST wire shape, plus the handful of helpers the
//! reconciliation engine needs. Issues are identified by (repository full
//! name, number); labels are unique by name within a repository.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking a shortname label (`s:css-grid`, `s:fetch`, ...).
pub const SHORTNAME_PREFIX: &str = "s:";

/// A repository label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name, unique within its repository.
    pub name: String,
    /// Six-digit hex color, no leading `#`.
    #[serde(default)]
    pub color: String,
    /// Free-text description, often an href to a spec clause or request link.
    #[serde(default)]
    pub description: Option<String>,
}

impl Label {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: String::new(),
            description: None,
        }
    }

    /// Whether this is a shortname label.
    pub fn is_shortname(&self) -> bool {
        self.name.starts_with(SHORTNAME_PREFIX)
    }
}

/// Issue state on GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// The issue is open.
    Open,
    /// The issue is closed.
    Closed,
}

/// An issue or pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number within its repository.
    pub number: u64,
    /// Canonical URL; also how cross-repository links identify the issue.
    pub html_url: String,
    /// Issue title.
    pub title: String,
    /// First comment, free text. May be absent.
    #[serde(default)]
    pub body: Option<String>,
    /// Open or closed.
    pub state: IssueState,
    /// Labels currently on the issue.
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Issue {
    /// Whether the issue is open.
    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }

    /// Whether the issue carries a label with exactly this name.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }

    /// Names of all shortname labels on the issue.
    pub fn shortname_labels(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|l| l.is_shortname())
            .map(|l| l.name.as_str())
            .collect()
    }

    /// Year the issue was created.
    pub fn created_year(&self) -> i32 {
        self.created_at.year()
    }

    /// Add labels to the in-memory copy, skipping ones already present.
    /// Returns the names actually added.
    pub fn add_labels_local(&mut self, names: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for name in names {
            if !self.has_label(name) {
                self.labels.push(Label::new(name.clone()));
                added.push(name.clone());
            }
        }
        added
    }

    /// Remove a label from the in-memory copy. Returns whether it was there.
    pub fn remove_label_local(&mut self, name: &str) -> bool {
        let before = self.labels.len();
        self.labels.retain(|l| l.name != name);
        self.labels.len() != before
    }
}

/// `w3c.json` repository metadata, normalized so `group` is always a list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct W3cConfig {
    /// Owning working group id(s).
    #[serde(default, deserialize_with = "one_or_many")]
    pub group: Vec<u64>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(u64),
        Many(Vec<u64>),
    }
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(id)) => vec![id],
        Some(OneOrMany::Many(ids)) => ids,
        None => Vec::new(),
    })
}

/// A team attached to a repository.
#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    /// Team name.
    pub name: String,
    /// Effective permission on the repository.
    pub permission: String,
}

/// A file fetched through the contents API.
#[derive(Debug, Clone)]
pub struct FileContent {
    /// Decoded file body.
    pub content: String,
    /// Blob SHA, needed to update the file.
    pub sha: String,
}
