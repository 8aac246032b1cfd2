//! Official horizontal-label feed.
//!
//! The horizontal groups publish their label conventions as a single JSON
//! document: label name, color, description, owning tracking repository, and
//! which working groups are excluded from carrying it. Label names encode a
//! category and a subcategory (`i18n-tracker`, `privacy-needs-resolution`);
//! the feed is the authority on which labels exist and where tracker issues
//! for each category live.

use serde::Deserialize;

use crate::error::{Result, TrackerError};
use crate::github::types::Label;

/// Published source of the official horizontal labels.
pub const HR_LABELS_URL: &str = "https://w3c.github.io/hr-labels.json";

/// Severity half of a horizontal label name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcategory {
    /// The group is following the discussion.
    Tracker,
    /// The group blocks on a satisfactory resolution.
    NeedsResolution,
}

impl Subcategory {
    /// Parse the part after the category prefix.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tracker" => Some(Subcategory::Tracker),
            "needs-resolution" => Some(Subcategory::NeedsResolution),
            _ => None,
        }
    }

    /// Label-name form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subcategory::Tracker => "tracker",
            Subcategory::NeedsResolution => "needs-resolution",
        }
    }
}

/// Wire form of one feed entry.
#[derive(Debug, Clone, Deserialize)]
struct RawHrLabel {
    name: String,
    repo: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "excludeGroups")]
    exclude_groups: Vec<u64>,
    #[serde(default)]
    oldname: Option<String>,
}

/// One official horizontal category label.
#[derive(Debug, Clone)]
pub struct HorizontalLabel {
    /// Full label name, e.g. `i18n-needs-resolution`.
    pub name: String,
    /// Category half: `a11y`, `i18n`, `privacy`, `security`, `tag`, ...
    pub category: String,
    /// Severity half.
    pub subcategory: Subcategory,
    /// Official color.
    pub color: String,
    /// Official description.
    pub description: Option<String>,
    /// Working group ids that must not carry this label.
    pub exclude_groups: Vec<u64>,
    /// Previous name, when the label was renamed at some point.
    pub oldname: Option<String>,
    /// Tracking repository of the owning horizontal group, lowercased.
    pub repo: String,
}

impl HorizontalLabel {
    /// The plain repository label this official label corresponds to.
    pub fn as_label(&self) -> Label {
        Label {
            name: self.name.clone(),
            color: self.color.clone(),
            description: self.description.clone(),
        }
    }
}

/// A horizontal group's tracking repository, as derived from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HorizontalRepo {
    /// Full name, lowercased.
    pub full_name: String,
    /// Category served by this repository.
    pub category: String,
}

/// The parsed feed.
#[derive(Debug, Clone)]
pub struct HorizontalLabels {
    labels: Vec<HorizontalLabel>,
}

impl HorizontalLabels {
    /// Fetch and parse the published feed.
    pub async fn fetch(http: &reqwest::Client) -> Result<Self> {
        let records: Vec<RawHrLabel> = http
            .get(HR_LABELS_URL)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| TrackerError::Feed {
                url: HR_LABELS_URL.to_string(),
                reason: e.to_string(),
            })?
            .json()
            .await?;
        Self::from_records(records)
    }

    fn from_records(records: Vec<RawHrLabel>) -> Result<Self> {
        let mut labels = Vec::with_capacity(records.len());
        for raw in records {
            let Some((category, rest)) = raw.name.split_once('-') else {
                continue;
            };
            let Some(subcategory) = Subcategory::parse(rest) else {
                continue;
            };
            labels.push(HorizontalLabel {
                category: category.to_string(),
                subcategory,
                name: raw.name,
                color: raw.color,
                description: raw.description,
                exclude_groups: raw.exclude_groups,
                oldname: raw.oldname,
                repo: raw.repo.to_lowercase(),
            });
        }
        if labels.is_empty() {
            return Err(TrackerError::Feed {
                url: HR_LABELS_URL.to_string(),
                reason: "no usable labels".to_string(),
            });
        }
        Ok(Self { labels })
    }

    /// Build directly from already-parsed labels (tests, fixtures).
    pub fn from_labels(labels: Vec<HorizontalLabel>) -> Self {
        Self { labels }
    }

    /// All official labels.
    pub fn labels(&self) -> &[HorizontalLabel] {
        &self.labels
    }

    /// Find one by full name.
    pub fn find(&self, name: &str) -> Option<&HorizontalLabel> {
        self.labels.iter().find(|l| l.name == name)
    }

    /// The horizontal tracking repositories, one per category, in feed order.
    pub fn repositories(&self) -> Vec<HorizontalRepo> {
        let mut repos: Vec<HorizontalRepo> = Vec::new();
        for label in &self.labels {
            if !repos.iter().any(|r| r.full_name == label.repo) {
                repos.push(HorizontalRepo {
                    full_name: label.repo.clone(),
                    category: label.category.clone(),
                });
            }
        }
        repos
    }
}

/// A corrective action on a repository's label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRepair {
    /// The repository still carries the pre-rename label name.
    Rename {
        /// Name currently on the repository.
        oldname: String,
        /// Official replacement.
        label: Label,
    },
    /// The official label is missing entirely.
    Create(Label),
    /// Present, but color or description drifted.
    Update(Label),
}

/// Compare a repository's labels against the official set and list what has
/// to change. `groups` are the repository's working group ids from
/// `w3c.json`; labels excluding one of them are skipped.
pub fn label_repairs(
    official: &[HorizontalLabel],
    existing: &[Label],
    groups: &[u64],
) -> Vec<LabelRepair> {
    let mut repairs = Vec::new();
    for wanted in official {
        if wanted.exclude_groups.iter().any(|g| groups.contains(g)) {
            continue;
        }
        if let Some(oldname) = &wanted.oldname {
            if existing.iter().any(|l| l.name.to_lowercase() == *oldname) {
                repairs.push(LabelRepair::Rename {
                    oldname: oldname.clone(),
                    label: wanted.as_label(),
                });
                continue;
            }
        }
        match existing
            .iter()
            .find(|l| l.name.to_lowercase() == wanted.name)
        {
            None => repairs.push(LabelRepair::Create(wanted.as_label())),
            Some(found) => {
                if found.color != wanted.color || found.description != wanted.description {
                    repairs.push(LabelRepair::Update(wanted.as_label()));
                }
            }
        }
    }
    repairs
}
