//! The reconciliation engine.

pub mod driver;
pub mod labels;
pub mod links;
pub mod load;
pub mod policy;
pub mod shortnames;
pub mod synthesize;

pub use driver::{run_pass, PassOptions, PassStats};
pub use labels::{plan, LabelAction, Target};
pub use links::{all_github_links, extract_links, number_of, repo_of, MAGIC_CHARACTER};
pub use load::{load_horizontal_repo, severity_of, HorizontalIssue, SpecRef};
pub use policy::{policy_for, CategoryPolicy};
pub use shortnames::{ShortnameMap, CSS_DRAFTS_REPO, SHORTNAME_EXCLUDED_REPO};
pub use synthesize::{
    css_title_shortnames, find_tracking, resolve_shortnames, synthesize, NewTrackerIssue,
    CUTOFF_YEAR, EXCLUDED_SPEC_REPOS,
};
