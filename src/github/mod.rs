//! GitHub plumbing: data model, API seam, client, per-run caches.

pub mod api;
pub mod arena;
pub mod client;
pub mod repo;
pub mod testing;
pub mod types;

pub use api::GithubApi;
pub use arena::RepoArena;
pub use client::RestClient;
pub use repo::RepoHandle;
pub use types::{FileContent, Issue, IssueState, Label, Team, W3cConfig, SHORTNAME_PREFIX};
