//! Horizontal review issue tracker.
//!
//! Keeps "horizontal review" tracking issues in sync across the GitHub
//! repositories of a standards organization. Specification repositories
//! carry labels requesting review from the horizontal groups (accessibility,
//! internationalization, privacy, security, TAG); each horizontal group's
//! repository carries tracker issues mirroring those requests. Every pass
//! the reconciliation engine:
//!
//! 1. loads all horizontal issues and extracts their `§ <url>` marker links,
//! 2. learns shortname labels from issues that link to a single
//!    specification repository,
//! 3. repairs labels on both sides of every issue pair, and
//! 4. creates tracker issues for specification issues that lack one.
//!
//! State is rebuilt from scratch each pass; the only durable state is GitHub
//! itself plus a published shortname snapshot.

pub mod config;
pub mod error;
pub mod feeds;
pub mod github;
pub mod monitor;
pub mod reconcile;
pub mod report;
pub mod snapshot;

pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
