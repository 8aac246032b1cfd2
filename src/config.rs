//! Runtime configuration.
//!
//! Layered the usual way: built-in defaults, then an optional `tracker.toml`,
//! then `HRT_*` environment variables. The resulting [`TrackerConfig`] is
//! passed by reference into everything that needs it; there is no global.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TrackerError};

/// Default caching proxy in front of the GitHub API.
pub const DEFAULT_CACHE_URL: &str = "https://labs.w3.org/github-cache";

/// Hours between reconciliation passes in production.
const DEFAULT_PASS_INTERVAL_HOURS: u64 = 12;

/// Retry cap for rate-limited or gateway-failing requests.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Email settings for the end-of-run report.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Path to the sendmail binary.
    #[serde(default = "default_sendmail")]
    pub sendmail: String,
}

fn default_sendmail() -> String {
    "/usr/sbin/sendmail".to_string()
}

/// Tracker runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// GitHub token used for mutations and direct reads.
    pub gh_token: String,
    /// Base URL of the caching proxy.
    #[serde(default = "default_cache")]
    pub cache: String,
    /// Debug mode: single pass, no mutations, no email.
    #[serde(default)]
    pub debug: bool,
    /// Bind address for the monitor endpoint, e.g. `127.0.0.1:8080`.
    #[serde(default = "default_monitor_addr")]
    pub monitor_addr: String,
    /// Hours between passes.
    #[serde(default = "default_interval")]
    pub pass_interval_hours: u64,
    /// Retry cap for transient upstream failures.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// W3C API key, needed only by the shortname snapshot utility.
    #[serde(default)]
    pub w3c_api_key: Option<String>,
    /// Email report settings; absent means no email even in production.
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

fn default_cache() -> String {
    DEFAULT_CACHE_URL.to_string()
}

fn default_monitor_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_interval() -> u64 {
    DEFAULT_PASS_INTERVAL_HOURS
}

fn default_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl TrackerConfig {
    /// Load configuration from `tracker.toml` (if present) and `HRT_*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(Some("tracker.toml"))
    }

    /// Load from an explicit file path, mostly so tests can point at a
    /// temporary file.
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("HRT"))
            .build()
            .map_err(|e| TrackerError::Config(e.to_string()))?;

        let cfg: TrackerConfig = settings
            .try_deserialize()
            .map_err(|e| TrackerError::Config(e.to_string()))?;

        if cfg.gh_token.trim().is_empty() {
            return Err(TrackerError::Config("gh_token is missing".into()));
        }
        Ok(cfg)
    }

    /// Interval between passes.
    pub fn pass_interval(&self) -> Duration {
        Duration::from_secs(self.pass_interval_hours * 3600)
    }

    /// Cache TTL in minutes to request while loading horizontal issues.
    /// Debug runs tolerate slightly stale data; real runs want a forced
    /// refresh (`-1` disables the proxy cache).
    pub fn horizontal_ttl(&self) -> i64 {
        if self.debug {
            15
        } else {
            -1
        }
    }

    /// Log the effective configuration, with the token redacted.
    pub fn announce(&self) {
        tracing::info!(
            cache = %self.cache,
            debug = self.debug,
            monitor = %self.monitor_addr,
            interval_hours = self.pass_interval_hours,
            max_retries = self.max_retries,
            email = self.email.is_some(),
            "configuration loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("tracker.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        file.write_all(body.as_bytes()).expect("write config");
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            r#"
gh_token = "ghp_test"
debug = true

[email]
from = "tracker@example.org"
to = "team@example.org"
"#,
        );

        let cfg = TrackerConfig::load_from(Some(&path)).expect("load");
        assert!(cfg.debug);
        assert_eq!(cfg.cache, DEFAULT_CACHE_URL);
        assert_eq!(cfg.pass_interval_hours, 12);
        assert_eq!(cfg.email.expect("email").sendmail, "/usr/sbin/sendmail");
    }

    #[test]
    fn test_missing_token_rejected() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = write_config(&dir, "gh_token = \"\"\n");
        assert!(TrackerConfig::load_from(Some(&path)).is_err());
    }

    #[test]
    fn test_ttl_depends_on_debug() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = write_config(&dir, "gh_token = \"t\"\ndebug = true\n");
        let cfg = TrackerConfig::load_from(Some(&path)).expect("load");
        assert_eq!(cfg.horizontal_ttl(), 15);

        let path = write_config(&dir, "gh_token = \"t\"\n");
        let cfg = TrackerConfig::load_from(Some(&path)).expect("load");
        assert_eq!(cfg.horizontal_ttl(), -1);
    }
}
