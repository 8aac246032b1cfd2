//! Cross-repository link extraction.
//!
//! A horizontal issue declares which specification issue it mirrors by
//! carrying, somewhere in its body, the marker character followed by a space
//! and a GitHub issue URL:
//!
//! ```text
//! § https://github.com/w3c/css-fonts/issues/123
//! ```
//!
//! Parsing is pure and fails closed: a missing, malformed, or
//! encoding-corrupted marker yields no links, never an error.

use regex::Regex;
use std::sync::OnceLock;

/// The marker character preceding a canonical cross-reference URL.
pub const MAGIC_CHARACTER: char = '§';

const LINK_PATTERN: &str = r"https://github\.com/([^/\s]+/[^/\s]+)/(issues|pull)/([0-9]+)";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("{MAGIC_CHARACTER} {LINK_PATTERN}")).expect("static regex")
    })
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LINK_PATTERN).expect("static regex"))
}

/// URLs referenced through the marker, in order of appearance, duplicates
/// preserved. Empty when the body has no marker.
pub fn extract_links(body: &str) -> Vec<String> {
    marker_regex()
        .captures_iter(body)
        .map(|c| {
            // drop "<marker><space>", keep the URL
            let whole = c.get(0).expect("match").as_str();
            whole[MAGIC_CHARACTER.len_utf8() + 1..].to_string()
        })
        .collect()
}

/// Every GitHub issue/PR URL in the body, marker or not.
pub fn all_github_links(body: &str) -> Vec<String> {
    link_regex()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The `owner/name` a GitHub issue URL points into, lowercased.
pub fn repo_of(url: &str) -> Option<String> {
    link_regex()
        .captures(url)
        .map(|c| c[1].to_lowercase())
}

/// The issue number a GitHub issue URL points at.
pub fn number_of(url: &str) -> Option<u64> {
    link_regex()
        .captures(url)
        .and_then(|c| c[3].parse().ok())
}
