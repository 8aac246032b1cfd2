//! Repository handle de-duplication.
//!
//! One pass touches the same repositories from many directions (horizontal
//! issue links, the tracked-repository union, synthesized issue targets).
//! The arena hands out one shared [`RepoHandle`] per full name so caches are
//! shared and nothing is fetched twice. It lives exactly as long as one pass.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::github::api::GithubApi;
use crate::github::repo::RepoHandle;

/// Keyed cache of repository handles for one pass.
pub struct RepoArena {
    api: Arc<dyn GithubApi>,
    handles: Mutex<HashMap<String, Arc<RepoHandle>>>,
}

impl RepoArena {
    /// Create an empty arena over the given API.
    pub fn new(api: Arc<dyn GithubApi>) -> Self {
        Self {
            api,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The handle for a repository, created on first use. Names are keyed
    /// lowercased, so `W3C/Foo` and `w3c/foo` share one handle.
    pub fn repo(&self, full_name: &str) -> Arc<RepoHandle> {
        let key = full_name.to_lowercase();
        let mut handles = self.handles.lock().expect("arena poisoned");
        handles
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RepoHandle::new(&key, self.api.clone())))
            .clone()
    }

    /// Number of distinct repositories seen so far.
    pub fn len(&self) -> usize {
        self.handles.lock().expect("arena poisoned").len()
    }

    /// Whether the arena is still empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
