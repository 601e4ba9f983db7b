// src/crawl/visited.rs
// =============================================================================
// The set of URLs the crawl has already handled.
//
// try_visit is the single deduplication point: check and insert happen under
// one lock, so two workers racing on the same URL can't both win.
// =============================================================================

use crate::urls::canonical;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use url::Url;

#[derive(Debug)]
pub struct VisitedSet {
    enabled: bool,
    seen: Mutex<HashSet<String>>,
}

impl VisitedSet {
    /// A disabled set records nothing and lets everything through
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Records `url` and returns true the first time its canonical form is
    /// seen; false afterwards
    pub fn try_visit(&self, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }
        let key = canonical(url);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
