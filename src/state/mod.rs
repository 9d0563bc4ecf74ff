//! Crawl-long mutable state
//!
//! The engine's record sets: what has ever been enqueued, what turned out
//! to be HTML, what failed, who linked to whom, and which URL hashes feed
//! the extractor. All sets are process-scoped, born empty, and grow
//! monotonically; access is serialized per structure.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Shared mutable state of one crawl
#[derive(Debug, Default)]
pub struct CrawlState {
    /// Every normalized URL ever enqueued; the deduplication key
    seen: Mutex<HashSet<String>>,

    /// Normalized URLs whose fetch returned an HTML document
    discovered: Mutex<BTreeSet<String>>,

    /// Normalized URL to last error string, for HTML-looking URLs only
    failed: Mutex<HashMap<String, String>>,

    /// Normalized URL to the set of pages that referenced it; append-only
    referrers: Mutex<BTreeMap<String, BTreeSet<String>>>,

    /// URL hashes of discovered HTML documents, for the extractor
    html_hashes: Mutex<BTreeSet<String>>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a URL into the seen set; returns false if it was already there
    pub fn mark_seen(&self, url: &str) -> bool {
        self.seen.lock().insert(url.to_string())
    }

    /// Idempotent insert into the discovered set; returns true on first insert
    pub fn add_discovered(&self, url: &str) -> bool {
        self.discovered.lock().insert(url.to_string())
    }

    /// Records the last error for a URL
    pub fn record_failure(&self, url: &str, error: &str) {
        self.failed
            .lock()
            .insert(url.to_string(), error.to_string());
    }

    /// Records a referrer edge; edges accumulate and are never removed
    pub fn add_referrer(&self, url: &str, source: &str) {
        self.referrers
            .lock()
            .entry(url.to_string())
            .or_default()
            .insert(source.to_string());
    }

    /// Records the URL hash of a discovered HTML document
    pub fn add_html_hash(&self, hash: String) {
        self.html_hashes.lock().insert(hash);
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.lock().len()
    }

    pub fn discovered_snapshot(&self) -> BTreeSet<String> {
        self.discovered.lock().clone()
    }

    pub fn failed_snapshot(&self) -> HashMap<String, String> {
        self.failed.lock().clone()
    }

    pub fn referrers_snapshot(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.referrers.lock().clone()
    }

    pub fn html_hashes_snapshot(&self) -> BTreeSet<String> {
        self.html_hashes.lock().clone()
    }
}
