//! Observation seam for diagnostic tooling
//!
//! External tracing tools hook the crawl at four points. The default
//! implementation of every hook is a no-op, so observers implement only
//! what they need.

use super::fetcher::FetchOutcome;

/// Observer of crawl-engine events
pub trait CrawlObserver: Send + Sync {
    /// A normalized URL entered the frontier for the first time
    fn on_enqueue(&self, _url: &str) {}

    /// A worker began fetching a URL
    fn on_fetch_start(&self, _url: &str) {}

    /// A fetch finished, successfully or not
    fn on_fetch_complete(&self, _url: &str, _outcome: &FetchOutcome) {}

    /// A URL was added to the discovered set
    fn on_discover(&self, _url: &str) {}
}

/// The default observer: observes nothing
#[derive(Debug, Default)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}
