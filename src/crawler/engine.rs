//! Crawl engine: frontier, worker pool, and result processing
//!
//! The engine owns the frontier queue and the crawl-long state sets, runs
//! a fixed pool of worker tasks, and classifies every fetched body to
//! decide what gets discovered and what gets enqueued next.
//!
//! Shutdown protocol: a worker that pops an entry increments the in-flight
//! counter under the frontier lock, so `frontier empty && in_flight == 0`
//! observed under that lock means the crawl has quiesced. The run loop
//! polls that condition, then flips the done flag and joins the workers.

use crate::cache::{self, ResponseCache};
use crate::config::CrawlConfig;
use crate::crawler::fetcher::{self, FetchOptions, FetchOutcome, FetchedPage};
use crate::crawler::observer::{CrawlObserver, NoopObserver};
use crate::links::{Extraction, LinkExtractor};
use crate::sitemap;
use crate::state::CrawlState;
use crate::url::{looks_like_html, UrlPolicy};
use crate::{DragnetError, UrlError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How long an idle worker sleeps before re-checking the frontier
const IDLE_SLEEP: Duration = Duration::from_millis(25);

/// How often the run loop polls for quiescence
const QUIESCENCE_POLL: Duration = Duration::from_millis(50);

/// One pending fetch
#[derive(Debug, Clone)]
struct FrontierEntry {
    /// The normalized URL to fetch
    url: String,

    /// Retry re-enqueues so far
    attempts: u32,

    /// The reference was originally plain http, so downgrading is allowed
    can_fallback_to_http: bool,

    /// The reference originally carried no port, so stripping the injected
    /// one is allowed
    can_fallback_to_no_port: bool,

    /// Sitemap semantics are sticky across the fetch
    is_sitemap: bool,
}

/// Final artifact of a crawl
#[derive(Debug)]
pub struct CrawlReport {
    pub discovered: BTreeSet<String>,
    pub failed: HashMap<String, String>,
    pub referrers: BTreeMap<String, BTreeSet<String>>,
    pub html_hashes: BTreeSet<String>,
    pub seen_count: usize,
}

/// The crawl engine
///
/// Cheap to clone into worker tasks; all state lives behind the shared
/// inner structure.
pub struct CrawlEngine {
    shared: Arc<EngineShared>,
}

struct EngineShared {
    seeds: Vec<String>,
    policy: UrlPolicy,
    extractor: LinkExtractor,
    state: CrawlState,
    frontier: Mutex<VecDeque<FrontierEntry>>,
    in_flight: AtomicUsize,
    done: AtomicBool,
    client: reqwest::Client,
    cache: Option<ResponseCache>,
    fetch_opts: FetchOptions,
    content_only: bool,
    concurrency: usize,
    observer: Arc<dyn CrawlObserver>,
}

impl CrawlEngine {
    /// Builds an engine from a validated configuration
    pub fn new(config: &CrawlConfig) -> Result<Self, DragnetError> {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Builds an engine with a diagnostic observer attached
    pub fn with_observer(
        config: &CrawlConfig,
        observer: Arc<dyn CrawlObserver>,
    ) -> Result<Self, DragnetError> {
        let first_seed = config
            .seeds
            .first()
            .ok_or_else(|| UrlError::Parse("no seed URLs".to_string()))?;

        let policy = UrlPolicy::from_seed(first_seed, config.preserve_query_order)?;

        let main_host = Url::parse(first_seed)?
            .host_str()
            .ok_or(UrlError::MissingHost)?
            .to_string();

        let extractor = LinkExtractor::new(
            main_host,
            config.additional_hosts.iter().cloned().collect::<HashSet<_>>(),
            config.follow_all,
            config.content_only,
            policy.clone(),
        );

        let cache = match &config.cache_dir {
            Some(dir) => Some(ResponseCache::open(dir, config.body_dir.as_deref())?),
            None => None,
        };

        let fetch_opts = FetchOptions {
            max_retries: config.max_retries,
            preferred_port: policy.preferred_port,
        };

        Ok(Self {
            shared: Arc::new(EngineShared {
                seeds: config.seeds.clone(),
                policy,
                extractor,
                state: CrawlState::new(),
                frontier: Mutex::new(VecDeque::new()),
                in_flight: AtomicUsize::new(0),
                done: AtomicBool::new(false),
                client: fetcher::build_http_client()?,
                cache,
                fetch_opts,
                content_only: config.content_only,
                concurrency: config.concurrency,
                observer,
            }),
        })
    }

    /// Runs the crawl to quiescence and returns the collected sets
    ///
    /// The engine itself never fails: fetch errors end up in the failed
    /// set (when reportable) and the report is partial at worst.
    pub async fn run(&self) -> CrawlReport {
        let shared = &self.shared;

        for seed in &shared.seeds {
            shared.enqueue(seed, false, None, false);
        }

        let workers: Vec<_> = (0..shared.concurrency)
            .map(|_| tokio::spawn(worker_loop(Arc::clone(shared))))
            .collect();

        loop {
            tokio::time::sleep(QUIESCENCE_POLL).await;
            let frontier = shared.frontier.lock();
            if frontier.is_empty() && shared.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
        }

        shared.done.store(true, Ordering::SeqCst);
        for worker in workers {
            let _ = worker.await;
        }

        tracing::info!(
            "crawl quiesced: {} seen, {} discovered",
            shared.state.seen_count(),
            shared.state.discovered_count()
        );

        CrawlReport {
            discovered: shared.state.discovered_snapshot(),
            failed: shared.state.failed_snapshot(),
            referrers: shared.state.referrers_snapshot(),
            html_hashes: shared.state.html_hashes_snapshot(),
            seen_count: shared.state.seen_count(),
        }
    }
}

async fn worker_loop(shared: Arc<EngineShared>) {
    loop {
        if shared.done.load(Ordering::SeqCst) {
            break;
        }

        // Pop and increment in-flight under the same lock, so quiescence
        // checks never observe a popped entry with a zero counter.
        let entry = {
            let mut frontier = shared.frontier.lock();
            match frontier.pop_front() {
                Some(entry) => {
                    shared.in_flight.fetch_add(1, Ordering::SeqCst);
                    Some(entry)
                }
                None => None,
            }
        };

        let Some(entry) = entry else {
            tokio::time::sleep(IDLE_SLEEP).await;
            continue;
        };

        shared.observer.on_fetch_start(&entry.url);

        let outcome = fetcher::fetch(
            &shared.client,
            &entry.url,
            entry.attempts,
            entry.can_fallback_to_http,
            entry.can_fallback_to_no_port,
            shared.cache.as_ref(),
            &shared.fetch_opts,
        )
        .await;

        shared.observer.on_fetch_complete(&entry.url, &outcome);

        match outcome {
            FetchOutcome::Retry => {
                let mut retry = entry.clone();
                retry.attempts += 1;
                shared.frontier.lock().push_back(retry);
            }
            FetchOutcome::Failed(message) => {
                tracing::debug!("fetch failed for {}: {}", entry.url, message);
                if looks_like_html(&entry.url) {
                    shared.state.record_failure(&entry.url, &message);
                }
            }
            FetchOutcome::Success(page) => {
                shared.process_success(&entry, page);
            }
        }

        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EngineShared {
    /// Classifies a fetched body and feeds its references back into the
    /// frontier
    fn process_success(&self, entry: &FrontierEntry, page: FetchedPage) {
        let media_type = page
            .content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        // Relative references resolve against the document's retrieval
        // location, which a redirect may have moved away from the frontier
        // URL.
        let base = match Url::parse(&page.fetched_url).or_else(|_| Url::parse(&entry.url)) {
            Ok(base) => base,
            Err(_) => return,
        };

        let mut is_html = false;
        let mut sitemap_detected = false;
        let mut links = Extraction::default();

        match media_type.as_str() {
            "application/xml" | "text/xml" => {
                sitemap_detected = self.ingest_sitemap(entry, &page.body);
            }
            "text/plain" if entry.is_sitemap => {
                sitemap_detected = self.ingest_sitemap(entry, &page.body);
            }
            "text/html" => {
                links = self.extractor.extract(&page.body, &base);
                is_html = true;
            }
            "application/javascript" | "text/css" if !self.content_only => {
                links = self.extractor.extract_from_text(&page.body, &base);
            }
            _ => {}
        }

        if is_html && !sitemap_detected {
            if self.state.add_discovered(&entry.url) {
                self.observer.on_discover(&entry.url);
            }
            self.state.add_html_hash(cache::url_key(&entry.url));
        }

        for (unfixed, fixed) in &links.repairs {
            tracing::debug!("repaired malformed reference {} -> {}", unfixed, fixed);
        }

        for link in links.page_links {
            self.enqueue(&link.resolved, link.from_additional_host, Some(&entry.url), false);
        }
        for link in links.sitemap_links {
            self.enqueue(&link.resolved, link.from_additional_host, Some(&entry.url), true);
        }
    }

    /// Parses a sitemap body and enqueues its URLs; returns true when the
    /// parse produced anything (the sitemap-detected marker)
    fn ingest_sitemap(&self, entry: &FrontierEntry, body: &str) -> bool {
        let refs = sitemap::parse(body);
        let detected = !refs.is_empty();

        for page_url in refs.pages {
            self.enqueue(&page_url, false, Some(&entry.url), false);
        }
        for sitemap_url in refs.sitemaps {
            self.enqueue(&sitemap_url, false, Some(&entry.url), true);
        }

        detected
    }

    /// Admits one reference into the frontier
    ///
    /// Records the referrer edge on every call, even for already-seen URLs;
    /// the failure report quotes all referrers. Fallback eligibility is
    /// captured from the pre-normalization URL, with the no-port axis gated
    /// off for references rewritten from an additional host.
    fn enqueue(
        &self,
        raw: &str,
        from_additional_host: bool,
        source: Option<&str>,
        is_sitemap: bool,
    ) {
        let Some(normalized) = self.policy.normalize(raw) else {
            return;
        };

        if let Some(source) = source {
            self.state.add_referrer(&normalized, source);
        }

        if !self.state.mark_seen(&normalized) {
            return;
        }

        let (was_http, was_portless) = match self.policy.parse_promoted(raw) {
            Some(parsed) => (parsed.scheme() == "http", parsed.port().is_none()),
            None => (false, false),
        };

        self.frontier.lock().push_back(FrontierEntry {
            url: normalized.clone(),
            attempts: 0,
            can_fallback_to_http: was_http,
            can_fallback_to_no_port: was_portless && !from_additional_host,
            is_sitemap,
        });

        self.observer.on_enqueue(&normalized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlConfig;

    fn test_config(seeds: Vec<String>) -> CrawlConfig {
        CrawlConfig {
            seeds,
            ..CrawlConfig::default()
        }
    }

    fn test_engine(seed: &str) -> CrawlEngine {
        CrawlEngine::new(&test_config(vec![seed.to_string()])).unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_dedupes() {
        let engine = test_engine("https://example.com/");
        let shared = &engine.shared;

        shared.enqueue("https://example.com/page", false, None, false);
        shared.enqueue("https://example.com/page", false, None, false);

        assert_eq!(shared.frontier.lock().len(), 1);
        assert_eq!(shared.state.seen_count(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_normalizes_variants_to_one_entry() {
        let engine = test_engine("https://example.com/");
        let shared = &engine.shared;

        shared.enqueue("https://example.com/page/", false, None, false);
        shared.enqueue("https://example.com/page#frag", false, None, false);
        shared.enqueue("http://example.com/page", false, None, false);

        assert_eq!(shared.frontier.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_drops_unnormalizable() {
        let engine = test_engine("https://example.com/");
        let shared = &engine.shared;

        shared.enqueue("ftp://example.com/file", false, None, false);
        shared.enqueue("not a url", false, None, false);

        assert!(shared.frontier.lock().is_empty());
        assert_eq!(shared.state.seen_count(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_records_referrer_for_seen_urls() {
        let engine = test_engine("https://example.com/");
        let shared = &engine.shared;

        shared.enqueue(
            "https://example.com/c",
            false,
            Some("https://example.com/a"),
            false,
        );
        shared.enqueue(
            "https://example.com/c",
            false,
            Some("https://example.com/b"),
            false,
        );

        let referrers = shared.state.referrers_snapshot();
        let sources = referrers.get("https://example.com/c").unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(shared.frontier.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_captures_fallback_flags() {
        let engine = test_engine("https://example.com:8080/");
        let shared = &engine.shared;

        shared.enqueue("http://example.com/x", false, None, false);

        let frontier = shared.frontier.lock();
        let entry = frontier.front().unwrap();
        assert_eq!(entry.url, "https://example.com:8080/x");
        assert!(entry.can_fallback_to_http);
        assert!(entry.can_fallback_to_no_port);
    }

    #[tokio::test]
    async fn test_enqueue_gates_no_port_for_additional_hosts() {
        let engine = test_engine("https://example.com:8080/");
        let shared = &engine.shared;

        shared.enqueue("https://example.com/x", true, None, false);

        let frontier = shared.frontier.lock();
        let entry = frontier.front().unwrap();
        assert!(!entry.can_fallback_to_http);
        assert!(!entry.can_fallback_to_no_port);
    }

    #[tokio::test]
    async fn test_sitemap_flag_sticky() {
        let engine = test_engine("https://example.com/");
        let shared = &engine.shared;

        shared.enqueue("https://example.com/sitemap.xml", false, None, true);

        let frontier = shared.frontier.lock();
        assert!(frontier.front().unwrap().is_sitemap);
    }
}
