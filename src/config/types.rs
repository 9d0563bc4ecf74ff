use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for a crawl
///
/// Built either from command-line flags or from a TOML file with the same
/// kebab-case keys.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Seed URLs to start crawling from; the first seed's host becomes the
    /// main host
    pub seeds: Vec<String>,

    /// Hosts treated as equivalent to the main host; references to them are
    /// rewritten before enqueueing
    #[serde(rename = "additional-hosts", default)]
    pub additional_hosts: Vec<String>,

    /// Follow rel="nofollow" links
    #[serde(rename = "follow-all", default)]
    pub follow_all: bool,

    /// Skip the raw-text reference scan (DOM extraction only)
    #[serde(rename = "content-only", default)]
    pub content_only: bool,

    /// Keep query parameters in their original order
    #[serde(rename = "preserve-query-order", default)]
    pub preserve_query_order: bool,

    /// Number of concurrent fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum retry re-enqueues per URL
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Directory for the response cache; caching is off when unset
    #[serde(rename = "cache-dir", default)]
    pub cache_dir: Option<PathBuf>,

    /// Directory for raw response bodies, keyed like the cache
    #[serde(rename = "body-dir", default)]
    pub body_dir: Option<PathBuf>,

    /// External main-content extractor command
    #[serde(rename = "extractor-command", default)]
    pub extractor_command: Option<PathBuf>,

    /// Directory receiving extractor output, one file per URL hash
    #[serde(rename = "extractor-dir", default)]
    pub extractor_dir: Option<PathBuf>,

    /// Path of the discovered-URLs text file
    #[serde(rename = "output-path", default = "default_output_path")]
    pub output_path: PathBuf,

    /// Path of the failed-URLs YAML report
    #[serde(rename = "failed-output-path", default = "default_failed_output_path")]
    pub failed_output_path: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            additional_hosts: Vec::new(),
            follow_all: false,
            content_only: false,
            preserve_query_order: false,
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            cache_dir: None,
            body_dir: None,
            extractor_command: None,
            extractor_dir: None,
            output_path: default_output_path(),
            failed_output_path: default_failed_output_path(),
        }
    }
}

fn default_concurrency() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_output_path() -> PathBuf {
    PathBuf::from("discovered-urls.txt")
}

fn default_failed_output_path() -> PathBuf {
    PathBuf::from("failed-urls.yaml")
}
