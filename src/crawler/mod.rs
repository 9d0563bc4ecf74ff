//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and authority-fallback logic
//! - The frontier and worker pool
//! - Content classification and reference enqueueing
//! - The observation seam for diagnostic tooling

mod engine;
mod fetcher;
mod observer;

pub use engine::{CrawlEngine, CrawlReport};
pub use fetcher::{build_http_client, fetch, FetchOptions, FetchOutcome, FetchedPage, USER_AGENT};
pub use observer::{CrawlObserver, NoopObserver};
