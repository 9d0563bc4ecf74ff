//! HTTP fetcher implementation
//!
//! This module performs the single-URL fetch for the crawl engine:
//! - Cache-first lookups against the response cache
//! - GET requests with redirect following and timeouts
//! - Transient-status retry classification
//! - Authority fallbacks (port strip, https downgrade) on transport errors
//!
//! Fallback eligibility is a property of the frontier entry; the fetcher
//! only consumes the flags. Whatever authority ends up serving the
//! response, the result is recorded under the originally requested URL.

use crate::cache::ResponseCache;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Fixed User-Agent sent with every request
pub const USER_AGENT: &str = concat!("dragnet/", env!("CARGO_PKG_VERSION"));

/// HTTP statuses treated as transient and retried
const TRANSIENT_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Fetch-level options shared by all requests
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum retry re-enqueues per URL
    pub max_retries: u32,

    /// The seed's explicit port; the port fallback only strips this one
    pub preferred_port: Option<u16>,
}

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: String,
    pub body: String,
    /// Final URL after redirects (or the cached URL on a cache hit)
    pub fetched_url: String,
    pub from_cache: bool,
}

/// Result of one fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// The response is usable
    Success(FetchedPage),

    /// Transient failure; the engine should re-enqueue with attempts + 1
    Retry,

    /// Permanent failure with the error string to report
    Failed(String),
}

/// Builds the HTTP client used for the whole crawl
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a single URL
///
/// # Request Flow
///
/// 1. If a cache is configured and holds the URL, return the cached
///    response without touching the network.
/// 2. Send a GET; statuses in {408, 429, 500, 502, 503, 504} yield `Retry`
///    while attempts remain, other non-2xx statuses yield
///    `Failed("HTTP <status>")`.
/// 3. On success, read the body, write through the cache under the
///    originally requested URL, and return the page.
/// 4. On a transport error, try the port fallback, then the scheme
///    fallback, each at most once, then `Retry` while attempts remain,
///    then `Failed` with the transport message.
pub async fn fetch(
    client: &Client,
    url: &str,
    attempts: u32,
    can_http_fallback: bool,
    can_no_port_fallback: bool,
    cache: Option<&ResponseCache>,
    opts: &FetchOptions,
) -> FetchOutcome {
    if let Some(cache) = cache {
        if let Some(record) = cache.get(url) {
            tracing::debug!("cache hit for {}", url);
            return FetchOutcome::Success(FetchedPage {
                status: record.status,
                content_type: record.content_type,
                body: record.body,
                fetched_url: record.url,
                from_cache: true,
            });
        }
    }

    let state = FallbackState {
        attempts,
        can_http_fallback,
        can_no_port_fallback,
        tried_http: false,
        tried_no_port: false,
    };

    fetch_once(client, url, url.to_string(), state, cache, opts).await
}

/// Per-URL fallback bookkeeping carried through recursive attempts
#[derive(Debug, Clone, Copy)]
struct FallbackState {
    attempts: u32,
    can_http_fallback: bool,
    can_no_port_fallback: bool,
    tried_http: bool,
    tried_no_port: bool,
}

async fn fetch_once(
    client: &Client,
    original: &str,
    current: String,
    state: FallbackState,
    cache: Option<&ResponseCache>,
    opts: &FetchOptions,
) -> FetchOutcome {
    match client.get(&current).send().await {
        Ok(response) => {
            let status = response.status().as_u16();

            if TRANSIENT_STATUSES.contains(&status) {
                if state.attempts < opts.max_retries {
                    tracing::debug!("transient HTTP {} for {}", status, current);
                    return FetchOutcome::Retry;
                }
                return FetchOutcome::Failed(format!("HTTP {}", status));
            }

            if !response.status().is_success() {
                return FetchOutcome::Failed(format!("HTTP {}", status));
            }

            let fetched_url = response.url().to_string();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();

            match response.text().await {
                Ok(body) => {
                    if let Some(cache) = cache {
                        cache.set(original, status, &content_type, &body);
                    }
                    FetchOutcome::Success(FetchedPage {
                        status,
                        content_type,
                        body,
                        fetched_url,
                        from_cache: false,
                    })
                }
                Err(e) => {
                    transport_fallback(client, original, state, cache, opts, e.to_string()).await
                }
            }
        }
        Err(e) => transport_fallback(client, original, state, cache, opts, e.to_string()).await,
    }
}

/// Applies authority fallbacks in strict order: port strip, then https
/// downgrade. Each axis fires at most once and derives from the originally
/// requested URL.
async fn transport_fallback(
    client: &Client,
    original: &str,
    state: FallbackState,
    cache: Option<&ResponseCache>,
    opts: &FetchOptions,
    message: String,
) -> FetchOutcome {
    if state.can_no_port_fallback && !state.tried_no_port {
        if let Some(stripped) = port_fallback_url(original, opts.preferred_port) {
            tracing::debug!("port fallback for {}: retrying as {}", original, stripped);
            let next = FallbackState {
                tried_no_port: true,
                ..state
            };
            return Box::pin(fetch_once(client, original, stripped, next, cache, opts)).await;
        }
    }

    if state.can_http_fallback && !state.tried_http {
        if let Some(downgraded) = scheme_fallback_url(original) {
            tracing::debug!("scheme fallback for {}: retrying as {}", original, downgraded);
            let next = FallbackState {
                tried_http: true,
                ..state
            };
            return Box::pin(fetch_once(client, original, downgraded, next, cache, opts)).await;
        }
    }

    if state.attempts < opts.max_retries {
        return FetchOutcome::Retry;
    }

    FetchOutcome::Failed(message)
}

/// The original URL with its port stripped, when that port is the
/// configured preferred one
fn port_fallback_url(original: &str, preferred_port: Option<u16>) -> Option<String> {
    let preferred = preferred_port?;
    let mut url = Url::parse(original).ok()?;
    if url.port() != Some(preferred) {
        return None;
    }
    url.set_port(None).ok()?;
    Some(url.into())
}

/// The original URL downgraded from https to http
fn scheme_fallback_url(original: &str) -> Option<String> {
    let mut url = Url::parse(original).ok()?;
    if url.scheme() != "https" {
        return None;
    }
    url.set_scheme("http").ok()?;
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client().is_ok());
    }

    #[test]
    fn test_transient_statuses() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(TRANSIENT_STATUSES.contains(&status));
        }
        for status in [400, 401, 403, 404, 410, 501] {
            assert!(!TRANSIENT_STATUSES.contains(&status));
        }
    }

    #[test]
    fn test_port_fallback_url() {
        assert_eq!(
            port_fallback_url("https://example.com:8080/x", Some(8080)),
            Some("https://example.com/x".to_string())
        );
    }

    #[test]
    fn test_port_fallback_requires_matching_port() {
        assert_eq!(port_fallback_url("https://example.com:9090/x", Some(8080)), None);
        assert_eq!(port_fallback_url("https://example.com/x", Some(8080)), None);
    }

    #[test]
    fn test_port_fallback_requires_configured_port() {
        assert_eq!(port_fallback_url("https://example.com:8080/x", None), None);
    }

    #[test]
    fn test_scheme_fallback_url() {
        assert_eq!(
            scheme_fallback_url("https://example.com:8080/x"),
            Some("http://example.com:8080/x".to_string())
        );
    }

    #[test]
    fn test_scheme_fallback_only_for_https() {
        assert_eq!(scheme_fallback_url("http://example.com/x"), None);
    }
}
