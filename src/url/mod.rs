//! URL handling module for Dragnet
//!
//! This module provides the seed-derived canonicalization policy and the
//! path heuristic that decides whether a failed URL is worth reporting.

mod normalize;

pub use normalize::UrlPolicy;

use url::Url;

/// Path extensions treated as HTML documents
const HTML_EXTENSIONS: &[&str] = &["html", "htm", "php", "asp", "aspx", "jsp", "cgi", "pl"];

/// Returns true when a URL's shape suggests an HTML document
///
/// Matches the document root, directory-style paths with a trailing slash,
/// paths with a known HTML extension, and paths whose last segment carries
/// no extension at all. Failures on such URLs are recorded; failures on
/// asset-shaped URLs are not.
///
/// # Examples
///
/// ```
/// use dragnet::looks_like_html;
///
/// assert!(looks_like_html("https://example.com/"));
/// assert!(looks_like_html("https://example.com/about"));
/// assert!(looks_like_html("https://example.com/page.html"));
/// assert!(!looks_like_html("https://example.com/logo.png"));
/// ```
pub fn looks_like_html(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => return false,
    };

    if path.is_empty() || path == "/" || path.ends_with('/') {
        return true;
    }

    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((_, extension)) => HTML_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()),
        None => true,
    }
}
