//! DOM reference harvesting
//!
//! Walks a parsed HTML document and collects raw reference candidates from
//! anchors, resource elements, data attributes, meta refresh directives,
//! and srcset lists. Candidates are filtered and resolved by the caller.

use super::{Candidate, Channel};
use scraper::{Html, Selector};

/// Elements whose `src` attribute references a fetchable resource
const SRC_SELECTORS: &[&str] = &[
    "script[src]",
    "img[src]",
    "iframe[src]",
    "video[src]",
    "audio[src]",
    "source[src]",
    "embed[src]",
];

/// Data attributes commonly carrying URLs
const DATA_ATTRIBUTES: &[&str] = &["data-url", "data-href", "data-src", "data-link"];

/// Collects raw reference candidates from an HTML document
///
/// `rel="nofollow"` anchors are dropped unless `follow_all` is set;
/// `rel="sitemap"` links are routed to the sitemap channel. Only `href`
/// candidates are eligible for the malformed-reference repair.
pub(crate) fn collect_candidates(html: &str, follow_all: bool) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    collect_anchors(&document, follow_all, &mut candidates);
    collect_sources(&document, &mut candidates);
    collect_data_attributes(&document, &mut candidates);
    collect_meta_refresh(&document, &mut candidates);
    collect_srcsets(&document, &mut candidates);

    candidates
}

fn collect_anchors(document: &Html, follow_all: bool, out: &mut Vec<Candidate>) {
    for selector_str in ["a[href]", "link[href]"] {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let rel_tokens: Vec<String> = element
                .value()
                .attr("rel")
                .unwrap_or("")
                .split_whitespace()
                .map(|t| t.to_ascii_lowercase())
                .collect();

            if rel_tokens.iter().any(|t| t == "nofollow") && !follow_all {
                continue;
            }

            let channel = if rel_tokens.iter().any(|t| t == "sitemap") {
                Channel::Sitemap
            } else {
                Channel::Page
            };

            if let Some(href) = element.value().attr("href") {
                out.push(Candidate {
                    raw: href.to_string(),
                    channel,
                    repairable: true,
                });
            }
        }
    }
}

fn collect_sources(document: &Html, out: &mut Vec<Candidate>) {
    for selector_str in SRC_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                out.push(Candidate::page(src));
            }
        }
    }
}

fn collect_data_attributes(document: &Html, out: &mut Vec<Candidate>) {
    for attribute in DATA_ATTRIBUTES {
        let Ok(selector) = Selector::parse(&format!("[{}]", attribute)) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attribute) {
                out.push(Candidate::page(value));
            }
        }
    }
}

/// Extracts the URL= portion of `<meta http-equiv="refresh">` content
fn collect_meta_refresh(document: &Html, out: &mut Vec<Candidate>) {
    let Ok(selector) = Selector::parse("meta[http-equiv]") else {
        return;
    };
    for element in document.select(&selector) {
        let equiv = element.value().attr("http-equiv").unwrap_or("");
        if !equiv.eq_ignore_ascii_case("refresh") {
            continue;
        }
        let Some(content) = element.value().attr("content") else {
            continue;
        };
        if let Some(url) = refresh_target(content) {
            out.push(Candidate::page(&url));
        }
    }
}

/// Parses `content="5; URL=/next"` into `/next`
fn refresh_target(content: &str) -> Option<String> {
    for part in content.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim().eq_ignore_ascii_case("url") {
                let value = value.trim().trim_matches('\'').trim_matches('"');
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Takes the first token of each comma-separated srcset entry
fn collect_srcsets(document: &Html, out: &mut Vec<Candidate>) {
    for selector_str in ["img[srcset]", "source[srcset]"] {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let Some(srcset) = element.value().attr("srcset") else {
                continue;
            };
            for entry in srcset.split(',') {
                if let Some(first) = entry.split_whitespace().next() {
                    out.push(Candidate::page(first));
                }
            }
        }
    }
}
