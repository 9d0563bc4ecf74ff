//! Link extraction for Dragnet
//!
//! This module turns fetched bodies into frontier-ready references. HTML
//! documents go through a DOM walk plus a raw-text scan; JavaScript and CSS
//! bodies go through the raw-text scan alone. Every candidate passes one
//! pipeline: scheme rejection, entity decoding, email/phone rejection,
//! resolution against the page URL, same-site host filtering, and
//! normalization.

mod html;
mod text;

use crate::url::UrlPolicy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

static PHONE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ().\-]*$").unwrap());

/// Which frontier channel a reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Page,
    Sitemap,
}

/// A raw reference candidate prior to filtering and resolution
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub raw: String,
    pub channel: Channel,
    /// Only `href` attributes are eligible for the malformed-reference repair
    pub repairable: bool,
}

impl Candidate {
    fn page(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            channel: Channel::Page,
            repairable: false,
        }
    }
}

/// A reference that survived the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// The resolved pre-normalization form; fallback eligibility is computed
    /// from this
    pub resolved: String,

    /// The canonical form under the crawl's URL policy
    pub normalized: String,

    /// The reference named an additional host and was rewritten to the main
    /// host
    pub from_additional_host: bool,
}

/// Result of extracting references from one body
#[derive(Debug, Default)]
pub struct Extraction {
    pub page_links: Vec<ExtractedLink>,
    pub sitemap_links: Vec<ExtractedLink>,

    /// Pairs of (unfixed, repaired) normalized forms produced by the
    /// malformed-reference repair, for diagnostics
    pub repairs: Vec<(String, String)>,
}

impl Extraction {
    fn push(&mut self, channel: Channel, link: ExtractedLink) {
        match channel {
            Channel::Page => self.page_links.push(link),
            Channel::Sitemap => self.sitemap_links.push(link),
        }
    }
}

/// Extracts same-site references from fetched bodies
pub struct LinkExtractor {
    main_host: String,
    additional_hosts: HashSet<String>,
    follow_all: bool,
    content_only: bool,
    policy: UrlPolicy,
}

impl LinkExtractor {
    pub fn new(
        main_host: String,
        additional_hosts: HashSet<String>,
        follow_all: bool,
        content_only: bool,
        policy: UrlPolicy,
    ) -> Self {
        Self {
            main_host,
            additional_hosts,
            follow_all,
            content_only,
            policy,
        }
    }

    /// Extracts references from an HTML document
    ///
    /// Walks the DOM for anchors, resource elements, data attributes, meta
    /// refresh directives and srcset lists, then (unless `content-only`)
    /// scans the raw text for quoted paths, quoted URLs and CSS `url(...)`.
    pub fn extract(&self, body: &str, base: &Url) -> Extraction {
        let mut extraction = Extraction::default();

        for candidate in html::collect_candidates(body, self.follow_all) {
            self.admit(candidate, base, &mut extraction);
        }

        if !self.content_only {
            for raw in text::scan(body) {
                self.admit(Candidate::page(&raw), base, &mut extraction);
            }
        }

        extraction
    }

    /// Extracts references from a non-HTML text body (JavaScript, CSS)
    pub fn extract_from_text(&self, body: &str, base: &Url) -> Extraction {
        let mut extraction = Extraction::default();
        for raw in text::scan(body) {
            self.admit(Candidate::page(&raw), base, &mut extraction);
        }
        extraction
    }

    /// Runs one candidate through the reference pipeline
    fn admit(&self, candidate: Candidate, base: &Url, extraction: &mut Extraction) {
        let raw = candidate.raw.trim();

        if raw.is_empty() || raw.starts_with('#') {
            return;
        }

        let lowered = raw.to_ascii_lowercase();
        for scheme in ["javascript:", "mailto:", "tel:", "data:"] {
            if lowered.starts_with(scheme) {
                return;
            }
        }

        let decoded = decode_entities(raw);

        if EMAIL.is_match(&decoded) || is_phone_like(&decoded) {
            return;
        }

        let was_absolute =
            decoded.starts_with("http://") || decoded.starts_with("https://");

        let Ok(resolved) = base.join(&decoded) else {
            return;
        };

        let unfixed = self.filter_host(&resolved);
        if let Some(link) = &unfixed {
            extraction.push(candidate.channel, link.clone());
        }

        // The repair never fires for candidates that already parsed as
        // absolute http(s) references.
        if candidate.repairable && !was_absolute && !decoded.starts_with("//") {
            if let Some(fixed) = self.repair(base, &resolved) {
                if let Some(link) = &unfixed {
                    extraction
                        .repairs
                        .push((link.normalized.clone(), fixed.normalized.clone()));
                }
                extraction.push(candidate.channel, fixed);
            }
        }
    }

    /// Accepts same-site references, rewriting additional hosts to the main
    /// host under the seed scheme with the port cleared
    fn filter_host(&self, resolved: &Url) -> Option<ExtractedLink> {
        let host = resolved.host_str()?;

        if host == self.main_host {
            let normalized = self.policy.normalize(resolved.as_str())?;
            return Some(ExtractedLink {
                resolved: resolved.to_string(),
                normalized,
                from_additional_host: false,
            });
        }

        if self.additional_hosts.contains(host) {
            let mut rewritten = resolved.clone();
            rewritten.set_scheme(&self.policy.scheme).ok()?;
            rewritten.set_host(Some(&self.main_host)).ok()?;
            rewritten.set_port(None).ok()?;
            let normalized = self.policy.normalize(rewritten.as_str())?;
            return Some(ExtractedLink {
                resolved: rewritten.to_string(),
                normalized,
                from_additional_host: true,
            });
        }

        None
    }

    /// Repairs a relative reference that swallowed its authority
    ///
    /// A relative `href` resolving to `<baseDir>/<host>/rest`, where
    /// `<host>` is the main host or an additional host, lost its protocol
    /// to relative resolution. The repaired form treats `<host>/rest` as
    /// authority plus path under the seed scheme.
    fn repair(&self, base: &Url, resolved: &Url) -> Option<ExtractedLink> {
        let base_path = base.path();
        let base_dir = match base_path.rfind('/') {
            Some(index) => &base_path[..=index],
            None => "/",
        };

        let rest = resolved.path().strip_prefix(base_dir)?;
        let (first_segment, _) = rest.split_once('/')?;

        if first_segment != self.main_host && !self.additional_hosts.contains(first_segment) {
            return None;
        }

        let mut repaired = format!("{}://{}", self.policy.scheme, rest);
        if let Some(query) = resolved.query() {
            repaired.push('?');
            repaired.push_str(query);
        }

        let repaired = Url::parse(&repaired).ok()?;
        self.filter_host(&repaired)
    }
}

/// Decodes the HTML entities that survive attribute parsing and appear in
/// raw-text candidates
fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(index) = rest.find('&') {
        output.push_str(&rest[..index]);
        rest = &rest[index..];

        let Some(end) = rest.find(';') else {
            output.push('&');
            rest = &rest[1..];
            continue;
        };

        let entity = &rest[1..end];
        match decode_entity(entity) {
            Some(decoded) => {
                output.push(decoded);
                rest = &rest[end + 1..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => return Some('&'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "quot" => return Some('"'),
        "apos" => return Some('\''),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(decimal) = entity.strip_prefix('#') {
        decimal.parse().ok()?
    } else {
        return None;
    };

    char::from_u32(code)
}

/// Matches phone-number-shaped strings: 7 to 15 digits with common
/// separators, optionally `+`-prefixed
fn is_phone_like(candidate: &str) -> bool {
    if !PHONE_SHAPE.is_match(candidate) {
        return false;
    }
    let digits = candidate.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
}
