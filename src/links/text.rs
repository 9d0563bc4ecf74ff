//! Heuristic reference scanning over raw text
//!
//! Finds URL-shaped strings in bodies that are not walked as a DOM:
//! JavaScript, CSS, and the raw text of HTML documents. The patterns are
//! deliberately loose; `keep_candidate` prunes the obvious code tokens.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static QUOTED_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'](https?://[^"'\s<>]+)["']"#).unwrap());

static QUOTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'](/[^"'\s<>]*)["']"#).unwrap());

static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).unwrap());

static LOWERCASE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]+$").unwrap());

/// Scans raw text for reference candidates
///
/// Emits, in order: quoted full URLs, quoted absolute paths, and CSS
/// `url(...)` arguments, deduplicated on the raw candidate string.
pub(crate) fn scan(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for pattern in [&*QUOTED_URL, &*QUOTED_PATH, &*CSS_URL] {
        for capture in pattern.captures_iter(body) {
            let candidate = capture[1].to_string();
            if keep_candidate(&candidate) && seen.insert(candidate.clone()) {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

/// Prunes candidates that are almost certainly code tokens, not references
///
/// Drops template placeholders (`${`, `{{`), strings shorter than two
/// characters, and bare lowercase words. All the heuristic filters live
/// here so future pruning is a one-site change.
fn keep_candidate(candidate: &str) -> bool {
    if candidate.len() < 2 {
        return false;
    }
    if candidate.contains("${") || candidate.contains("{{") {
        return false;
    }
    if LOWERCASE_WORD.is_match(candidate) {
        return false;
    }
    true
}
