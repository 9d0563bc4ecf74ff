//! Final output artifacts
//!
//! Two files are written once the crawl quiesces: the discovered-URLs text
//! file (one URL per line, ASCII-sorted) and the failed-URLs YAML report
//! (grouped by error string, with every referrer of every failed URL).

use crate::DragnetError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::Path;

/// One failed URL with everything that linked to it
#[derive(Debug, Serialize)]
pub struct FailedUrl {
    pub url: String,
    pub referrers: Vec<String>,
}

/// All URLs that failed with the same error string
#[derive(Debug, Serialize)]
pub struct FailureGroup {
    pub error: String,
    pub urls: Vec<FailedUrl>,
}

/// Writes the discovered-URLs file: one URL per line, sorted, with a
/// trailing newline
pub fn write_discovered(path: &Path, discovered: &BTreeSet<String>) -> io::Result<()> {
    let mut content = String::new();
    for url in discovered {
        content.push_str(url);
        content.push('\n');
    }
    fs::write(path, content)
}

/// Builds the failure report: outer sequence sorted by error string, inner
/// URLs sorted, referrers sorted; URLs nobody linked to get an empty list
pub fn failure_report(
    failed: &HashMap<String, String>,
    referrers: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<FailureGroup> {
    let mut by_error: BTreeMap<&String, Vec<&String>> = BTreeMap::new();
    for (url, error) in failed {
        by_error.entry(error).or_default().push(url);
    }

    by_error
        .into_iter()
        .map(|(error, mut urls)| {
            urls.sort();
            FailureGroup {
                error: error.clone(),
                urls: urls
                    .into_iter()
                    .map(|url| FailedUrl {
                        url: url.clone(),
                        referrers: referrers
                            .get(url)
                            .map(|sources| sources.iter().cloned().collect())
                            .unwrap_or_default(),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Writes the failed-URLs YAML report
pub fn write_failed(
    path: &Path,
    failed: &HashMap<String, String>,
    referrers: &BTreeMap<String, BTreeSet<String>>,
) -> Result<(), DragnetError> {
    let report = failure_report(failed, referrers);
    let yaml = serde_yaml::to_string(&report)?;
    fs::write(path, yaml)?;
    Ok(())
}
