//! Content-addressed response cache
//!
//! Responses are memoized on disk as one JSON file per URL, named by the
//! SHA-256 of the exact URL string. An optional sibling body directory
//! holds raw bodies under the same hash for the downstream extractor. The
//! cache is persistent across runs and never evicted.
//!
//! Every read failure is a cache miss and every write failure is logged
//! and ignored; a missing cache entry is always survivable.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Computes the cache key for a URL: lowercase hex SHA-256 of the exact
/// string as passed in (not re-normalized)
pub fn url_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// One cached HTTP response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    pub url: String,
    pub timestamp: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Disk-backed response cache with an optional sibling body store
pub struct ResponseCache {
    dir: PathBuf,
    body_dir: Option<PathBuf>,
}

impl ResponseCache {
    /// Opens (creating if needed) the cache directory and body directory
    pub fn open(dir: &Path, body_dir: Option<&Path>) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        if let Some(body_dir) = body_dir {
            fs::create_dir_all(body_dir)?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            body_dir: body_dir.map(Path::to_path_buf),
        })
    }

    /// Looks up a cached response
    ///
    /// Any failure — missing file, I/O error, JSON error — is a miss. A hit
    /// rehydrates the body store so cached responses still feed the
    /// extractor.
    pub fn get(&self, url: &str) -> Option<CachedResponse> {
        let key = url_key(url);
        let content = fs::read_to_string(self.dir.join(&key)).ok()?;
        let record: CachedResponse = serde_json::from_str(&content).ok()?;
        self.write_body(&key, &record.body);
        Some(record)
    }

    /// Stores a response, stamping it with the current UTC time
    pub fn set(&self, url: &str, status: u16, content_type: &str, body: &str) {
        let key = url_key(url);
        let record = CachedResponse {
            url: url.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            status,
            content_type: content_type.to_string(),
            body: body.to_string(),
        };

        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(e) = fs::write(self.dir.join(&key), json) {
                    tracing::warn!("failed to write cache entry {}: {}", key, e);
                }
            }
            Err(e) => tracing::warn!("failed to serialize cache entry {}: {}", key, e),
        }

        self.write_body(&key, body);
    }

    fn write_body(&self, key: &str, body: &str) {
        if let Some(body_dir) = &self.body_dir {
            if let Err(e) = fs::write(body_dir.join(key), body) {
                tracing::warn!("failed to write body file {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_cache(root: &TempDir) -> ResponseCache {
        ResponseCache::open(&root.path().join("cache"), None).unwrap()
    }

    #[test]
    fn test_url_key_is_sha256_hex() {
        let key = url_key("https://example.com/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_url_key_distinct_urls() {
        assert_ne!(url_key("https://example.com/a"), url_key("https://example.com/b"));
    }

    #[test]
    fn test_round_trip() {
        let root = TempDir::new().unwrap();
        let cache = open_cache(&root);

        cache.set("https://example.com/", 200, "text/html", "<html></html>");
        let record = cache.get("https://example.com/").unwrap();

        assert_eq!(record.url, "https://example.com/");
        assert_eq!(record.status, 200);
        assert_eq!(record.content_type, "text/html");
        assert_eq!(record.body, "<html></html>");
    }

    #[test]
    fn test_missing_entry_is_none() {
        let root = TempDir::new().unwrap();
        let cache = open_cache(&root);
        assert!(cache.get("https://example.com/missing").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_none() {
        let root = TempDir::new().unwrap();
        let cache = open_cache(&root);

        let key = url_key("https://example.com/corrupt");
        fs::write(root.path().join("cache").join(&key), "not json").unwrap();

        assert!(cache.get("https://example.com/corrupt").is_none());
    }

    #[test]
    fn test_record_field_names() {
        let root = TempDir::new().unwrap();
        let cache = open_cache(&root);

        cache.set("https://example.com/", 200, "text/html", "body");
        let key = url_key("https://example.com/");
        let raw = fs::read_to_string(root.path().join("cache").join(&key)).unwrap();

        assert!(raw.contains("\"contentType\""));
        assert!(raw.contains("\"timestamp\""));
        assert!(raw.contains("\"url\""));
    }

    #[test]
    fn test_body_store_written_on_set() {
        let root = TempDir::new().unwrap();
        let body_dir = root.path().join("bodies");
        let cache =
            ResponseCache::open(&root.path().join("cache"), Some(body_dir.as_path())).unwrap();

        cache.set("https://example.com/", 200, "text/html", "the body");

        let key = url_key("https://example.com/");
        let body = fs::read_to_string(body_dir.join(&key)).unwrap();
        assert_eq!(body, "the body");
    }

    #[test]
    fn test_body_store_rehydrated_on_get() {
        let root = TempDir::new().unwrap();
        let body_dir = root.path().join("bodies");
        let cache =
            ResponseCache::open(&root.path().join("cache"), Some(body_dir.as_path())).unwrap();

        cache.set("https://example.com/", 200, "text/html", "the body");

        let key = url_key("https://example.com/");
        fs::remove_file(body_dir.join(&key)).unwrap();

        // A cache hit repopulates the body store
        cache.get("https://example.com/").unwrap();
        let body = fs::read_to_string(body_dir.join(&key)).unwrap();
        assert_eq!(body, "the body");
    }
}
