//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! full crawl cycle end-to-end: discovery, retry, sitemap handling,
//! referrer aggregation, caching, and output generation.

use dragnet::cache::{url_key, ResponseCache};
use dragnet::config::CrawlConfig;
use dragnet::crawler::{build_http_client, fetch, CrawlEngine, FetchOptions, FetchOutcome};
use dragnet::output;
use std::collections::BTreeSet;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with the given seeds
fn test_config(seeds: Vec<String>) -> CrawlConfig {
    CrawlConfig {
        seeds,
        concurrency: 4,
        max_retries: 3,
        ..CrawlConfig::default()
    }
}

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html")
}

fn xml_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "application/xml")
}

#[tokio::test]
async fn test_single_page_with_internal_link() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(r#"<html><body><a href="/about">About</a></body></html>"#))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>About us</body></html>")
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    let expected: BTreeSet<String> =
        [format!("{}/", base), format!("{}/about", base)].into();
    assert_eq!(report.discovered, expected);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_transient_errors_then_success() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Two 503s, then a healthy page
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response("<html><body>Recovered</body></html>"))
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    assert_eq!(report.discovered, BTreeSet::from([format!("{}/", base)]));
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_transient_errors_exhaust_retries() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config(vec![format!("{}/", base)]);
    config.max_retries = 2;
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    // Initial attempt plus two retries
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    assert!(report.discovered.is_empty());
    assert_eq!(report.failed.get(&format!("{}/", base)).unwrap(), "HTTP 503");
}

#[tokio::test]
async fn test_permanent_error_recorded_for_html_urls_only() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<html><body><a href="/missing">M</a><img src="/gone.png"></body></html>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    // The HTML-looking URL is reported, the image is not
    assert_eq!(
        report.failed.get(&format!("{}/missing", base)).unwrap(),
        "HTTP 404"
    );
    assert!(!report.failed.contains_key(&format!("{}/gone.png", base)));
}

#[tokio::test]
async fn test_sitemap_index_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    let index = format!(
        r#"<?xml version="1.0"?><sitemapindex>
            <sitemap><loc>{base}/sitemap-a.xml</loc></sitemap>
            <sitemap><loc>{base}/sitemap-b.xml</loc></sitemap>
        </sitemapindex>"#
    );
    let sitemap_a = format!(
        r#"<urlset>
            <url><loc>{base}/p1</loc></url>
            <url><loc>{base}/p2</loc></url>
        </urlset>"#
    );
    let sitemap_b = format!(
        r#"<urlset>
            <url><loc>{base}/p3</loc></url>
            <url><loc>{base}/p4</loc></url>
        </urlset>"#
    );

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(xml_response(&index))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-a.xml"))
        .respond_with(xml_response(&sitemap_a))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-b.xml"))
        .respond_with(xml_response(&sitemap_b))
        .mount(&server)
        .await;

    for page in ["/p1", "/p2", "/p3", "/p4"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html_response("<html><body>page</body></html>"))
            .mount(&server)
            .await;
    }

    let config = test_config(vec![format!("{}/sitemap.xml", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    // Three sitemap fetches plus four page fetches
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 7);

    let expected: BTreeSet<String> = ["/p1", "/p2", "/p3", "/p4"]
        .iter()
        .map(|p| format!("{}{}", base, p))
        .collect();
    assert_eq!(report.discovered, expected);

    // Sitemap URLs were seen but never discovered
    assert_eq!(report.seen_count, 7);
    assert!(!report.discovered.contains(&format!("{}/sitemap.xml", base)));
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_referrer_aggregation() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_response(r#"<html><body><a href="/c">C</a></body></html>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_response(r#"<html><body><a href="/c">C</a></body></html>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html_response("<html><body>C</body></html>"))
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    let sources = report.referrers.get(&format!("{}/c", base)).unwrap();
    assert!(sources.contains(&format!("{}/a", base)));
    assert!(sources.contains(&format!("{}/b", base)));
}

#[tokio::test]
async fn test_cache_rehydration_avoids_network() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");

    let seed = "https://cached.example/";
    let cache = ResponseCache::open(&cache_dir, None).unwrap();
    cache.set(seed, 200, "text/html", "<html><body>cached</body></html>");

    let mut config = test_config(vec![seed.to_string()]);
    config.cache_dir = Some(cache_dir);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    // The host does not resolve; an empty failed set proves no fetch left
    // the cache
    assert!(report.failed.is_empty());
    assert_eq!(report.discovered, BTreeSet::from([seed.to_string()]));
    assert_eq!(report.html_hashes, BTreeSet::from([url_key(seed)]));
}

#[tokio::test]
async fn test_cached_non_html_not_discovered() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");

    let seed = "https://cached.example/data";
    let cache = ResponseCache::open(&cache_dir, None).unwrap();
    cache.set(seed, 200, "application/json", "{}");

    let mut config = test_config(vec![seed.to_string()]);
    config.cache_dir = Some(cache_dir);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    assert!(report.discovered.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_scheme_fallback_against_plain_http_server() {
    let server = MockServer::start().await;
    let base = server.uri();
    let port = url::Url::parse(&base).unwrap().port().unwrap();

    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(html_response("<html><body>fallback</body></html>"))
        .mount(&server)
        .await;

    // The https attempt cannot complete against a plain-http server; the
    // scheme fallback retries the original authority over http.
    let client = build_http_client().unwrap();
    let opts = FetchOptions {
        max_retries: 0,
        preferred_port: Some(port),
    };
    let url = format!("https://127.0.0.1:{}/x", port);
    let outcome = fetch(&client, &url, 0, true, false, None, &opts).await;

    match outcome {
        FetchOutcome::Success(page) => {
            assert!(page.body.contains("fallback"));
            assert!(!page.from_cache);
        }
        other => panic!("expected success via scheme fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn test_relative_links_resolve_against_post_redirect_url() {
    let server = MockServer::start().await;
    let base = server.uri();

    // The seed redirects into a subdirectory; the body served there links
    // relatively, so the reference must resolve under /new/, not /.
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/new/index"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new/index"))
        .respond_with(html_response(
            r#"<html><body><a href="page">Next</a></body></html>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new/page"))
        .respond_with(html_response("<html><body>Deep page</body></html>"))
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/old", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    // The redirected document keeps its frontier identity, but its relative
    // link resolves against the final retrieval URL.
    let expected: BTreeSet<String> =
        [format!("{}/old", base), format!("{}/new/page", base)].into();
    assert_eq!(report.discovered, expected);

    // A wrong base would have produced {base}/page and a 404 failure
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_nofollow_links_skipped_by_default() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<html><body><a href="/private" rel="nofollow">P</a></body></html>"#,
        ))
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    assert_eq!(report.discovered, BTreeSet::from([format!("{}/", base)]));
}

#[tokio::test]
async fn test_output_files_written() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(
            r#"<html><body><a href="/gone">G</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = test_config(vec![format!("{}/", base)]);
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    let dir = TempDir::new().unwrap();
    let discovered_path = dir.path().join("discovered.txt");
    let failed_path = dir.path().join("failed.yaml");

    output::write_discovered(&discovered_path, &report.discovered).unwrap();
    output::write_failed(&failed_path, &report.failed, &report.referrers).unwrap();

    let discovered = std::fs::read_to_string(&discovered_path).unwrap();
    assert_eq!(discovered, format!("{}/\n", base));

    let failed = std::fs::read_to_string(&failed_path).unwrap();
    assert!(failed.contains("error: HTTP 404"));
    assert!(failed.contains(&format!("url: {}/gone", base)));
    assert!(failed.contains(&format!("- {}/", base)));
}

#[tokio::test]
async fn test_bodies_archived_for_extractor() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response("<html><body>archive me</body></html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let body_dir = dir.path().join("bodies");

    let mut config = test_config(vec![format!("{}/", base)]);
    config.cache_dir = Some(cache_dir);
    config.body_dir = Some(body_dir.clone());
    let engine = CrawlEngine::new(&config).unwrap();
    let report = engine.run().await;

    let root = format!("{}/", base);
    assert_eq!(report.html_hashes, BTreeSet::from([url_key(&root)]));

    let body = std::fs::read_to_string(body_dir.join(url_key(&root))).unwrap();
    assert!(body.contains("archive me"));
}
