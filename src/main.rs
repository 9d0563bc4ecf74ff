//! Dragnet main entry point
//!
//! Command-line interface for the Dragnet same-site crawler.

use clap::error::ErrorKind;
use clap::Parser;
use dragnet::config::{load_config_with_hash, validate, CrawlConfig};
use dragnet::crawler::CrawlEngine;
use dragnet::extractor::ExtractorDriver;
use dragnet::output;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Dragnet: a same-site web crawler
///
/// Crawls every HTML document reachable from the seed URLs, writing the
/// discovered set to a sorted text file and failures to a YAML report.
/// Responses can be archived in a content-addressed cache and fed to an
/// external main-content extractor.
#[derive(Parser, Debug)]
#[command(name = "dragnet")]
#[command(version)]
#[command(about = "A same-site web crawler", long_about = None)]
struct Cli {
    /// Seed URLs to start crawling from
    #[arg(value_name = "SEED", required_unless_present = "config")]
    seeds: Vec<String>,

    /// Path to a TOML configuration file (replaces the other options)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host treated as equivalent to the main host (repeatable)
    #[arg(long = "additional-host", value_name = "HOST")]
    additional_hosts: Vec<String>,

    /// Follow rel="nofollow" links
    #[arg(long)]
    follow_all: bool,

    /// Skip the raw-text reference scan (DOM extraction only)
    #[arg(long)]
    content_only: bool,

    /// Keep query parameters in their original order
    #[arg(long)]
    preserve_query_order: bool,

    /// Number of concurrent fetch workers
    #[arg(long, default_value_t = 20)]
    concurrency: usize,

    /// Maximum retry re-enqueues per URL
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Directory for the response cache
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Directory for raw response bodies
    #[arg(long, value_name = "DIR")]
    body_dir: Option<PathBuf>,

    /// External main-content extractor command
    #[arg(long, value_name = "CMD")]
    extractor: Option<PathBuf>,

    /// Directory receiving extractor output
    #[arg(long, value_name = "DIR")]
    extractor_dir: Option<PathBuf>,

    /// Path of the discovered-URLs text file
    #[arg(long, value_name = "FILE", default_value = "discovered-urls.txt")]
    output: PathBuf,

    /// Path of the failed-URLs YAML report
    #[arg(long, value_name = "FILE", default_value = "failed-urls.yaml")]
    failed_output: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    setup_logging(cli.verbose, cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!("crawl failed: {}", e);
        std::process::exit(1);
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dragnet=info,warn"),
            1 => EnvFilter::new("dragnet=debug,info"),
            2 => EnvFilter::new("dragnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the crawl configuration from the config file or the CLI flags
fn build_config(cli: &Cli) -> dragnet::ConfigResult<CrawlConfig> {
    if let Some(path) = &cli.config {
        let (config, hash) = load_config_with_hash(path)?;
        tracing::info!(
            "configuration loaded from {} (hash: {})",
            path.display(),
            hash
        );
        return Ok(config);
    }

    let config = CrawlConfig {
        seeds: cli.seeds.clone(),
        additional_hosts: cli.additional_hosts.clone(),
        follow_all: cli.follow_all,
        content_only: cli.content_only,
        preserve_query_order: cli.preserve_query_order,
        concurrency: cli.concurrency,
        max_retries: cli.max_retries,
        cache_dir: cli.cache_dir.clone(),
        body_dir: cli.body_dir.clone(),
        extractor_command: cli.extractor.clone(),
        extractor_dir: cli.extractor_dir.clone(),
        output_path: cli.output.clone(),
        failed_output_path: cli.failed_output.clone(),
    };

    validate(&config)?;

    Ok(config)
}

/// Runs the crawl and writes the output artifacts
async fn run(config: CrawlConfig) -> dragnet::Result<()> {
    tracing::info!(
        "starting crawl with {} seed(s), concurrency {}",
        config.seeds.len(),
        config.concurrency
    );

    let engine = CrawlEngine::new(&config)?;
    let report = engine.run().await;

    tracing::info!(
        "crawl complete: {} discovered, {} failed, {} seen",
        report.discovered.len(),
        report.failed.len(),
        report.seen_count
    );

    output::write_discovered(&config.output_path, &report.discovered)?;
    output::write_failed(&config.failed_output_path, &report.failed, &report.referrers)?;

    if let (Some(command), Some(body_dir), Some(extractor_dir)) = (
        &config.extractor_command,
        &config.body_dir,
        &config.extractor_dir,
    ) {
        let driver = ExtractorDriver {
            command: command.clone(),
            body_dir: body_dir.clone(),
            output_dir: extractor_dir.clone(),
        };
        driver.run(&report.html_hashes).await?;
    }

    Ok(())
}
