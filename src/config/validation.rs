use crate::config::CrawlConfig;
use crate::ConfigError;
use url::Url;

/// Validates a configuration before the crawl starts
///
/// Rejects configurations with no seeds, unparseable or non-http(s) seeds,
/// zero concurrency, and an extractor without the directories it needs.
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed).map_err(|_| ConfigError::InvalidUrl(seed.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(seed.clone()));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(seed.clone()));
        }
    }

    if config.concurrency == 0 {
        return Err(ConfigError::Validation(
            "concurrency must be at least 1".to_string(),
        ));
    }

    if config.extractor_command.is_some() {
        if config.body_dir.is_none() {
            return Err(ConfigError::Validation(
                "the extractor requires a body directory (body-dir)".to_string(),
            ));
        }
        if config.extractor_dir.is_none() {
            return Err(ConfigError::Validation(
                "the extractor requires an output directory (extractor-dir)".to_string(),
            ));
        }
    }

    if config.body_dir.is_some() && config.cache_dir.is_none() {
        return Err(ConfigError::Validation(
            "body-dir requires cache-dir".to_string(),
        ));
    }

    Ok(())
}
