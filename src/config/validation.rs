use crate::config::types::{Config, CrawlerConfig, FiltersConfig, OutputConfig, SeedsConfig};
use crate::crawler::rules::{compile_patterns, parse_headers};
use crate::ConfigError;
use std::collections::BTreeMap;
use url::Url;

/// Validates the entire configuration
///
/// List files are checked when the configuration is turned into options,
/// since their content is only read then.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_seeds(&config.seeds)?;
    validate_filters(&config.filters)?;
    validate_headers(&config.headers)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(workers) = config.workers {
        if !(1..=1024).contains(&workers) {
            return Err(ConfigError::Validation(format!(
                "workers must be between 1 and 1024, got {}",
                workers
            )));
        }
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(
            "queue-capacity must be >= 1".to_string(),
        ));
    }

    if config.pacing_capacity < 1 {
        return Err(ConfigError::Validation(
            "pacing-capacity must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_seeds(seeds: &SeedsConfig) -> Result<(), ConfigError> {
    if seeds.urls.is_empty() && seeds.file.is_none() {
        return Err(ConfigError::Validation(
            "at least one seed URL or a seed file is required".to_string(),
        ));
    }

    for seed in &seeds.urls {
        validate_seed_url(seed)?;
    }

    Ok(())
}

/// Seeds must be absolute HTTP(S) URLs
pub(crate) fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use HTTP or HTTPS",
            seed
        )));
    }

    Ok(())
}

fn validate_filters(filters: &FiltersConfig) -> Result<(), ConfigError> {
    compile_patterns(&filters.allow)?;
    compile_patterns(&filters.exclude)?;
    Ok(())
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    let pairs: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    parse_headers(&pairs)?;
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.database_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "database-path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
