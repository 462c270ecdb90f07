//! Configuration for the command-line crawler
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turning them into crawl options.
//!
//! # Example
//!
//! ```no_run
//! use trawl::config::load_config;
//! use trawl::Crawler;
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(Path::new("crawl.toml"))?;
//! let crawler = Crawler::builder().options(config.to_options()?)?.start()?;
//! crawler.wait().await;
//! # Ok(())
//! # }
//! ```

mod parser;
mod types;
mod validation;

pub use parser::{load_config, parse_config, read_list_file};
pub use types::{Config, CrawlerConfig, FiltersConfig, OutputConfig, SeedsConfig};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::crawler::{build_http_client, CrawlOption, HttpSettings};
use crate::queue::DefaultQueue;
use crate::ConfigError;

impl Config {
    /// Converts the configuration into crawl options
    ///
    /// Reads the seed and exclusion list files, if any, and builds the HTTP
    /// client. Output settings are left to the caller.
    pub fn to_options(&self) -> Result<Vec<CrawlOption>, ConfigError> {
        let crawler = &self.crawler;
        let mut options = Vec::new();

        let settings = HttpSettings {
            user_agent: crawler.user_agent.clone(),
            timeout: Duration::from_secs(crawler.timeout_secs),
            ..HttpSettings::default()
        };
        let client = build_http_client(&settings)
            .map_err(|e| ConfigError::Validation(format!("Failed to build HTTP client: {}", e)))?;
        options.push(CrawlOption::Transport(Arc::new(client)));

        options.push(CrawlOption::Queue(Arc::new(DefaultQueue::with_overflow_limit(
            crawler.queue_capacity,
            crawler.overflow_limit,
        ))));

        if let Some(workers) = crawler.workers {
            options.push(CrawlOption::Workers(workers));
        }
        options.push(CrawlOption::PacingCapacity(crawler.pacing_capacity));

        let mut seeds = self.seeds.urls.clone();
        if let Some(file) = &self.seeds.file {
            let listed = read_list_file(Path::new(file))?;
            for seed in &listed {
                validation::validate_seed_url(seed)?;
            }
            seeds.extend(listed);
        }
        options.push(CrawlOption::StartUrls(seeds));

        if !self.filters.allow.is_empty() {
            options.push(CrawlOption::AllowPatterns(self.filters.allow.clone()));
        }

        let mut exclude = self.filters.exclude.clone();
        if let Some(file) = &self.filters.exclude_file {
            exclude.extend(read_list_file(Path::new(file))?);
        }
        if !exclude.is_empty() {
            options.push(CrawlOption::ExcludePatterns(exclude));
        }

        if !self.headers.is_empty() {
            options.push(CrawlOption::Headers(
                self.headers
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            ));
        }

        // Last, so the pacing rule runs after every filter
        if crawler.delay_ms > 0 {
            options.push(CrawlOption::Delay(Duration::from_millis(crawler.delay_ms)));
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn count(options: &[CrawlOption], name: &str) -> usize {
        options
            .iter()
            .filter(|o| format!("{:?}", o).starts_with(name))
            .count()
    }

    #[test]
    fn test_minimal_config_options() {
        let config = parse_config(
            r#"
[seeds]
urls = ["https://example.com/"]
"#,
        )
        .unwrap();

        let options = config.to_options().unwrap();
        assert_eq!(count(&options, "Transport"), 1);
        assert_eq!(count(&options, "Queue"), 1);
        assert_eq!(count(&options, "StartUrls"), 1);
        assert_eq!(count(&options, "Workers"), 0);
        assert_eq!(count(&options, "Delay"), 0);
        assert_eq!(count(&options, "AllowPatterns"), 0);
        assert_eq!(count(&options, "Headers"), 0);
    }

    #[tokio::test]
    async fn test_options_apply_to_builder() {
        let config = parse_config(
            r#"
[crawler]
workers = 3
delay-ms = 250

[seeds]
urls = ["https://example.com/"]

[filters]
allow = ["example\\.com"]
exclude = ["/private/"]

[headers]
Accept = "text/html"
"#,
        )
        .unwrap();

        let builder = crate::Crawler::builder()
            .options(config.to_options().unwrap())
            .unwrap();
        assert_eq!(builder.workers(), 3);
    }

    #[test]
    fn test_list_files_are_merged() {
        let mut seeds = NamedTempFile::new().unwrap();
        writeln!(seeds, "https://a.test/\nhttps://b.test/").unwrap();
        let mut exclusions = NamedTempFile::new().unwrap();
        writeln!(exclusions, "\\.zip$").unwrap();

        let config = parse_config(&format!(
            r#"
[seeds]
urls = ["https://example.com/"]
file = "{}"

[filters]
exclude-file = "{}"
"#,
            seeds.path().display(),
            exclusions.path().display()
        ))
        .unwrap();

        let options = config.to_options().unwrap();
        let seeds = options
            .iter()
            .find_map(|o| match o {
                CrawlOption::StartUrls(urls) => Some(urls.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            seeds,
            vec!["https://example.com/", "https://a.test/", "https://b.test/"]
        );
        assert_eq!(count(&options, "ExcludePatterns"), 1);
    }

    #[test]
    fn test_invalid_seed_in_file() {
        let mut seeds = NamedTempFile::new().unwrap();
        writeln!(seeds, "not a url").unwrap();

        let config = parse_config(&format!(
            "[seeds]\nfile = \"{}\"\n",
            seeds.path().display()
        ))
        .unwrap();

        assert!(matches!(
            config.to_options(),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
