//! Trawl: a rule-driven concurrent crawl engine
//!
//! This crate implements a generic crawling engine. Seed addresses go into a
//! work queue, a dispatch loop admits them through a chain of follow rules,
//! a bounded pool of workers fetches them, and every response is handed to a
//! chain of response rules that may discover more addresses.

pub mod config;
pub mod crawler;
pub mod output;
pub mod queue;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
///
/// Per-request errors are never fatal to the engine. They are reported to the
/// error sink and only end processing of the address they belong to.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to read body of {url}: {source}")]
    Body { url: String, source: reqwest::Error },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Rule rejected {url}: {message}")]
    Rule { url: String, message: String },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

impl CrawlError {
    /// Builds a rule error for the given address
    pub fn rule(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rule {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Configuration-specific errors
///
/// These are fatal: they abort the configuration step before the crawl starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOption, CrawlSummary, Crawler, CrawlerBuilder, Page};
pub use queue::{DefaultQueue, Queue};
pub use state::{CrawlState, DuplicateFilter, InMemoryDupFilter, OriginPacingStore};
pub use crate::url::{origin_of, resolve_link};
