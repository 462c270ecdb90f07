use serde::Deserialize;
use std::collections::BTreeMap;

use crate::crawler::DEFAULT_USER_AGENT;
use crate::queue::{DEFAULT_OVERFLOW_LIMIT, DEFAULT_QUEUE_CAPACITY};
use crate::state::DEFAULT_PACING_CAPACITY;

/// Main configuration structure for a crawl run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub seeds: SeedsConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    /// Headers set on every request, in name order
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent fetches; defaults to the CPU count
    pub workers: Option<usize>,

    /// Minimum time between requests to the same origin (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Bounded fast-path capacity of the work queue
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Maximum number of addresses held in the queue's overflow
    #[serde(rename = "overflow-limit")]
    pub overflow_limit: usize,

    /// Maximum number of origins tracked for pacing
    #[serde(rename = "pacing-capacity")]
    pub pacing_capacity: usize,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total timeout for one request (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            delay_ms: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_limit: DEFAULT_OVERFLOW_LIMIT,
            pacing_capacity: DEFAULT_PACING_CAPACITY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Where seed addresses come from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedsConfig {
    #[serde(default)]
    pub urls: Vec<String>,

    /// Newline-separated list of seed addresses
    pub file: Option<String>,
}

/// Address filters, as regular expressions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltersConfig {
    /// If not empty, only matching addresses are followed
    #[serde(default)]
    pub allow: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Newline-separated list of exclusion patterns
    #[serde(rename = "exclude-file")]
    pub exclude_file: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database receiving one row per page
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,

    /// Print "URL STATUS" for every page
    pub print: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            print: true,
        }
    }
}
