//! Crawl options
//!
//! Every piece of crawl configuration is an option applied, in order, to a
//! `CrawlerBuilder`. Later options may override earlier ones or append rules.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::crawler::rules::{self, ErrorFn, FollowFn, RequestFn, ResponseFn};
use crate::crawler::{Crawler, CrawlerBuilder, Page, Transport};
use crate::queue::Queue;
use crate::state::{self, OriginPacingStore};
use crate::{ConfigError, CrawlError};

/// A single configuration step for a crawl
#[derive(Clone)]
pub enum CrawlOption {
    /// Seed addresses queued when the crawl starts
    StartUrls(Vec<String>),

    /// Follow only addresses matching at least one regular expression
    AllowPatterns(Vec<String>),

    /// Never follow addresses matching any regular expression
    ExcludePatterns(Vec<String>),

    /// Headers set on every outgoing request
    Headers(Vec<(String, String)>),

    /// Appends a follow rule
    Follow(FollowFn),

    /// Appends a request rule
    Request(RequestFn),

    /// Appends a response rule
    Response(ResponseFn),

    /// Minimum time between two requests to the same origin
    Delay(Duration),

    /// Maximum number of origins tracked by the pacing store
    PacingCapacity(usize),

    /// Maximum number of concurrent fetches
    Workers(usize),

    /// Replaces the work queue
    Queue(Arc<dyn Queue>),

    /// Replaces the duplicate filter
    DuplicateFilter(Arc<dyn state::DuplicateFilter>),

    /// Replaces the pacing store
    PacingStore(Arc<OriginPacingStore>),

    /// Replaces the HTTP transport
    Transport(Arc<dyn Transport>),

    /// Adds a consumer of reported errors
    OnError(ErrorFn),
}

impl CrawlOption {
    /// Wraps a closure as a follow rule
    pub fn follow<F>(rule: F) -> Self
    where
        F: Fn(&Crawler, &str) -> bool + Send + Sync + 'static,
    {
        Self::Follow(Arc::new(rule))
    }

    /// Wraps a closure as a request rule
    pub fn request<F>(rule: F) -> Self
    where
        F: Fn(&Crawler, &mut reqwest::Request) -> Result<(), CrawlError> + Send + Sync + 'static,
    {
        Self::Request(Arc::new(rule))
    }

    /// Wraps a closure as a response rule
    pub fn response<F>(rule: F) -> Self
    where
        F: Fn(&Crawler, &Page) -> bool + Send + Sync + 'static,
    {
        Self::Response(Arc::new(rule))
    }

    /// Wraps a closure as an error consumer
    pub fn on_error<F>(handler: F) -> Self
    where
        F: Fn(&CrawlError) + Send + Sync + 'static,
    {
        Self::OnError(Arc::new(handler))
    }

    /// Applies this option to a builder
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The builder was updated
    /// * `Err(ConfigError)` - The option is invalid; the builder must not be started
    pub(crate) fn apply(self, builder: &mut CrawlerBuilder) -> Result<(), ConfigError> {
        match self {
            CrawlOption::StartUrls(urls) => {
                for url in &urls {
                    Url::parse(url)
                        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", url, e)))?;
                }
                builder.seeds.extend(urls);
            }
            CrawlOption::AllowPatterns(patterns) => {
                let patterns = rules::compile_patterns(&patterns)?;
                builder.follow_rules.push(rules::allow_patterns(patterns));
            }
            CrawlOption::ExcludePatterns(patterns) => {
                let patterns = rules::compile_patterns(&patterns)?;
                builder.follow_rules.push(rules::exclude_patterns(patterns));
            }
            CrawlOption::Headers(headers) => {
                let headers = rules::parse_headers(&headers)?;
                builder.request_rules.push(rules::set_headers(headers));
            }
            CrawlOption::Follow(rule) => builder.follow_rules.push(rule),
            CrawlOption::Request(rule) => builder.request_rules.push(rule),
            CrawlOption::Response(rule) => builder.response_rules.push(rule),
            CrawlOption::Delay(delay) => {
                let capacity = builder.pacing.capacity();
                builder.pacing = Arc::new(OriginPacingStore::new(capacity, delay));
                install_pacing(builder);
            }
            CrawlOption::PacingCapacity(capacity) => {
                if capacity == 0 {
                    return Err(ConfigError::Validation(
                        "pacing capacity must be at least 1".to_string(),
                    ));
                }
                let window = builder.pacing.window();
                builder.pacing = Arc::new(OriginPacingStore::new(capacity, window));
            }
            CrawlOption::Workers(workers) => {
                if workers == 0 {
                    return Err(ConfigError::Validation(
                        "workers must be at least 1".to_string(),
                    ));
                }
                builder.workers = workers;
            }
            CrawlOption::Queue(queue) => builder.queue = queue,
            CrawlOption::DuplicateFilter(filter) => builder.filter = filter,
            CrawlOption::PacingStore(store) => {
                builder.pacing = store;
                install_pacing(builder);
            }
            CrawlOption::Transport(transport) => builder.transport = Some(transport),
            CrawlOption::OnError(handler) => builder.error_handlers.push(handler),
        }

        Ok(())
    }
}

/// Appends the pacing follow rule unless an earlier option already did
fn install_pacing(builder: &mut CrawlerBuilder) {
    if !builder.pacing_installed {
        builder.follow_rules.push(rules::pacing());
        builder.pacing_installed = true;
    }
}

impl fmt::Debug for CrawlOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlOption::StartUrls(urls) => f.debug_tuple("StartUrls").field(urls).finish(),
            CrawlOption::AllowPatterns(p) => f.debug_tuple("AllowPatterns").field(p).finish(),
            CrawlOption::ExcludePatterns(p) => f.debug_tuple("ExcludePatterns").field(p).finish(),
            CrawlOption::Headers(h) => f.debug_tuple("Headers").field(h).finish(),
            CrawlOption::Follow(_) => f.write_str("Follow(..)"),
            CrawlOption::Request(_) => f.write_str("Request(..)"),
            CrawlOption::Response(_) => f.write_str("Response(..)"),
            CrawlOption::Delay(d) => f.debug_tuple("Delay").field(d).finish(),
            CrawlOption::PacingCapacity(c) => f.debug_tuple("PacingCapacity").field(c).finish(),
            CrawlOption::Workers(n) => f.debug_tuple("Workers").field(n).finish(),
            CrawlOption::Queue(_) => f.write_str("Queue(..)"),
            CrawlOption::DuplicateFilter(_) => f.write_str("DuplicateFilter(..)"),
            CrawlOption::PacingStore(_) => f.write_str("PacingStore(..)"),
            CrawlOption::Transport(_) => f.write_str("Transport(..)"),
            CrawlOption::OnError(_) => f.write_str("OnError(..)"),
        }
    }
}
