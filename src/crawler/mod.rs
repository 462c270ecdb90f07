//! Crawl engine
//!
//! This module contains the core crawling logic, including:
//! - The builder, the running crawl handle and its dispatch loop
//! - Admission control and in-flight tracking
//! - The HTTP transport and fetched pages
//! - Rule chains and the options that configure them
//! - HTML parsing for link-extraction rules

mod coordinator;
mod fetcher;
mod options;
mod parser;
pub mod rules;
mod scheduler;

pub use coordinator::{CrawlSummary, Crawler, CrawlerBuilder};
pub use fetcher::{build_http_client, build_request, HttpSettings, Page, Transport, DEFAULT_USER_AGENT};
pub use options::CrawlOption;
pub use parser::{parse_html, parse_title, ParsedPage};
pub use rules::{ErrorFn, FollowFn, RequestFn, ResponseFn};
