//! Rule chains
//!
//! Three kinds of rules drive a crawl, each kept in an ordered list that is
//! frozen once the crawl starts:
//! - Follow rules decide whether an address is admitted. All must agree; the
//!   first refusal stops evaluation.
//! - Request rules shape the outgoing request. The first error aborts it.
//! - Response rules handle a fetched page. Returning false halts the rest of
//!   the chain for that page, without being an error.

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Request;
use std::sync::Arc;
use url::Url;

use crate::crawler::{parse_html, Crawler, Page};
use crate::url::origin_of;
use crate::{ConfigError, CrawlError};

/// Decides whether an address should be admitted
pub type FollowFn = Arc<dyn Fn(&Crawler, &str) -> bool + Send + Sync>;

/// Mutates an outgoing request
pub type RequestFn = Arc<dyn Fn(&Crawler, &mut Request) -> Result<(), CrawlError> + Send + Sync>;

/// Handles a fetched page; false stops the remaining handlers
pub type ResponseFn = Arc<dyn Fn(&Crawler, &Page) -> bool + Send + Sync>;

/// Receives every error reported during the crawl
pub type ErrorFn = Arc<dyn Fn(&CrawlError) + Send + Sync>;

/// Compiles a list of regular expressions
///
/// # Returns
///
/// * `Ok(Vec<Regex>)` - All patterns compiled
/// * `Err(ConfigError::InvalidPattern)` - The first pattern that failed
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
        })
        .collect()
}

/// Follows only addresses matching at least one pattern
///
/// Addresses that do not parse as URLs are never followed. Patterns are
/// matched against the parsed, serialized URL.
pub fn allow_patterns(patterns: Vec<Regex>) -> FollowFn {
    Arc::new(move |_crawler: &Crawler, address: &str| {
        let Ok(url) = Url::parse(address) else {
            return false;
        };

        let allowed = patterns.iter().any(|re| re.is_match(url.as_str()));
        if !allowed {
            tracing::trace!("{} matches no allow pattern", address);
        }
        allowed
    })
}

/// Refuses addresses matching any pattern
pub fn exclude_patterns(patterns: Vec<Regex>) -> FollowFn {
    Arc::new(move |_crawler: &Crawler, address: &str| {
        let Ok(url) = Url::parse(address) else {
            return false;
        };

        match patterns.iter().find(|re| re.is_match(url.as_str())) {
            Some(re) => {
                tracing::trace!("{} excluded by pattern {}", address, re.as_str());
                false
            }
            None => true,
        }
    })
}

/// Parses header name/value pairs
pub fn parse_headers(headers: &[(String, String)]) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::Validation(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("Invalid value for header '{}': {}", name, e))
        })?;
        map.insert(name, value);
    }

    Ok(map)
}

/// Sets every header on the outgoing request, replacing existing values
pub fn set_headers(headers: HeaderMap) -> RequestFn {
    Arc::new(move |_crawler: &Crawler, request: &mut Request| -> Result<(), CrawlError> {
        for (name, value) in headers.iter() {
            request.headers_mut().insert(name.clone(), value.clone());
        }
        Ok(())
    })
}

/// Defers addresses whose origin is still inside its pacing window
///
/// Only reads the pacing store. The crawler records the request when it is
/// actually sent, and pushes the address back again if another request to the
/// origin went out in the meantime. This rule keeps such addresses from
/// taking up a worker while they wait.
pub fn pacing() -> FollowFn {
    Arc::new(|crawler: &Crawler, address: &str| {
        let origin = match origin_of(address) {
            Ok(origin) => origin,
            Err(e) => {
                crawler.report(e.into());
                return false;
            }
        };

        match crawler.pacing().time_until_permitted(&origin) {
            None => true,
            Some(wait) => {
                tracing::trace!("Origin {} paced, retrying {} in {:?}", origin, address, wait);
                crawler.push_back(address, wait);
                false
            }
        }
    })
}

/// Halts the response chain for anything but HTML documents
pub fn html_only() -> ResponseFn {
    Arc::new(|_crawler: &Crawler, page: &Page| {
        let html = page.is_html();
        if !html {
            tracing::trace!(
                "Not following links of {} ({})",
                page.url,
                page.content_type().unwrap_or("no content type")
            );
        }
        html
    })
}

/// Queues every followable link found on an HTML page
///
/// Links resolve against the page's final URL, after redirects.
pub fn follow_links() -> ResponseFn {
    Arc::new(|crawler: &Crawler, page: &Page| {
        let parsed = parse_html(&page.text(), &page.final_url);
        tracing::debug!("Found {} links on {}", parsed.links.len(), page.url);

        for link in parsed.links {
            crawler.add(link);
        }
        true
    })
}
