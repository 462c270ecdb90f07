//! HTTP transport and fetched pages
//!
//! This module handles the network side of the crawler:
//! - The `Transport` capability the engine sends requests through
//! - Building the default HTTP client
//! - Building the outgoing GET request for an address
//! - `Page`, the buffered response handed to response rules

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, Request, Response, StatusCode};
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

use crate::CrawlError;

/// User agent sent by the default client
pub const DEFAULT_USER_AGENT: &str = concat!("trawl/", env!("CARGO_PKG_VERSION"));

/// Sends requests on behalf of the engine
///
/// Timeouts, redirects, TLS and compression are the transport's business.
/// The engine only sees a response or an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, reqwest::Error>;
}

#[async_trait]
impl Transport for Client {
    async fn send(&self, request: Request) -> Result<Response, reqwest::Error> {
        self.execute(request).await
    }
}

/// Settings for the default HTTP client
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `settings` - User agent and timeouts
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use trawl::crawler::{build_http_client, HttpSettings};
///
/// let client = build_http_client(&HttpSettings::default()).unwrap();
/// ```
pub fn build_http_client(settings: &HttpSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds the GET request for an address, before request rules run
pub fn build_request(address: &str) -> Result<Request, CrawlError> {
    let url = Url::parse(address).map_err(|source| CrawlError::InvalidUrl {
        url: address.to_string(),
        source,
    })?;

    Ok(Request::new(Method::GET, url))
}

/// The parts of the outgoing request kept for response rules
#[derive(Debug, Clone)]
pub(crate) struct SentRequest {
    pub address: String,
    pub method: Method,
    pub headers: HeaderMap,
}

impl SentRequest {
    pub(crate) fn from_request(address: &str, request: &Request) -> Self {
        Self {
            address: address.to_string(),
            method: request.method().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// A completed fetch, as seen by response rules
#[derive(Debug, Clone)]
pub struct Page {
    /// The address that was dispatched
    pub url: String,

    /// Method of the originating request
    pub method: Method,

    /// Headers of the originating request, after request rules
    pub request_headers: HeaderMap,

    /// URL of the response, after any redirects the transport followed
    pub final_url: Url,

    /// HTTP status code
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,

    /// Raw response body
    pub body: Vec<u8>,
}

impl Page {
    /// Reads the rest of a response into a page
    pub(crate) async fn read(request: SentRequest, response: Response) -> Result<Self, CrawlError> {
        let final_url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(|source| CrawlError::Body {
            url: request.address.clone(),
            source,
        })?;

        Ok(Self {
            url: request.address,
            method: request.method,
            request_headers: request.headers,
            final_url,
            status,
            headers,
            body: body.to_vec(),
        })
    }

    /// Content-Type header value, if present and valid
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Returns true if the response declares an HTML document
    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml+xml"))
            .unwrap_or(false)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
