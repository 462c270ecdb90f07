//! Record sink trait and associated types
//!
//! This module defines the trait interface for sinks receiving one record
//! per fetched page.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::crawler::Page;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// What is recorded about a fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// The requested address
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Page title, for HTML pages that have one
    pub title: Option<String>,

    /// Content type header, if any
    pub content_type: Option<String>,

    pub fetched_at: DateTime<Utc>,
}

impl PageRecord {
    /// Builds the record for a page, stamped with the current time
    pub fn from_page(page: &Page, title: Option<String>) -> Self {
        Self {
            url: page.url.clone(),
            status: page.status.as_u16(),
            title,
            content_type: page.content_type().map(String::from),
            fetched_at: Utc::now(),
        }
    }
}

/// Destination for page records
///
/// Sinks are shared between response tasks, so implementations must be
/// thread-safe.
pub trait RecordSink: Send + Sync {
    /// Records one fetched page
    fn record(&self, record: &PageRecord) -> OutputResult<()>;

    /// Writes out anything still buffered
    fn flush(&self) -> OutputResult<()> {
        Ok(())
    }
}
