//! Output module for recording fetched pages and run summaries
//!
//! This module handles:
//! - Recording one row per fetched page to SQLite
//! - Printing "URL STATUS" lines as pages arrive
//! - Printing the final run summary

mod sqlite_output;
mod stdout;
mod summary;
mod traits;

pub use sqlite_output::SqliteSink;
pub use stdout::StdoutSink;
pub use summary::{format_summary, print_summary};
pub use traits::{OutputError, OutputResult, PageRecord, RecordSink};

use std::sync::Arc;

use crate::crawler::{parse_title, Crawler, Page, ResponseFn};
use crate::CrawlError;

/// Turns a sink into a response rule
///
/// The rule records every page it sees and never halts the chain. A failed
/// write is reported to the crawl's error sink.
pub fn record_rule(sink: Arc<dyn RecordSink>) -> ResponseFn {
    Arc::new(move |crawler: &Crawler, page: &Page| {
        let title = if page.is_html() {
            parse_title(&page.text())
        } else {
            None
        };

        if let Err(e) = sink.record(&PageRecord::from_page(page, title)) {
            crawler.report(CrawlError::Output(e));
        }
        true
    })
}
