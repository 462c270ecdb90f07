//! Run summary printed when a crawl finishes

use std::fmt::Write;

use crate::crawler::CrawlSummary;

/// Formats the run summary as printed by [`print_summary`]
pub fn format_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "=== Crawl Summary ===\n");
    let _ = writeln!(out, "State: {}", summary.state);
    let _ = writeln!(out, "Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    let _ = writeln!(out);

    let _ = writeln!(out, "Addresses:");
    let _ = writeln!(out, "  Dispatched: {}", summary.dispatched);
    let _ = writeln!(out, "  Rejected: {}", summary.rejected);
    let _ = writeln!(out, "  Re-queued: {}", summary.requeued);
    if summary.dropped > 0 {
        let _ = writeln!(out, "  Dropped (queue full): {}", summary.dropped);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages:");
    let _ = writeln!(out, "  Fetched: {}", summary.fetched);
    let _ = writeln!(out, "  Processed: {}", summary.processed);
    let _ = writeln!(out, "  Errors: {}", summary.errors);

    let rate = if summary.elapsed.as_secs_f64() > 0.0 {
        summary.fetched as f64 / summary.elapsed.as_secs_f64()
    } else {
        0.0
    };
    let _ = writeln!(out, "\nThroughput: {:.2} pages/s", rate);

    out
}

/// Prints the run summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    print!("{}", format_summary(summary));
}
