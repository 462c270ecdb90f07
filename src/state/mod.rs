//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: Lifecycle of a crawl (running, aborting, completed, ...)
//! - `DuplicateFilter`: Which addresses have already been attempted
//! - `OriginPacingStore`: When each origin was last requested, for pacing

mod crawl_state;
mod dup_filter;
mod origin_pacing;

// Re-export main types
pub use crawl_state::CrawlState;
pub use dup_filter::{DuplicateFilter, InMemoryDupFilter};
pub use origin_pacing::{OriginPacingStore, Pacing, PacingError, DEFAULT_PACING_CAPACITY};
