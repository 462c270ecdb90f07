//! Duplicate-visit filter
//!
//! Records which addresses have been attempted so the engine never dispatches
//! the same address twice over the lifetime of a crawl.

use dashmap::DashSet;

/// Two-operation capability used by the engine to skip visited addresses
///
/// Implementations must be safe under concurrent access from every worker.
/// Once an address is marked, `has_visited` must return true for it forever.
pub trait DuplicateFilter: Send + Sync {
    /// Marks an address as visited
    fn visited(&self, url: &str);

    /// Returns true if the address has been marked
    fn has_visited(&self, url: &str) -> bool;
}

/// In-memory duplicate filter
///
/// Backed by a concurrent set with no eviction. Memory grows with the number
/// of distinct addresses attempted.
#[derive(Debug, Default)]
pub struct InMemoryDupFilter {
    visited: DashSet<String>,
}

impl InMemoryDupFilter {
    /// Creates an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct addresses marked so far
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

impl DuplicateFilter for InMemoryDupFilter {
    fn visited(&self, url: &str) {
        if !self.visited.contains(url) {
            self.visited.insert(url.to_string());
        }
    }

    fn has_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }
}
