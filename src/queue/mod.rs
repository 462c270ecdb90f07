//! Work queue of addresses waiting to be dispatched
//!
//! The engine only needs a queue to accept addresses, hand them out one at a
//! time, and report exhaustion once closed and drained. `DefaultQueue` is the
//! hybrid implementation used unless an option replaces it.

mod hybrid;

pub use hybrid::{DefaultQueue, DEFAULT_OVERFLOW_LIMIT, DEFAULT_QUEUE_CAPACITY};

use async_trait::async_trait;

/// Queue of addresses consumed by the dispatch loop
#[async_trait]
pub trait Queue: Send + Sync {
    /// Accepts an address; silently ignored once the queue is closed
    ///
    /// Must never block the caller.
    fn add(&self, url: String);

    /// Returns the next address, waiting for one if necessary
    ///
    /// Returns None only once the queue is exhausted: closed and empty.
    async fn get(&self) -> Option<String>;

    /// Stops accepting new addresses
    ///
    /// Addresses already buffered are still handed out by `get`.
    fn close(&self);

    /// Returns true once `close` has been called
    fn is_closed(&self) -> bool;

    /// Number of buffered addresses
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of addresses discarded instead of buffered
    fn dropped(&self) -> u64 {
        0
    }
}
