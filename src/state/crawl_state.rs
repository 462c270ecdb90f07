/// Crawl lifecycle definitions
///
/// This module defines every state a crawl can be in once it has been built.
use std::fmt;

/// Represents the lifecycle state of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    // ===== Active States =====
    /// Options applied, not started yet
    Configured,

    /// Dispatch loop is pulling addresses from the queue
    Running,

    /// Abort requested; in-flight work is draining as no-ops
    Aborting,

    // ===== Terminal States =====
    /// Queue exhausted with nothing in flight
    Completed,

    /// Abort finished draining
    Aborted,
}

impl CrawlState {
    /// Returns true if the crawl will do no further work
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns true if no new address may be admitted or processed
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Aborting | Self::Aborted)
    }

    /// Checks whether moving to `next` is a legal transition
    ///
    /// ```text
    /// Configured -> Running -> Completed
    ///                  |
    ///                  +-> Aborting -> Aborted
    /// ```
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Configured, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Aborting)
                | (Self::Aborting, Self::Aborted)
        )
    }

    /// Lowercase name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Aborting => "aborting",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
