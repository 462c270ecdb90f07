//! Admission control and in-flight accounting
//!
//! This module handles:
//! - The admission pool: one semaphore permit per concurrent fetch
//! - The claim set: addresses admitted but not yet marked visited
//! - In-flight tracking: fetches, response handlers and pending re-queues,
//!   used to detect that no work is left anywhere

use dashmap::DashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Scheduler shared by the dispatch loop and every worker task
pub(crate) struct Scheduler {
    /// Admission tokens; a fetch holds one for its whole duration
    permits: Arc<Semaphore>,

    workers: usize,

    /// Addresses currently being fetched
    claimed: DashSet<String>,

    /// Units of outstanding work
    active: AtomicUsize,

    /// Woken whenever `active` drops to zero
    idle: Notify,
}

impl Scheduler {
    /// Creates a scheduler with `workers` admission tokens
    pub(crate) fn new(workers: usize) -> Arc<Self> {
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            claimed: DashSet::new(),
            active: AtomicUsize::new(0),
            idle: Notify::new(),
        })
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    /// Number of admission tokens not currently held
    pub(crate) fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for an admission token
    ///
    /// The token goes back to the pool when the permit is dropped, whatever
    /// path the holder exits through.
    pub(crate) async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }

    /// Returns true if the address is currently being fetched
    pub(crate) fn is_claimed(&self, url: &str) -> bool {
        self.claimed.contains(url)
    }

    /// Claims an address for the duration of its fetch
    ///
    /// Returns None if it is already claimed.
    pub(crate) fn claim(self: &Arc<Self>, url: &str) -> Option<Claim> {
        if !self.claimed.insert(url.to_string()) {
            return None;
        }

        Some(Claim {
            scheduler: Arc::clone(self),
            url: url.to_string(),
        })
    }

    /// Registers one unit of outstanding work
    pub(crate) fn enter(self: &Arc<Self>) -> InFlight {
        self.active.fetch_add(1, Ordering::AcqRel);
        InFlight {
            scheduler: Arc::clone(self),
        }
    }

    /// Units of outstanding work
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Resolves once no work is outstanding
    pub(crate) async fn wait_idle(&self) {
        loop {
            // Registered before the check, so a wakeup in between is not lost
            let notified = self.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// An address held in the claim set until dropped
pub(crate) struct Claim {
    scheduler: Arc<Scheduler>,
    url: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.scheduler.claimed.remove(&self.url);
    }
}

/// One unit of outstanding work, released on drop
pub(crate) struct InFlight {
    scheduler: Arc<Scheduler>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.scheduler.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.scheduler.idle.notify_waiters();
        }
    }
}
