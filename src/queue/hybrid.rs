//! Hybrid work queue
//!
//! Three tiers, tried in order by `add`:
//! 1. Rendezvous: hand the address straight to a consumer parked in `get`
//! 2. Fast path: a bounded buffer
//! 3. Overflow: an ordered buffer that absorbs bursts, up to a hard limit
//!
//! `get` serves the fast path, refilling it from overflow, and parks only
//! when both are empty. FIFO holds across both buffers; a handoff can only
//! happen while the buffers are empty, so it never overtakes buffered work.

use crate::queue::Queue;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Default capacity of the fast-path buffer
pub const DEFAULT_QUEUE_CAPACITY: usize = 65_535;

/// Default maximum number of addresses held in overflow
pub const DEFAULT_OVERFLOW_LIMIT: usize = 1_000_000;

#[derive(Debug)]
struct QueueState {
    open: bool,
    fast: VecDeque<String>,
    overflow: VecDeque<String>,

    /// Consumers parked in `get`, oldest first
    waiters: VecDeque<oneshot::Sender<String>>,

    /// Addresses refused because overflow was at its limit
    dropped: u64,

    /// Overflow hit its limit and has not taken an address since
    saturated: bool,
}

impl QueueState {
    /// Gives the address to the oldest live waiter, or returns it
    fn try_handoff(&mut self, mut url: String) -> Result<(), String> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(url) {
                Ok(()) => return Ok(()),
                // The consumer went away; try the next one
                Err(returned) => url = returned,
            }
        }
        Err(url)
    }

    /// Moves as many overflow entries as fit into the fast path
    fn refill(&mut self, capacity: usize) {
        while self.fast.len() < capacity {
            match self.overflow.pop_front() {
                Some(url) => self.fast.push_back(url),
                None => break,
            }
        }
    }

    fn pop(&mut self, capacity: usize) -> Option<String> {
        if self.fast.is_empty() {
            self.refill(capacity);
        }
        let url = self.fast.pop_front()?;
        self.refill(capacity);
        Some(url)
    }

    fn len(&self) -> usize {
        self.fast.len() + self.overflow.len()
    }
}

/// Default hybrid queue
#[derive(Debug)]
pub struct DefaultQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    overflow_limit: usize,
}

impl DefaultQueue {
    /// Creates an open queue with the given fast-path capacity
    pub fn new(capacity: usize) -> Self {
        Self::with_overflow_limit(capacity, DEFAULT_OVERFLOW_LIMIT)
    }

    /// Creates an open queue with explicit fast-path and overflow bounds
    ///
    /// A zero capacity is raised to one.
    pub fn with_overflow_limit(capacity: usize, overflow_limit: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                open: true,
                fast: VecDeque::new(),
                overflow: VecDeque::new(),
                waiters: VecDeque::new(),
                dropped: 0,
                saturated: false,
            }),
            capacity: capacity.max(1),
            overflow_limit,
        }
    }

    /// Number of addresses currently in overflow
    pub fn overflow_len(&self) -> usize {
        self.lock().overflow.len()
    }

    /// Puts back an address that was handed to a consumer which went away
    /// before taking it
    fn restore(&self, url: String) {
        let mut state = self.lock();
        let url = match state.try_handoff(url) {
            Ok(()) => return,
            Err(url) => url,
        };

        state.fast.push_front(url);
        if state.fast.len() > self.capacity {
            if let Some(last) = state.fast.pop_back() {
                state.overflow.push_front(last);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for DefaultQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[async_trait]
impl Queue for DefaultQueue {
    fn add(&self, url: String) {
        let mut state = self.lock();

        if !state.open {
            tracing::trace!("Queue closed, ignoring {}", url);
            return;
        }

        let url = match state.try_handoff(url) {
            Ok(()) => return,
            Err(url) => url,
        };

        if state.overflow.is_empty() && state.fast.len() < self.capacity {
            state.fast.push_back(url);
            return;
        }

        if state.overflow.len() >= self.overflow_limit {
            state.dropped += 1;
            if state.saturated {
                tracing::trace!("Queue overflow full, dropping {}", url);
            } else {
                state.saturated = true;
                tracing::warn!(
                    "Queue overflow reached its limit of {}, dropping new addresses until it drains",
                    self.overflow_limit
                );
            }
            return;
        }

        state.saturated = false;
        state.overflow.push_back(url);
    }

    async fn get(&self) -> Option<String> {
        let receiver = {
            let mut state = self.lock();

            if let Some(url) = state.pop(self.capacity) {
                return Some(url);
            }

            if !state.open {
                return None;
            }

            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            receiver
        };

        let mut parked = ParkedGet {
            receiver,
            queue: self,
        };

        // An error means every sender was dropped, which only `close` does
        (&mut parked.receiver).await.ok()
    }

    fn close(&self) {
        let mut state = self.lock();
        state.open = false;

        // Waiters only exist while both buffers are empty, so the queue is
        // exhausted for every one of them
        state.waiters.clear();
    }

    fn is_closed(&self) -> bool {
        !self.lock().open
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

/// A consumer parked in `get`
///
/// If the `get` future is dropped after an address was handed over but
/// before it was taken, the address goes back to the front of the queue.
struct ParkedGet<'a> {
    receiver: oneshot::Receiver<String>,
    queue: &'a DefaultQueue,
}

impl Drop for ParkedGet<'_> {
    fn drop(&mut self) {
        self.receiver.close();
        if let Ok(url) = self.receiver.try_recv() {
            self.queue.restore(url);
        }
    }
}
