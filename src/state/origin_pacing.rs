//! Per-origin pacing store
//!
//! Tracks, for every origin, the instant of the last permitted request. The
//! crawler checks it right before each request goes out, so requests to one
//! origin start at least one window apart.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default number of origins tracked at once
pub const DEFAULT_PACING_CAPACITY: usize = 2048;

/// Errors returned when a record cannot be created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacingError {
    /// Every record is still inside its window, so none can be evicted
    #[error("pacing store is full, oldest record expires in {retry_after:?}")]
    Full { retry_after: Duration },
}

/// Outcome of a pacing check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// The request may go out now; the origin's record was set to now
    Permitted,

    /// The origin was requested too recently; try again after this long
    Wait(Duration),
}

/// Records plus their recency index, always mutated together
#[derive(Debug, Default)]
struct PacingIndex {
    records: HashMap<String, Instant>,

    /// (last permitted instant, origin), stalest first
    recency: BTreeSet<(Instant, String)>,
}

/// Time left before the window that started at `last` elapses, or `None`
/// once it has
fn remaining(last: Instant, window: Duration, now: Instant) -> Option<Duration> {
    match last.checked_add(window) {
        Some(end) if end > now => Some(end - now),
        Some(_) => None,
        // Past the clock's range, so the window never elapses
        None => Some(window.saturating_sub(now.saturating_duration_since(last))),
    }
}

impl PacingIndex {
    fn set(&mut self, origin: &str, previous: Option<Instant>, next: Instant) {
        if let Some(previous) = previous {
            self.recency.remove(&(previous, origin.to_string()));
        }
        self.recency.insert((next, origin.to_string()));
        self.records.insert(origin.to_string(), next);
    }

    /// Evicts expired records from the stalest end, stopping at the first one
    /// still inside its window
    fn evict_expired(&mut self, window: Duration, now: Instant) -> usize {
        let mut evicted = 0;

        while let Some((last, origin)) = self.recency.first().cloned() {
            if remaining(last, window, now).is_some() {
                break;
            }
            self.recency.remove(&(last, origin.clone()));
            self.records.remove(&origin);
            evicted += 1;
        }

        evicted
    }

    fn stalest(&self) -> Option<Instant> {
        self.recency.first().map(|(last, _)| *last)
    }
}

/// Bounded map from origin to last permitted request instant
///
/// All mutation happens under a single lock so that a pacing check can read,
/// decide and write without another worker slipping in between.
#[derive(Debug)]
pub struct OriginPacingStore {
    index: Mutex<PacingIndex>,
    capacity: usize,
    window: Duration,
}

impl OriginPacingStore {
    /// Creates a new store
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of origins held at once
    /// * `window` - Minimum time between two permitted requests to one origin
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            index: Mutex::new(PacingIndex::default()),
            capacity,
            window,
        }
    }

    /// The pacing window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the last permitted instant for an origin, if recorded
    pub fn get(&self, origin: &str) -> Option<Instant> {
        self.lock().records.get(origin).copied()
    }

    /// Sets the origin's instant regardless of any existing value
    pub fn set(&self, origin: &str, at: Instant) -> Result<(), PacingError> {
        self.update_at(origin, at, |_| at).map(|_| ())
    }

    /// Atomically transforms the origin's record, creating it if absent
    ///
    /// See [`OriginPacingStore::update_at`].
    pub fn update<F>(&self, origin: &str, f: F) -> Result<Instant, PacingError>
    where
        F: FnOnce(Option<Instant>) -> Instant,
    {
        self.update_at(origin, Instant::now(), f)
    }

    /// Atomically transforms the origin's record, creating it if absent
    ///
    /// `now` is only used to decide which records may be evicted when a new
    /// origin has to be inserted into a full store. If no record has left its
    /// window the insertion is refused and nothing is evicted.
    ///
    /// # Returns
    ///
    /// * `Ok(Instant)` - The value now stored for the origin
    /// * `Err(PacingError::Full)` - The origin is new and the store is full
    pub fn update_at<F>(&self, origin: &str, now: Instant, f: F) -> Result<Instant, PacingError>
    where
        F: FnOnce(Option<Instant>) -> Instant,
    {
        let mut index = self.lock();

        if let Some(previous) = index.records.get(origin).copied() {
            let next = f(Some(previous));
            index.set(origin, Some(previous), next);
            return Ok(next);
        }

        if index.records.len() >= self.capacity {
            let evicted = index.evict_expired(self.window, now);
            tracing::trace!("Evicted {} expired pacing records", evicted);

            if index.records.len() >= self.capacity {
                let retry_after = index
                    .stalest()
                    .and_then(|last| remaining(last, self.window, now))
                    .unwrap_or(self.window);
                return Err(PacingError::Full { retry_after });
            }
        }

        let next = f(None);
        index.set(origin, None, next);
        Ok(next)
    }

    /// Checks whether a request to the origin may go out now, and records it
    /// if so
    pub fn try_acquire(&self, origin: &str) -> Pacing {
        self.try_acquire_at(origin, Instant::now())
    }

    /// Same as [`OriginPacingStore::try_acquire`] with an explicit clock
    pub fn try_acquire_at(&self, origin: &str, now: Instant) -> Pacing {
        let window = self.window;
        let mut wait = None;

        let result = self.update_at(origin, now, |previous| match previous {
            Some(last) => match remaining(last, window, now) {
                Some(left) => {
                    wait = Some(left);
                    last
                }
                None => now,
            },
            None => now,
        });

        match (result, wait) {
            (Err(PacingError::Full { retry_after }), _) => Pacing::Wait(retry_after),
            (Ok(_), Some(wait)) => Pacing::Wait(wait),
            (Ok(_), None) => Pacing::Permitted,
        }
    }

    /// How long until a request to the origin would be permitted, without
    /// recording anything
    ///
    /// `None` means a request could go out now, as far as this origin's own
    /// record goes. A full store may still refuse a new origin.
    pub fn time_until_permitted(&self, origin: &str) -> Option<Duration> {
        self.time_until_permitted_at(origin, Instant::now())
    }

    /// Same as [`OriginPacingStore::time_until_permitted`] with an explicit clock
    pub fn time_until_permitted_at(&self, origin: &str, now: Instant) -> Option<Duration> {
        let last = self.get(origin)?;
        remaining(last, self.window, now)
    }

    fn lock(&self) -> MutexGuard<'_, PacingIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for OriginPacingStore {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_CAPACITY, Duration::ZERO)
    }
}
