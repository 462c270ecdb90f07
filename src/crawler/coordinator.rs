//! Crawl coordinator - the engine's orchestration logic
//!
//! This module contains the dispatch loop and the worker tasks:
//! - Building a crawler from options
//! - Pulling addresses from the work queue and admitting them
//! - Fetching admitted addresses under the admission pool
//! - Running the response chain on every fetched page
//! - Detecting termination and handling aborts

use reqwest::Response;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit};

use crate::crawler::fetcher::{build_http_client, build_request, HttpSettings, SentRequest};
use crate::crawler::rules::{ErrorFn, FollowFn, RequestFn, ResponseFn};
use crate::crawler::scheduler::{Claim, InFlight, Scheduler};
use crate::crawler::{CrawlOption, Page, Transport};
use crate::queue::{DefaultQueue, Queue};
use crate::state::{CrawlState, DuplicateFilter, InMemoryDupFilter, OriginPacingStore, Pacing};
use crate::url::origin_of_url;
use crate::{ConfigError, CrawlError};

/// Builder for a crawl, before it starts
///
/// Options are applied in the order given. Later options may replace the
/// queue, filter, pacing store or transport, and append rules.
pub struct CrawlerBuilder {
    pub(crate) workers: usize,
    pub(crate) seeds: Vec<String>,
    pub(crate) queue: Arc<dyn Queue>,
    pub(crate) filter: Arc<dyn DuplicateFilter>,
    pub(crate) pacing: Arc<OriginPacingStore>,
    pub(crate) pacing_installed: bool,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) follow_rules: Vec<FollowFn>,
    pub(crate) request_rules: Vec<RequestFn>,
    pub(crate) response_rules: Vec<ResponseFn>,
    pub(crate) error_handlers: Vec<ErrorFn>,
}

impl CrawlerBuilder {
    /// Creates a builder with the default queue, filter, pacing store and
    /// one worker per available CPU
    pub fn new() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            workers,
            seeds: Vec::new(),
            queue: Arc::new(DefaultQueue::default()),
            filter: Arc::new(InMemoryDupFilter::new()),
            pacing: Arc::new(OriginPacingStore::default()),
            pacing_installed: false,
            transport: None,
            follow_rules: Vec::new(),
            request_rules: Vec::new(),
            response_rules: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    /// Applies a single option
    pub fn option(mut self, option: CrawlOption) -> Result<Self, ConfigError> {
        option.apply(&mut self)?;
        Ok(self)
    }

    /// Applies options in order, stopping at the first invalid one
    pub fn options<I>(mut self, options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = CrawlOption>,
    {
        for option in options {
            option.apply(&mut self)?;
        }
        Ok(self)
    }

    /// Number of concurrent fetches the crawl will allow
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Starts the crawl
    ///
    /// Must be called from within a tokio runtime. Seeds are queued, the
    /// admission pool is filled and the dispatch loop is spawned.
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Handle to the running crawl
    /// * `Err(CrawlError)` - The default HTTP client could not be built
    pub fn start(self) -> Result<Crawler, CrawlError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                build_http_client(&HttpSettings::default()).map_err(CrawlError::Client)?,
            ),
        };

        let (errors, error_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(CrawlState::Configured);

        let crawler = Crawler {
            shared: Arc::new(Shared {
                queue: self.queue,
                filter: self.filter,
                pacing: self.pacing,
                paced: self.pacing_installed,
                transport,
                scheduler: Scheduler::new(self.workers),
                follow_rules: self.follow_rules,
                request_rules: self.request_rules,
                response_rules: self.response_rules,
                errors,
                state,
                stats: Stats::default(),
                started_at: Instant::now(),
                finished_at: OnceLock::new(),
            }),
        };

        for seed in self.seeds {
            crawler.add(seed);
        }

        tokio::spawn(consume_errors(error_rx, self.error_handlers));

        crawler.transition(CrawlState::Running);
        tracing::info!(
            "Crawl started with {} workers, {} addresses queued",
            crawler.workers(),
            crawler.shared.queue.len()
        );

        tokio::spawn(crawler.clone().dispatch());

        Ok(crawler)
    }
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CrawlerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerBuilder")
            .field("workers", &self.workers)
            .field("seeds", &self.seeds.len())
            .field("follow_rules", &self.follow_rules.len())
            .field("request_rules", &self.request_rules.len())
            .field("response_rules", &self.response_rules.len())
            .finish_non_exhaustive()
    }
}

/// Counters updated while the crawl runs
#[derive(Debug, Default)]
struct Stats {
    dispatched: AtomicU64,
    rejected: AtomicU64,
    requeued: AtomicU64,
    fetched: AtomicU64,
    processed: AtomicU64,
    errors: AtomicU64,
}

/// Snapshot of a crawl's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Lifecycle state when the snapshot was taken
    pub state: CrawlState,

    /// Addresses admitted and handed to a worker
    pub dispatched: u64,

    /// Addresses refused by the duplicate check or a follow rule
    pub rejected: u64,

    /// Addresses pushed back for a later attempt
    pub requeued: u64,

    /// Requests that got a response
    pub fetched: u64,

    /// Pages handed to the response chain
    pub processed: u64,

    /// Errors reported to the error sink
    pub errors: u64,

    /// Addresses dropped by the queue's overflow limit
    pub dropped: u64,

    /// Time since start, or total run time once finished
    pub elapsed: Duration,
}

/// State shared by every handle and task of one crawl
struct Shared {
    queue: Arc<dyn Queue>,
    filter: Arc<dyn DuplicateFilter>,
    pacing: Arc<OriginPacingStore>,
    paced: bool,
    transport: Arc<dyn Transport>,
    scheduler: Arc<Scheduler>,

    // Frozen at start
    follow_rules: Vec<FollowFn>,
    request_rules: Vec<RequestFn>,
    response_rules: Vec<ResponseFn>,

    errors: mpsc::UnboundedSender<CrawlError>,
    state: watch::Sender<CrawlState>,
    stats: Stats,
    started_at: Instant,
    finished_at: OnceLock<Instant>,
}

/// Handle to a running crawl
///
/// Cheap to clone. Rules receive a reference to it and may queue addresses,
/// push addresses back, report errors or consult the pacing store.
#[derive(Clone)]
pub struct Crawler {
    shared: Arc<Shared>,
}

impl Crawler {
    /// Shorthand for [`CrawlerBuilder::new`]
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::new()
    }

    /// Queues an address
    ///
    /// Ignored once the queue has closed (after completion or abort).
    pub fn add(&self, url: impl Into<String>) {
        self.shared.queue.add(url.into());
    }

    /// Re-queues an address after a delay
    ///
    /// The pending re-queue counts as outstanding work, so the crawl does not
    /// complete while it is waiting. It is dropped if the crawl is aborted.
    pub fn push_back(&self, url: impl Into<String>, delay: Duration) {
        if self.state().is_stopping() {
            return;
        }

        let url = url.into();
        let work = self.shared.scheduler.enter();
        let crawler = self.clone();
        let mut state = self.shared.state.subscribe();
        self.shared.stats.requeued.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let _work = work;
            tokio::select! {
                _ = tokio::time::sleep(delay) => crawler.add(url),
                _ = wait_until(&mut state, CrawlState::is_stopping) => {
                    tracing::trace!("Dropping re-queue of {} after abort", url);
                }
            }
        });
    }

    /// Sends an error to the error sink
    pub fn report(&self, error: CrawlError) {
        self.shared.stats.errors.fetch_add(1, Ordering::Relaxed);
        // Only fails once the consumer is gone, at which point nobody listens
        let _ = self.shared.errors.send(error);
    }

    /// Aborts the crawl
    ///
    /// No address is admitted afterwards, the queue is closed, in-flight
    /// fetches finish but their response chains are skipped. Has no effect
    /// on a crawl that already finished.
    pub fn abort(&self) {
        if self.transition(CrawlState::Aborting) {
            tracing::info!("Aborting crawl");
            self.shared.queue.close();
        }
    }

    /// Waits for the crawl to complete or finish aborting
    pub async fn wait(&self) -> CrawlSummary {
        let mut state = self.shared.state.subscribe();
        wait_until(&mut state, CrawlState::is_terminal).await;
        self.summary()
    }

    /// Current lifecycle state
    pub fn state(&self) -> CrawlState {
        *self.shared.state.borrow()
    }

    /// Snapshot of the crawl's counters
    pub fn summary(&self) -> CrawlSummary {
        let stats = &self.shared.stats;
        let end = self
            .shared
            .finished_at
            .get()
            .copied()
            .unwrap_or_else(Instant::now);

        CrawlSummary {
            state: self.state(),
            dispatched: stats.dispatched.load(Ordering::Relaxed),
            rejected: stats.rejected.load(Ordering::Relaxed),
            requeued: stats.requeued.load(Ordering::Relaxed),
            fetched: stats.fetched.load(Ordering::Relaxed),
            processed: stats.processed.load(Ordering::Relaxed),
            errors: stats.errors.load(Ordering::Relaxed),
            dropped: self.shared.queue.dropped(),
            elapsed: end.saturating_duration_since(self.shared.started_at),
        }
    }

    /// The per-origin pacing store
    pub fn pacing(&self) -> &OriginPacingStore {
        &self.shared.pacing
    }

    /// The work queue
    pub fn queue(&self) -> &dyn Queue {
        self.shared.queue.as_ref()
    }

    /// The duplicate filter
    pub fn filter(&self) -> &dyn DuplicateFilter {
        self.shared.filter.as_ref()
    }

    /// Maximum number of concurrent fetches
    pub fn workers(&self) -> usize {
        self.shared.scheduler.workers()
    }

    fn transition(&self, next: CrawlState) -> bool {
        self.shared.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Main dispatch loop
    ///
    /// Pulls addresses until the queue reports exhaustion. The queue is
    /// closed here, and only here, once nothing is queued and no work is
    /// outstanding, so exhaustion means the crawl is done.
    async fn dispatch(self) {
        let scheduler = Arc::clone(&self.shared.scheduler);

        loop {
            let next = tokio::select! {
                biased;
                next = self.shared.queue.get() => next,
                _ = scheduler.wait_idle() => {
                    if self.shared.queue.is_empty() && !self.shared.queue.is_closed() {
                        tracing::debug!("Queue empty and nothing in flight, closing queue");
                        self.shared.queue.close();
                    }
                    continue;
                }
            };

            let Some(url) = next else {
                break;
            };

            if !self.should_follow(&url) {
                self.shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let Some(permit) = scheduler.acquire().await else {
                tracing::error!("Admission pool closed unexpectedly");
                break;
            };

            // Aborted while waiting for a free worker
            if self.state().is_stopping() {
                self.shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let Some(claim) = scheduler.claim(&url) else {
                self.shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
                continue;
            };

            let work = scheduler.enter();
            self.shared.stats.dispatched.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dispatching {}", url);

            tokio::spawn(self.clone().fetch(url, permit, claim, work));
        }

        // Exhausted: let in-flight fetches and handlers drain
        scheduler.wait_idle().await;

        let _ = self.shared.finished_at.set(Instant::now());
        self.finish();

        let summary = self.summary();
        tracing::info!(
            "Crawl {}: {} dispatched, {} fetched, {} errors in {:?}",
            summary.state,
            summary.dispatched,
            summary.fetched,
            summary.errors,
            summary.elapsed
        );
    }

    /// Moves a running crawl to `Completed` and an aborting one to `Aborted`
    ///
    /// Decided and written under the state lock, so an abort landing at the
    /// very end still leaves the crawl in a terminal state.
    fn finish(&self) -> CrawlState {
        self.shared.state.send_if_modified(|state| {
            let terminal = match *state {
                CrawlState::Running => CrawlState::Completed,
                CrawlState::Aborting => CrawlState::Aborted,
                _ => return false,
            };
            *state = terminal;
            true
        });
        self.state()
    }

    /// Returns the result of the duplicate check and every follow rule
    fn should_follow(&self, url: &str) -> bool {
        if self.state().is_stopping() {
            return false;
        }

        if self.shared.filter.has_visited(url) || self.shared.scheduler.is_claimed(url) {
            tracing::trace!("Already visited {}", url);
            return false;
        }

        self.shared.follow_rules.iter().all(|rule| rule(self, url))
    }

    /// Fetches one admitted address
    ///
    /// The permit returns to the pool when this returns, whatever the
    /// outcome. The in-flight unit moves on to the response handler. An
    /// address refused by pacing here is pushed back, not marked visited.
    async fn fetch(self, url: String, _permit: OwnedSemaphorePermit, claim: Claim, work: InFlight) {
        let request = match self.prepare_request(&url) {
            Ok(request) => request,
            Err(e) => {
                self.report(e);
                return;
            }
        };
        let sent = SentRequest::from_request(&url, &request);

        if self.shared.paced && !self.pace(&url, &request) {
            return;
        }

        let response = match self.shared.transport.send(request).await {
            Ok(response) => response,
            Err(source) => {
                self.report(CrawlError::Http { url, source });
                return;
            }
        };

        self.shared.filter.visited(&url);
        drop(claim);
        self.shared.stats.fetched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Fetched {} ({})", url, response.status());

        tokio::spawn(self.process_response(sent, response, work));
    }

    /// Records the request in the pacing store, or pushes the address back if
    /// its origin was requested less than one window ago
    ///
    /// Runs with the worker held, right before the request is sent, so the
    /// recorded instant is when the request starts.
    fn pace(&self, url: &str, request: &reqwest::Request) -> bool {
        let origin = match origin_of_url(request.url()) {
            Ok(origin) => origin,
            Err(e) => {
                self.report(e.into());
                return false;
            }
        };

        match self.shared.pacing.try_acquire(&origin) {
            Pacing::Permitted => true,
            Pacing::Wait(wait) => {
                tracing::trace!("Origin {} busy, retrying {} in {:?}", origin, url, wait);
                self.push_back(url, wait);
                false
            }
        }
    }

    /// Builds the GET request and runs the request rules over it
    fn prepare_request(&self, url: &str) -> Result<reqwest::Request, CrawlError> {
        let mut request = build_request(url)?;
        for rule in &self.shared.request_rules {
            rule(self, &mut request)?;
        }
        Ok(request)
    }

    /// Runs the response chain over a fetched page
    async fn process_response(self, sent: SentRequest, response: Response, _work: InFlight) {
        if self.state().is_stopping() {
            tracing::trace!("Skipping response for {} after abort", sent.address);
            return;
        }

        let page = match Page::read(sent, response).await {
            Ok(page) => page,
            Err(e) => {
                self.report(e);
                return;
            }
        };

        self.shared.stats.processed.fetch_add(1, Ordering::Relaxed);
        for rule in &self.shared.response_rules {
            if self.state().is_stopping() || !rule(&self, &page) {
                break;
            }
        }
    }
}

impl fmt::Debug for Crawler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crawler")
            .field("state", &self.state())
            .field("workers", &self.workers())
            .field("idle_workers", &self.shared.scheduler.available_permits())
            .field("in_flight", &self.shared.scheduler.active())
            .field("queued", &self.shared.queue.len())
            .finish_non_exhaustive()
    }
}

/// Resolves once the watched state satisfies `done`
async fn wait_until(state: &mut watch::Receiver<CrawlState>, done: fn(&CrawlState) -> bool) {
    loop {
        let reached = done(&state.borrow_and_update());
        if reached {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}

/// Logs every reported error and forwards it to the configured handlers
async fn consume_errors(mut errors: mpsc::UnboundedReceiver<CrawlError>, handlers: Vec<ErrorFn>) {
    while let Some(error) = errors.recv().await {
        tracing::warn!("{}", error);
        for handler in &handlers {
            handler(&error);
        }
    }
}
