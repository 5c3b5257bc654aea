//! History browser: paginated, searchable view over a [`Store`].
//!
//! All visible state lives in a [`BrowserCore`] owned by one consumer thread
//! ([`ConsumerQueue`]). Public calls post mutations there; store calls run on
//! short-lived worker threads and post their results back. Readers get
//! immutable [`ViewSnapshot`]s, either on demand or as [`BrowserEvent`]s.
//!
//! ```text
//! set_search_text -> Debouncer -> search -> Store::search -> replace list
//! on_scroll/load_more -> Store::fetch_page(cursor) -> append (dedup) -> advance cursor
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use super::debounce::Debouncer;
use super::dispatch::{ConsumerQueue, DispatchSink};
use super::pagination::{PageOutcome, PageRequest, PaginationController};
use super::search::{SearchCoordinator, SearchOutcome, SearchTicket};
use super::store::Store;
use super::types::{Cursor, HistoryRecord, RecordId};
use super::view_state::{ViewSnapshot, ViewState};
use crate::config::HistoryConfig;
use crate::error::{ErrorSeverity, StoreError};
use crate::logging;

/// Events buffered for a slow reader before the oldest are overwritten
const EVENT_CAPACITY: usize = 256;

/// Poll interval for [`HistoryBrowser::wait_until`]
const WAIT_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserConfig {
    pub page_size: usize,
    pub search_delay: Duration,
    pub scroll_threshold: f64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        BrowserConfig::from(&HistoryConfig::default())
    }
}

impl From<&HistoryConfig> for BrowserConfig {
    fn from(config: &HistoryConfig) -> Self {
        BrowserConfig {
            page_size: config.effective_page_size(),
            search_delay: Duration::from_millis(config.search_delay_ms),
            scroll_threshold: config.scroll_threshold_px,
        }
    }
}

/// Scroll position reported by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub offset: f64,
    pub scrollable_height: f64,
}

impl ScrollMetrics {
    /// A zero scrollable height shows up during layout and is never "the end".
    pub fn is_near_end(&self, threshold: f64) -> bool {
        self.scrollable_height > 0.0 && self.offset + threshold >= self.scrollable_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Refresh,
    LoadMore,
    Search,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Refresh => "refresh",
            Operation::LoadMore => "load_more",
            Operation::Search => "search",
        }
    }
}

/// A recoverable store failure. The list was left as it was; the caller
/// decides whether to retry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserFailure {
    pub operation: Operation,
    #[serde(serialize_with = "serialize_error")]
    pub error: StoreError,
    pub correlation_id: String,
}

fn serialize_error<S: Serializer>(error: &StoreError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.user_message())
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserEvent {
    Changed(ViewSnapshot),
    Failed(BrowserFailure),
}

/// Consumer-context state. Only ever touched from the consumer thread.
pub(crate) struct BrowserCore {
    store: Arc<dyn Store>,
    sink: Arc<dyn DispatchSink<BrowserCore>>,
    view: ViewState,
    pagination: PaginationController,
    search: SearchCoordinator,
    events: async_channel::Sender<BrowserEvent>,
}

impl BrowserCore {
    fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn DispatchSink<BrowserCore>>,
        page_size: usize,
        events: async_channel::Sender<BrowserEvent>,
    ) -> Self {
        BrowserCore {
            store,
            sink,
            view: ViewState::new(),
            pagination: PaginationController::new(page_size),
            search: SearchCoordinator::new(),
            events,
        }
    }

    fn is_loading(&self) -> bool {
        self.pagination.is_loading() || self.search.in_flight()
    }

    fn snapshot(&self) -> ViewSnapshot {
        self.view
            .snapshot(self.is_loading(), self.pagination.can_load_more(&self.view))
    }

    fn emit(&self, event: BrowserEvent) {
        match self.events.force_send(event) {
            Ok(Some(_)) => trace!("Event buffer full, dropped oldest event"),
            Ok(None) => {}
            Err(_) => trace!("Event channel closed"),
        }
    }

    fn publish(&self) {
        self.emit(BrowserEvent::Changed(self.snapshot()));
    }

    fn fail(&self, operation: Operation, error: StoreError) {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        match error.severity() {
            ErrorSeverity::Error => error!(
                correlation_id = %correlation_id,
                operation = operation.as_str(),
                error = %error,
                "History operation failed"
            ),
            ErrorSeverity::Warning => warn!(
                correlation_id = %correlation_id,
                operation = operation.as_str(),
                error = %error,
                "History operation failed"
            ),
            ErrorSeverity::Info => info!(
                correlation_id = %correlation_id,
                operation = operation.as_str(),
                error = %error,
                "History operation did not complete"
            ),
        }
        self.emit(BrowserEvent::Failed(BrowserFailure {
            operation,
            error,
            correlation_id,
        }));
    }

    /// Run `op` against the store on a worker thread and hand its result to
    /// `done` on the consumer context. Returns false if no worker could be
    /// started; `done` is then never called.
    fn run_on_worker<T, Op, Done>(&self, operation: Operation, op: Op, done: Done) -> bool
    where
        T: Send + 'static,
        Op: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
        Done: FnOnce(&mut BrowserCore, Result<T, StoreError>) + Send + 'static,
    {
        let store = self.store.clone();
        let sink = self.sink.clone();
        let spawned = thread::Builder::new()
            .name(format!("history-{}", operation.as_str()))
            .spawn(move || {
                let started = Instant::now();
                let result = op(store.as_ref());
                logging::log_store_op(
                    operation.as_str(),
                    started.elapsed().as_millis() as u64,
                    result.is_ok(),
                );
                if !sink.post(Box::new(move |core: &mut BrowserCore| done(core, result))) {
                    debug!(
                        operation = operation.as_str(),
                        "Browser closed before store result arrived"
                    );
                }
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, operation = operation.as_str(), "Failed to spawn store worker");
                false
            }
        }
    }

    fn set_search_text(&mut self, text: String) {
        if self.view.search_text() == text {
            return;
        }
        if text.is_empty() {
            // Cleared field leaves search mode now, not after the debounce
            self.search(text);
            return;
        }
        self.view.set_search_text(text);
        self.publish();
    }

    /// Reload from the newest record. The current list stays visible until
    /// the count and first page have both arrived.
    fn refresh(&mut self) {
        let Some(request) = self.pagination.begin_refresh(Cursor::now()) else {
            debug!("Fetch already in flight, ignoring refresh");
            // The in-flight fetch settles the list; pending search text is dropped
            if !self.view.search_text().is_empty() {
                self.search.invalidate();
                self.view.set_search_text(String::new());
                self.publish();
            }
            return;
        };

        self.search.invalidate();
        self.view.set_search_text(String::new());
        info!(
            epoch = request.epoch,
            page_size = request.page_size,
            "Refreshing history"
        );
        self.publish();

        let spawned = self.run_on_worker(
            Operation::Refresh,
            move |store| {
                let total_count = store.count()?;
                let page = store.fetch_page(request.page_size, request.before)?;
                Ok((total_count, page))
            },
            move |core, result| core.finish_refresh(request, result),
        );
        if !spawned {
            self.finish_refresh(request, Err(worker_unavailable()));
        }
    }

    fn finish_refresh(&mut self, request: PageRequest, result: Result<(u64, Vec<HistoryRecord>), StoreError>) {
        let outcome = self
            .pagination
            .complete_refresh(&request, result, &mut self.view);
        self.settle_page(Operation::Refresh, &request, outcome);
    }

    fn load_more(&mut self) {
        let Some(request) = self.pagination.begin_load_more(&self.view) else {
            trace!(
                loading = self.pagination.is_loading(),
                searching = !self.view.search_text().is_empty(),
                loaded = self.view.len(),
                total = self.view.total_count(),
                "Load more ignored"
            );
            return;
        };
        debug!(
            epoch = request.epoch,
            before = %request.before.timestamp(),
            "Loading more history"
        );
        self.publish();

        let spawned = self.run_on_worker(
            Operation::LoadMore,
            move |store| store.fetch_page(request.page_size, request.before),
            move |core, result| core.finish_load_more(request, result),
        );
        if !spawned {
            self.finish_load_more(request, Err(worker_unavailable()));
        }
    }

    fn finish_load_more(&mut self, request: PageRequest, result: Result<Vec<HistoryRecord>, StoreError>) {
        let outcome = self
            .pagination
            .complete_page(&request, result, &mut self.view);
        self.settle_page(Operation::LoadMore, &request, outcome);
    }

    fn settle_page(&mut self, operation: Operation, request: &PageRequest, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Stale => return,
            PageOutcome::Failed(e) => self.fail(operation, e),
            PageOutcome::EndOfData => {
                debug!(epoch = request.epoch, "Reached end of history");
            }
            PageOutcome::Appended(appended) => {
                debug!(
                    epoch = request.epoch,
                    appended,
                    loaded = self.view.len(),
                    total = self.view.total_count(),
                    "Page applied"
                );
            }
        }
        self.publish();
    }

    fn search_current(&mut self) {
        let text = self.view.search_text().to_string();
        self.search(text);
    }

    fn search(&mut self, text: String) {
        if text.is_empty() {
            // Leaving search mode: whatever search is in flight is now stale
            self.search.invalidate();
            self.view.set_search_text(String::new());
            self.refresh();
            return;
        }

        let ticket = self.search.begin();
        self.pagination.suspend();
        self.view.set_search_text(text.clone());
        info!(
            generation = ticket.generation,
            query_len = text.len(),
            "Searching history"
        );
        self.publish();

        let worker_ticket = ticket.clone();
        let cancel = ticket.cancel.clone();
        let spawned = self.run_on_worker(
            Operation::Search,
            move |store| store.search(&text, &cancel),
            move |core, result| core.finish_search(worker_ticket, result),
        );
        if !spawned {
            self.finish_search(ticket, Err(worker_unavailable()));
        }
    }

    fn finish_search(&mut self, ticket: SearchTicket, result: Result<Vec<HistoryRecord>, StoreError>) {
        match self.search.complete(&ticket, result) {
            SearchOutcome::Stale => return,
            SearchOutcome::Canceled => {
                debug!(generation = ticket.generation, "Search canceled");
            }
            SearchOutcome::Failed(e) => self.fail(Operation::Search, e),
            SearchOutcome::Applied(records) => {
                let shown = self.view.replace(records);
                self.view.set_total_count(shown as u64);
                info!(generation = ticket.generation, hits = shown, "Search applied");
            }
        }
        self.publish();
    }

    fn select(&mut self, id: Option<RecordId>) {
        self.view.select(id);
        self.publish();
    }
}

fn worker_unavailable() -> StoreError {
    StoreError::Unavailable("could not start a store worker".to_string())
}

/// Consumer-facing handle to a history browser.
///
/// Dropping it stops the debounce timer and the consumer thread; store calls
/// still in flight finish on their own and their results are discarded.
pub struct HistoryBrowser {
    debouncer: Debouncer,
    queue: ConsumerQueue<BrowserCore>,
    events: async_channel::Receiver<BrowserEvent>,
    config: BrowserConfig,
}

impl HistoryBrowser {
    /// Start a browser over `store`. The list starts empty; call
    /// [`refresh`](Self::refresh) to load the first page.
    pub fn new(store: Arc<dyn Store>, config: BrowserConfig) -> Result<Self> {
        let (event_tx, event_rx) = async_channel::bounded(EVENT_CAPACITY);
        let page_size = config.page_size;

        let queue = ConsumerQueue::spawn("history-browser", move |handle| {
            BrowserCore::new(store, Arc::new(handle), page_size, event_tx)
        })?;

        let trigger = queue.handle();
        let debouncer = Debouncer::new(config.search_delay, move || {
            let _ = trigger.post(Box::new(|core: &mut BrowserCore| core.search_current()));
        })?;

        info!(
            page_size = config.page_size,
            search_delay_ms = config.search_delay.as_millis() as u64,
            "History browser started"
        );

        Ok(HistoryBrowser {
            debouncer,
            queue,
            events: event_rx,
            config,
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Stream of snapshots and failures. Every clone sees each event once
    /// between them.
    pub fn events(&self) -> async_channel::Receiver<BrowserEvent> {
        self.events.clone()
    }

    fn post(&self, mutation: impl FnOnce(&mut BrowserCore) + Send + 'static) {
        if !self.queue.post(Box::new(mutation)) {
            warn!("History browser consumer context has stopped");
        }
    }

    /// Reload from the newest record. Leaves search mode.
    pub fn refresh(&self) {
        self.debouncer.stop();
        self.post(|core| core.refresh());
    }

    /// Fetch the next page if allowed; otherwise a no-op.
    pub fn load_more(&self) {
        self.post(|core| core.load_more());
    }

    /// Record new search text and (re)arm the debounce timer. Clearing the
    /// text leaves search mode immediately.
    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        let cleared = text.is_empty();
        self.post(move |core| core.set_search_text(text));
        if cleared {
            self.debouncer.stop();
        } else {
            self.debouncer.notify();
        }
    }

    /// Search immediately, skipping the debounce window.
    pub fn search(&self, text: impl Into<String>) {
        let text = text.into();
        self.debouncer.stop();
        self.post(move |core| core.search(text));
    }

    /// Point the detail view at a record; `None` clears it.
    pub fn select_record(&self, id: Option<RecordId>) {
        self.post(move |core| core.select(id));
    }

    /// Load more when the reported position is at the end of the content.
    pub fn on_scroll(&self, metrics: ScrollMetrics) {
        if metrics.is_near_end(self.config.scroll_threshold) {
            self.load_more();
        }
    }

    /// Current state, observed after every mutation posted before this call.
    /// `None` once the browser has shut down.
    pub fn snapshot(&self) -> Option<ViewSnapshot> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.post(move |core| {
            let _ = tx.send(core.snapshot());
        });
        rx.recv().ok()
    }

    /// Poll snapshots until `predicate` holds or `timeout` passes.
    pub fn wait_until<P>(&self, timeout: Duration, predicate: P) -> Option<ViewSnapshot>
    where
        P: Fn(&ViewSnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let snapshot = self.snapshot()?;
            if predicate(&snapshot) {
                return Some(snapshot);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(WAIT_POLL);
        }
    }

    /// Wait until no fetch or search is in flight
    pub fn wait_idle(&self, timeout: Duration) -> Option<ViewSnapshot> {
        self.wait_until(timeout, |s| !s.is_loading)
    }
}

#[cfg(test)]
#[path = "browser_tests.rs"]
mod tests;
