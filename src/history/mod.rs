//! Translation history browsing
//!
//! Paginated, searchable view over a time-ordered record store.
//!
//! # Module Structure
//!
//! - `types` - Records, drafts, and the pagination cursor
//! - `store` - The [`Store`] seam and cancel tokens
//! - `memory_store` - In-process store
//! - `db_worker` - SQLite store served by a dedicated worker thread
//! - `debounce` - Trailing-edge debounce timer
//! - `search` - Search generations and stale-result filtering
//! - `pagination` - Cursor-based incremental loading
//! - `view_state` - The visible list and its snapshots
//! - `dispatch` - Single-consumer execution context
//! - `browser` - [`HistoryBrowser`], wiring all of the above together

mod browser;
mod db_worker;
mod debounce;
mod dispatch;
mod memory_store;
mod pagination;
mod search;
mod store;
mod types;
mod view_state;

pub use browser::{
    BrowserConfig, BrowserEvent, BrowserFailure, HistoryBrowser, Operation, ScrollMetrics,
};
pub use db_worker::SqliteStore;
pub use debounce::Debouncer;
pub use dispatch::{ConsumerHandle, ConsumerQueue, DispatchSink, Mutation};
pub use memory_store::MemoryStore;
pub use pagination::{LoadKind, PageOutcome, PageRequest, PaginationController};
pub use search::{SearchCoordinator, SearchOutcome, SearchTicket};
pub use store::{CancelToken, Store};
pub use types::{Cursor, HistoryRecord, NewHistoryRecord, RecordId, TranslationResult};
pub use view_state::{ViewSnapshot, ViewState};
