//! The record store seam consumed by the browser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::{Cursor, HistoryRecord};
use crate::error::StoreResult;

/// Persistent, time-ordered record repository.
///
/// Methods block; the browser always calls them from worker threads, never
/// from the consumer context.
pub trait Store: Send + Sync + 'static {
    /// Total number of records
    fn count(&self) -> StoreResult<u64>;

    /// Up to `page_size` records with `timestamp < before`, newest first.
    /// An empty page means the end of the data was reached.
    fn fetch_page(&self, page_size: usize, before: Cursor) -> StoreResult<Vec<HistoryRecord>>;

    /// Every record matching `text`, newest first. Implementations may return
    /// `StoreError::Canceled` once `cancel` is set; callers never rely on it.
    fn search(&self, text: &str, cancel: &CancelToken) -> StoreResult<Vec<HistoryRecord>>;
}

/// Cooperative cancellation flag shared with an in-flight store call
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
