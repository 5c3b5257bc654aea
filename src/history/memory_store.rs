//! In-process [`Store`] backed by a vector.
//!
//! Useful for tests and for embedding the browser over data that already
//! lives in memory.

use parking_lot::RwLock;
use tracing::debug;

use super::store::{CancelToken, Store};
use super::types::{Cursor, HistoryRecord, NewHistoryRecord, RecordId};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = HistoryRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.put(record);
        }
        store
    }

    /// Insert a draft, assigning the next id
    pub fn insert(&self, draft: NewHistoryRecord) -> RecordId {
        let mut records = self.records.write();
        let next = records.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        let id = RecordId(next);
        records.push(draft.into_record(id));
        sort_newest_first(&mut records);
        id
    }

    /// Insert or replace a fully formed record
    pub fn put(&self, record: HistoryRecord) {
        let mut records = self.records.write();
        records.retain(|r| r.id != record.id);
        records.push(record);
        sort_newest_first(&mut records);
    }

    pub fn remove(&self, id: RecordId) -> bool {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.id != id);
        records.len() != before
    }
}

// Newest first; equal timestamps fall back to the higher id first, like the SQL ordering
fn sort_newest_first(records: &mut [HistoryRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

impl Store for MemoryStore {
    fn count(&self) -> StoreResult<u64> {
        Ok(self.records.read().len() as u64)
    }

    fn fetch_page(&self, page_size: usize, before: Cursor) -> StoreResult<Vec<HistoryRecord>> {
        let records = self.records.read();
        let page: Vec<_> = records
            .iter()
            .filter(|r| r.timestamp < before.timestamp())
            .take(page_size)
            .cloned()
            .collect();
        debug!(page_size, returned = page.len(), "Memory store page");
        Ok(page)
    }

    fn search(&self, text: &str, cancel: &CancelToken) -> StoreResult<Vec<HistoryRecord>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Canceled);
        }
        let needle = text.to_lowercase();
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|r| r.matches_lowercase(&needle))
            .cloned()
            .collect())
    }
}
