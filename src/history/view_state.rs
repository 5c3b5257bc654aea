//! The materialized list the presentation layer renders.
//!
//! Owned by the consumer context and never shared directly; readers get an
//! immutable [`ViewSnapshot`].

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use super::types::{HistoryRecord, RecordId};

#[derive(Debug, Default)]
pub struct ViewState {
    records: Vec<Arc<HistoryRecord>>,
    ids: HashSet<RecordId>,
    total_count: u64,
    search_text: String,
    selected: Option<Arc<HistoryRecord>>,
}

/// Immutable copy of the visible state
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub records: Vec<Arc<HistoryRecord>>,
    pub total_count: u64,
    pub is_loading: bool,
    pub can_load_more: bool,
    pub search_text: String,
    pub selected: Option<Arc<HistoryRecord>>,
}

impl ViewSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn set_total_count(&mut self, total_count: u64) {
        self.total_count = total_count;
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
    }

    pub fn clear_records(&mut self) {
        self.records.clear();
        self.ids.clear();
    }

    /// Append records in arrival order, skipping ids already present.
    /// Returns how many were appended.
    pub fn append_unique(&mut self, incoming: Vec<HistoryRecord>) -> usize {
        let before = self.records.len();
        for record in incoming {
            if self.ids.insert(record.id) {
                self.records.push(Arc::new(record));
            }
        }
        self.records.len() - before
    }

    /// Substitute the whole list. Duplicate ids in `records` keep their first occurrence.
    pub fn replace(&mut self, records: Vec<HistoryRecord>) -> usize {
        self.clear_records();
        self.append_unique(records)
    }

    /// Point the detail view at a record from the current list.
    /// Unknown ids clear the selection. Never touches the list itself.
    pub fn select(&mut self, id: Option<RecordId>) {
        self.selected = match id {
            None => None,
            Some(id) => {
                let found = self.records.iter().find(|r| r.id == id).cloned();
                if found.is_none() {
                    warn!(id = %id, "Selected record is not in the visible list");
                }
                found
            }
        };
    }

    pub fn snapshot(&self, is_loading: bool, can_load_more: bool) -> ViewSnapshot {
        ViewSnapshot {
            records: self.records.clone(),
            total_count: self.total_count,
            is_loading,
            can_load_more,
            search_text: self.search_text.clone(),
            selected: self.selected.clone(),
        }
    }
}
