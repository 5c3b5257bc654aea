//! Core history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a history record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One translation produced by one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub service: String,
    pub text: String,
}

/// A translation history entry. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub source_lang: String,
    pub target_lang: String,
    pub source_text: String,
    #[serde(default)]
    pub results: Vec<TranslationResult>,
    #[serde(default)]
    pub favorite: bool,
}

impl HistoryRecord {
    /// Case-insensitive substring match over the source text and every result.
    /// `needle` must already be lowercased.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.source_text.to_lowercase().contains(needle)
            || self
                .results
                .iter()
                .any(|r| r.text.to_lowercase().contains(needle))
    }
}

/// Insertable draft of a history entry (the store assigns the id)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewHistoryRecord {
    /// Defaults to now when unset
    pub timestamp: Option<DateTime<Utc>>,
    pub source_lang: String,
    pub target_lang: String,
    pub source_text: String,
    pub results: Vec<TranslationResult>,
    pub favorite: bool,
}

impl NewHistoryRecord {
    pub fn new(source_text: impl Into<String>) -> Self {
        NewHistoryRecord {
            source_text: source_text.into(),
            ..Default::default()
        }
    }

    pub fn with_result(mut self, service: impl Into<String>, text: impl Into<String>) -> Self {
        self.results.push(TranslationResult {
            service: service.into(),
            text: text.into(),
        });
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_langs(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_lang = source.into();
        self.target_lang = target.into();
        self
    }

    pub(crate) fn into_record(self, id: RecordId) -> HistoryRecord {
        HistoryRecord {
            id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source_lang: self.source_lang,
            target_lang: self.target_lang,
            source_text: self.source_text,
            results: self.results,
            favorite: self.favorite,
        }
    }
}

/// Pagination boundary: the next page holds records strictly older than this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(DateTime<Utc>);

impl Cursor {
    /// "Now", rounded up to the next whole millisecond so every record
    /// stored before this call (at millisecond precision) sorts below it.
    pub fn now() -> Self {
        Cursor(timestamp_from_millis(Utc::now().timestamp_millis() + 1))
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Cursor(timestamp)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Move the boundary down to `timestamp`. Never moves it forward in time.
    pub fn advance_to(&mut self, timestamp: DateTime<Utc>) {
        if timestamp < self.0 {
            self.0 = timestamp;
        }
    }
}

/// Convert a UTC-millisecond column back into a timestamp.
/// Out-of-range values clamp to the epoch rather than failing the whole page.
pub(crate) fn timestamp_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
