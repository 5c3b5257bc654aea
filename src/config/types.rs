//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

// ============================================
// HISTORY BROWSER
// ============================================

/// Tuning for the history browser (paging, search debounce, store timeouts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Records per page (default: 20)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Debounce delay for search-as-you-type in milliseconds (default: 500)
    #[serde(default = "default_search_delay_ms")]
    pub search_delay_ms: u64,
    /// Near-end tolerance for scroll-triggered loading (default: 0.0)
    #[serde(default = "default_scroll_threshold_px")]
    pub scroll_threshold_px: f64,
    /// Per-request timeout when talking to the database worker (default: 5000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_search_delay_ms() -> u64 {
    DEFAULT_SEARCH_DELAY_MS
}
fn default_scroll_threshold_px() -> f64 {
    DEFAULT_SCROLL_THRESHOLD_PX
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            page_size: DEFAULT_PAGE_SIZE,
            search_delay_ms: DEFAULT_SEARCH_DELAY_MS,
            scroll_threshold_px: DEFAULT_SCROLL_THRESHOLD_PX,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl HistoryConfig {
    /// Page size with a floor of 1; a zero page would never advance the cursor.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.max(1)
    }
}

// ============================================
// MAIN CONFIG
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryConfig>,
    /// Path to the history database; `~` is expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// tracing EnvFilter directive, e.g. "debug,rusqlite=warn"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Config {
    pub fn get_history(&self) -> HistoryConfig {
        self.history.clone().unwrap_or_default()
    }

    pub fn get_db_path(&self) -> PathBuf {
        let raw = self.db_path.as_deref().unwrap_or(DEFAULT_DB_PATH);
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }

    pub fn get_log_filter(&self) -> String {
        self.log_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}
