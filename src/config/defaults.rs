//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Records requested per pagination pass
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Quiet period after the last keystroke before a search is issued
pub const DEFAULT_SEARCH_DELAY_MS: u64 = 500;

/// Distance from the end of the scrollable area that still counts as "at the end"
pub const DEFAULT_SCROLL_THRESHOLD_PX: f64 = 0.0;

/// How long a caller waits for the database worker to answer
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Log filter used when neither RUST_LOG nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Database location relative to the home directory
pub const DEFAULT_DB_PATH: &str = "~/.history-browser/db/history.sqlite";

/// Config file location
pub const DEFAULT_CONFIG_PATH: &str = "~/.history-browser/config.json";
