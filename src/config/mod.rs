//! Configuration module - Application settings
//!
//! This module provides functionality for:
//! - Loading configuration from ~/.history-browser/config.json
//! - Default values for all settings
//! - Type definitions for config structures
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Configuration struct definitions (Config, HistoryConfig)
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_SCROLL_THRESHOLD_PX, DEFAULT_SEARCH_DELAY_MS,
};

pub use types::{Config, HistoryConfig};

pub use loader::{default_config_path, load_config, load_config_from};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
