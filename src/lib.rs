//! History Browser - paginated, searchable translation history
//!
//! This library provides the core of a history browser: a view over a
//! time-ordered record store with cursor pagination, debounced search, and
//! stale-result suppression, plus a SQLite-backed store and a JSONL session
//! protocol.

pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod stdin_commands;
