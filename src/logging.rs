//! Structured JSONL logging for tooling and human-readable stderr output.
//!
//! This module provides dual-output logging:
//! - **JSONL to file** (~/.history-browser/logs/history-browser.jsonl) - structured for parsing
//! - **Pretty to stderr** - human-readable for developers
//!
//! # Usage
//!
//! ```rust,ignore
//! use history_browser::logging;
//!
//! // Initialize logging - MUST keep guard alive for duration of program
//! let _guard = logging::init("info");
//!
//! // Use tracing macros directly
//! tracing::info!(event_type = "app_start", "Application started");
//! ```
//!
//! # JSONL Output Format
//!
//! Each line is a valid JSON object:
//! ```json
//! {"timestamp":"2026-10-19T10:30:45.123Z","level":"INFO","target":"history_browser::history::browser","fields":{"message":"Page applied","epoch":3,"appended":20}}
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the dual-output logging system.
///
/// `default_filter` is used when `RUST_LOG` is not set.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
/// If the log file cannot be opened, only the stderr layer is installed.
pub fn init(default_filter: &str) -> LoggingGuard {
    let log_dir = get_log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_dir.join("history-browser.jsonl");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Pretty layer for stderr (human developers)
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    let file = OpenOptions::new().create(true).append(true).open(&log_path);

    // JSONL layer is optional: without a writable log file only stderr is installed
    let (json_layer, file_guard) = match file {
        Ok(file) => {
            // Non-blocking writer so store workers never wait on disk
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file);

            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_level(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_span_events(FmtSpan::NONE);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            (None, None)
        }
    };

    // try_init: a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init();

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Application logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the log directory path (~/.history-browser/logs/)
fn get_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".history-browser").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("history-browser-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join("history-browser.jsonl")
}

/// Threshold above which a store call is reported as slow
pub const SLOW_STORE_OP_MS: u64 = 250;

/// Log the outcome of one store call with structured fields
pub fn log_store_op(operation: &str, duration_ms: u64, success: bool) {
    if duration_ms > SLOW_STORE_OP_MS {
        tracing::warn!(
            event_type = "store_op",
            operation = operation,
            duration_ms = duration_ms,
            success = success,
            is_slow = true,
            "Slow store operation: {} took {}ms",
            operation,
            duration_ms
        );
    } else {
        tracing::debug!(
            event_type = "store_op",
            operation = operation,
            duration_ms = duration_ms,
            success = success,
            "Store operation {} completed in {}ms",
            operation,
            duration_ms
        );
    }
}
