//! External command handling via stdin.
//!
//! Drives a history browser session from JSONL commands. Used by the
//! `session` subcommand for scripting and end-to-end testing.
//!
//! # Protocol
//!
//! Commands are sent as JSON objects, one per line (JSONL format):
//!
//! ```json
//! {"type": "refresh"}
//! {"type": "loadMore"}
//! {"type": "setSearch", "text": "guten"}
//! {"type": "search", "text": "guten"}
//! {"type": "select", "id": 42}
//! {"type": "scroll", "offset": 780.0, "scrollableHeight": 800.0}
//! {"type": "snapshot"}
//! {"type": "quit"}
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! printf '{"type":"refresh"}\n{"type":"loadMore"}\n' | history-browser session
//! ```

use tracing::{debug, info, warn};

/// Commands that can be sent to a session via stdin
///
/// Commands that mutate the view support an optional `requestId` field for
/// correlation. When present, it is logged with the operation.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExternalCommand {
    /// Reload from the newest record
    Refresh {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Fetch the next page
    LoadMore {
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Type into the search field (debounced)
    SetSearch {
        text: String,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Search immediately
    Search {
        text: String,
        #[serde(default, rename = "requestId")]
        request_id: Option<String>,
    },
    /// Select a record by id; omit `id` or pass null to clear
    Select {
        #[serde(default)]
        id: Option<i64>,
    },
    /// Report a scroll position
    Scroll {
        offset: f64,
        #[serde(rename = "scrollableHeight")]
        scrollable_height: f64,
    },
    /// Print the current snapshot
    Snapshot,
    /// End the session
    Quit,
}

impl ExternalCommand {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ExternalCommand::Refresh { request_id }
            | ExternalCommand::LoadMore { request_id }
            | ExternalCommand::SetSearch { request_id, .. }
            | ExternalCommand::Search { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

/// Start a thread that listens on stdin for external JSONL commands.
/// Returns an async_channel::Receiver that can be awaited without polling.
///
/// # Channel Capacity
///
/// Uses a bounded channel with capacity of 100 to prevent unbounded memory growth.
/// This is generous for stdin commands which typically arrive at < 10/sec.
///
/// The reader thread exits at end of input or once the receiver is dropped.
pub fn start_stdin_listener() -> async_channel::Receiver<ExternalCommand> {
    use std::io::BufRead;

    let (tx, rx) = async_channel::bounded(100);

    let spawned = std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            info!("External command listener started");
            let stdin = std::io::stdin();
            let reader = stdin.lock();

            for line in reader.lines() {
                match line {
                    Ok(line) if !line.trim().is_empty() => match parse_command(&line) {
                        Some(cmd) => {
                            // send_blocking is used since we're in a sync thread
                            if tx.send_blocking(cmd).is_err() {
                                debug!("Command channel closed, exiting");
                                break;
                            }
                        }
                        None => continue,
                    },
                    Ok(_) => {} // Empty line, ignore
                    Err(e) => {
                        warn!(error = %e, "Error reading stdin");
                        break;
                    }
                }
            }
            info!("External command listener exiting");
        });

    if let Err(e) = spawned {
        // rx reports closed immediately; the session ends
        warn!(error = %e, "Failed to spawn stdin listener");
    }

    rx
}

/// Parse one JSONL line, logging (not failing on) malformed input
pub fn parse_command(line: &str) -> Option<ExternalCommand> {
    match serde_json::from_str::<ExternalCommand>(line) {
        Ok(cmd) => {
            debug!(command = ?cmd, request_id = cmd.request_id(), "Parsed command");
            Some(cmd)
        }
        Err(e) => {
            warn!(error = %e, line = %line, "Failed to parse command");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
