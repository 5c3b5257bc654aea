//! history-browser CLI
//!
//! Usage:
//!   history-browser seed --count 200
//!   history-browser browse --pages 3
//!   history-browser search "guten"
//!   printf '{"type":"loadMore"}\n' | history-browser session

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use history_browser::config::{self, Config};
use history_browser::error::ResultExt;
use history_browser::history::{
    BrowserConfig, BrowserEvent, HistoryBrowser, HistoryRecord, NewHistoryRecord, RecordId,
    ScrollMetrics, SqliteStore, Store, ViewSnapshot,
};
use history_browser::logging;
use history_browser::stdin_commands::{self, ExternalCommand};

#[derive(Parser, Debug)]
#[command(name = "history-browser")]
#[command(about = "Browse and search translation history")]
struct Cli {
    /// Config file (default: ~/.history-browser/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// History database, overrides `dbPath` from the config file
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert one record
    Add {
        /// Source text
        text: String,
        /// Translated text
        #[arg(short, long)]
        translation: Option<String>,
        /// Service that produced the translation
        #[arg(long, default_value = "manual")]
        service: String,
        #[arg(long, default_value = "auto")]
        from: String,
        #[arg(long, default_value = "en")]
        to: String,
    },
    /// Insert synthetic records, one minute apart, ending now
    Seed {
        #[arg(short, long, default_value = "100")]
        count: usize,
    },
    /// Load the first page plus `pages - 1` more, then print the list
    Browse {
        #[arg(short, long, default_value = "1")]
        pages: usize,
    },
    /// Search immediately and print the hits
    Search { text: String },
    /// Drive a browser from JSONL commands on stdin; events go to stdout
    Session,
}

const SEED_PHRASES: &[(&str, &str)] = &[
    ("Good morning", "Guten Morgen"),
    ("Where is the station?", "Wo ist der Bahnhof?"),
    ("Thank you very much", "Vielen Dank"),
    ("The weather is nice today", "Das Wetter ist heute schön"),
    ("I would like a coffee", "Ich hätte gern einen Kaffee"),
    ("See you tomorrow", "Bis morgen"),
];

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let _guard = logging::init(&config.get_log_filter());

    let db_path = cli.db.clone().unwrap_or_else(|| config.get_db_path());
    let history = config.get_history();
    let store = Arc::new(
        SqliteStore::open(&db_path, Duration::from_millis(history.request_timeout_ms))
            .with_context(|| format!("Failed to open history at {}", db_path.display()))?,
    );
    info!(db = %store.path().display(), "History store ready");

    match cli.command {
        Command::Add {
            text,
            translation,
            service,
            from,
            to,
        } => {
            let mut draft = NewHistoryRecord::new(text).with_langs(from, to);
            if let Some(translation) = translation {
                draft = draft.with_result(service, translation);
            }
            let id = store.insert(draft)?;
            println!("{}", id);
        }
        Command::Seed { count } => seed(&store, count)?,
        Command::Browse { pages } => browse(store, &config, pages)?,
        Command::Search { text } => search(store, &config, text)?,
        Command::Session => session(store, &config)?,
    }

    Ok(())
}

fn seed(store: &SqliteStore, count: usize) -> Result<()> {
    let now = Utc::now();
    for i in 0..count {
        let (source, target) = SEED_PHRASES[i % SEED_PHRASES.len()];
        let draft = NewHistoryRecord::new(format!("{} #{}", source, i))
            .with_langs("en", "de")
            .with_result("seed", target)
            .with_timestamp(now - ChronoDuration::minutes(i as i64));
        store.insert(draft)?;
    }
    info!(count, total = store.count()?, "Seeded history");
    println!("inserted {} records", count);
    Ok(())
}

/// Generous upper bound for one round-trip through the browser
fn wait_budget(config: &Config) -> Duration {
    Duration::from_millis(config.get_history().request_timeout_ms.saturating_mul(2))
}

fn open_browser(store: Arc<SqliteStore>, config: &Config) -> Result<HistoryBrowser> {
    let store: Arc<dyn Store> = store;
    HistoryBrowser::new(store, BrowserConfig::from(&config.get_history()))
}

fn browse(store: Arc<SqliteStore>, config: &Config, pages: usize) -> Result<()> {
    let browser = open_browser(store, config)?;
    let events = browser.events();
    let budget = wait_budget(config);

    browser.refresh();
    let mut snapshot = settle(&browser, budget)?;
    for _ in 1..pages {
        if !snapshot.can_load_more {
            break;
        }
        browser.load_more();
        snapshot = settle(&browser, budget)?;
    }
    report_failures(&events)?;

    print_list(&snapshot);
    Ok(())
}

fn search(store: Arc<SqliteStore>, config: &Config, text: String) -> Result<()> {
    let browser = open_browser(store, config)?;
    let events = browser.events();

    browser.search(text.clone());
    let snapshot = browser
        .wait_until(wait_budget(config), |s| {
            !s.is_loading && s.search_text == text
        })
        .context("Search did not finish in time")?;
    report_failures(&events)?;

    print_list(&snapshot);
    Ok(())
}

fn settle(browser: &HistoryBrowser, budget: Duration) -> Result<ViewSnapshot> {
    browser
        .wait_idle(budget)
        .context("History did not finish loading in time")
}

fn report_failures(events: &async_channel::Receiver<BrowserEvent>) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        if let BrowserEvent::Failed(failure) = event {
            bail!(
                "{} failed: {} (correlation id {})",
                failure.operation.as_str(),
                failure.error.user_message(),
                failure.correlation_id
            );
        }
    }
    Ok(())
}

fn print_list(snapshot: &ViewSnapshot) {
    for record in &snapshot.records {
        print_record(record);
    }
    println!(
        "-- showing {} of {}{}",
        snapshot.len(),
        snapshot.total_count,
        if snapshot.can_load_more { " (more available)" } else { "" }
    );
}

fn print_record(record: &HistoryRecord) {
    println!(
        "{:>6}  {}  {}->{}  {}",
        record.id,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.source_lang,
        record.target_lang,
        record.source_text
    );
    for result in &record.results {
        println!("        {}: {}", result.service, result.text);
    }
}

fn session(store: Arc<SqliteStore>, config: &Config) -> Result<()> {
    let browser = open_browser(store, config)?;
    let events = browser.events();

    let printer = std::thread::Builder::new()
        .name("session-events".to_string())
        .spawn(move || {
            while let Ok(event) = events.recv_blocking() {
                emit_json(&event);
            }
        })
        .context("Failed to spawn event printer")?;

    browser.refresh();

    let commands = stdin_commands::start_stdin_listener();
    while let Ok(command) = commands.recv_blocking() {
        if let Some(request_id) = command.request_id() {
            info!(request_id, command = ?command, "Handling command");
        }
        match command {
            ExternalCommand::Refresh { .. } => browser.refresh(),
            ExternalCommand::LoadMore { .. } => browser.load_more(),
            ExternalCommand::SetSearch { text, .. } => browser.set_search_text(text),
            ExternalCommand::Search { text, .. } => browser.search(text),
            ExternalCommand::Select { id } => browser.select_record(id.map(RecordId)),
            ExternalCommand::Scroll {
                offset,
                scrollable_height,
            } => browser.on_scroll(ScrollMetrics {
                offset,
                scrollable_height,
            }),
            ExternalCommand::Snapshot => match browser.snapshot() {
                Some(snapshot) => emit_json(&BrowserEvent::Changed(snapshot)),
                None => warn!("Browser stopped, no snapshot available"),
            },
            ExternalCommand::Quit => break,
        }
    }

    // Let the last command's fetch land before closing
    if browser.wait_idle(wait_budget(config)).is_none() {
        warn!("Session ended with a fetch still in flight");
    }
    // Closing the browser drops the event sender and ends the printer
    drop(browser);
    if printer.join().is_err() {
        warn!("Event printer panicked");
    }
    Ok(())
}

fn emit_json(event: &BrowserEvent) {
    let Some(line) = serde_json::to_string(event).log_err() else {
        return;
    };
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", line).and_then(|_| stdout.flush());
}
