//! Database operation implementations for the worker thread

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::history::types::{
    timestamp_from_millis, HistoryRecord, NewHistoryRecord, RecordId, TranslationResult,
};

const RECORD_COLUMNS: &str =
    "id, timestamp, source_lang, target_lang, source_text, results, favorite";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let raw_results: String = row.get(5)?;
    let results: Vec<TranslationResult> = match serde_json::from_str(&raw_results) {
        Ok(results) => results,
        Err(e) => {
            // A damaged payload should not hide the record from the list
            warn!(error = %e, "Failed to decode stored translation results");
            Vec::new()
        }
    };

    Ok(HistoryRecord {
        id: RecordId(row.get(0)?),
        timestamp: timestamp_from_millis(row.get(1)?),
        source_lang: row.get(2)?,
        target_lang: row.get(3)?,
        source_text: row.get(4)?,
        results,
        favorite: row.get::<_, i64>(6)? != 0,
    })
}

pub fn insert_impl(conn: &Connection, draft: NewHistoryRecord) -> StoreResult<RecordId> {
    let timestamp = draft.timestamp.unwrap_or_else(Utc::now).timestamp_millis();
    let results = serde_json::to_string(&draft.results)
        .map_err(|e| StoreError::Unavailable(format!("Failed to encode results: {}", e)))?;

    conn.execute(
        "INSERT INTO history (timestamp, source_lang, target_lang, source_text, results, favorite)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            timestamp,
            draft.source_lang,
            draft.target_lang,
            draft.source_text,
            results,
            draft.favorite as i64
        ],
    )?;

    let id = RecordId(conn.last_insert_rowid());
    debug!(id = %id, "Inserted history entry");
    Ok(id)
}

pub fn count_impl(conn: &Connection) -> StoreResult<u64> {
    let count = conn.query_row("SELECT COUNT(*) FROM history", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count.max(0) as u64)
}

pub fn fetch_page_impl(
    conn: &Connection,
    page_size: usize,
    before_ms: i64,
) -> StoreResult<Vec<HistoryRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM history WHERE timestamp < ?1
         ORDER BY timestamp DESC, id DESC LIMIT ?2",
        RECORD_COLUMNS
    ))?;

    let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![before_ms, limit], record_from_row)?;
    let page = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    debug!(page_size, before_ms, returned = page.len(), "Fetched history page");
    Ok(page)
}

/// Escape LIKE wildcards so the user's text is matched literally
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Matches the source text or the `text` of any result. Service names and
/// JSON keys in the results column are not searched; malformed JSON counts
/// as no results.
pub fn search_impl(conn: &Connection, text: &str) -> StoreResult<Vec<HistoryRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM history
         WHERE source_text LIKE ?1 ESCAPE '\\'
            OR EXISTS (
                SELECT 1 FROM json_each(CASE WHEN json_valid(history.results) THEN history.results ELSE '[]' END)
                WHERE json_extract(json_each.value, '$.text') LIKE ?1 ESCAPE '\\'
            )
         ORDER BY timestamp DESC, id DESC",
        RECORD_COLUMNS
    ))?;

    let rows = stmt.query_map(params![like_pattern(text)], record_from_row)?;
    let hits = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    debug!(query_len = text.len(), hits = hits.len(), "History search completed");
    Ok(hits)
}

pub fn remove_impl(conn: &Connection, id: RecordId) -> StoreResult<()> {
    let affected = conn.execute("DELETE FROM history WHERE id = ?1", params![id.0])?;
    if affected == 0 {
        return Err(StoreError::Unavailable(format!("Entry not found: {}", id)));
    }
    info!(id = %id, "Removed history entry");
    Ok(())
}

pub fn clear_impl(conn: &Connection) -> StoreResult<()> {
    conn.execute("DELETE FROM history", [])?;
    info!("Cleared all translation history");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
