//! Search generation bookkeeping.
//!
//! Every search (and every refresh) bumps the generation. A completion is
//! applied only if it carries the current generation; anything older is
//! inert no matter when it arrives. The cancel token handed to the store is
//! advisory and only saves work.

use tracing::debug;

use super::store::CancelToken;
use super::types::HistoryRecord;
use crate::error::StoreError;

/// Identifies one issued search and carries its cancel token
#[derive(Debug, Clone)]
pub struct SearchTicket {
    pub generation: u64,
    pub cancel: CancelToken,
}

/// What the browser should do with a completed search
#[derive(Debug)]
pub enum SearchOutcome {
    /// Current generation: replace the list with these records
    Applied(Vec<HistoryRecord>),
    /// A newer search or refresh was issued since; drop silently
    Stale,
    /// The store honoured the cancel token; drop silently
    Canceled,
    /// Current generation failed; surface it and keep the list as is
    Failed(StoreError),
}

#[derive(Debug, Default)]
pub struct SearchCoordinator {
    generation: u64,
    active: Option<SearchTicket>,
}

impl SearchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the current generation's search has not completed
    pub fn in_flight(&self) -> bool {
        self.active.is_some()
    }

    /// Issue a new search: bump the generation and cancel the previous one.
    pub fn begin(&mut self) -> SearchTicket {
        self.cancel_active();
        self.generation += 1;
        let ticket = SearchTicket {
            generation: self.generation,
            cancel: CancelToken::new(),
        };
        self.active = Some(ticket.clone());
        debug!(generation = ticket.generation, "Search issued");
        ticket
    }

    /// Invalidate whatever is in flight without issuing a new search
    /// (search mode exited, or a refresh took over the list).
    pub fn invalidate(&mut self) {
        self.cancel_active();
        self.generation += 1;
        debug!(generation = self.generation, "Search generation invalidated");
    }

    fn is_current(&self, ticket: &SearchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Classify a completion. Only a current ticket touches coordinator state.
    pub fn complete(
        &mut self,
        ticket: &SearchTicket,
        result: Result<Vec<HistoryRecord>, StoreError>,
    ) -> SearchOutcome {
        if !self.is_current(ticket) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                "Dropping stale search result"
            );
            return SearchOutcome::Stale;
        }

        self.active = None;
        match result {
            Ok(records) => SearchOutcome::Applied(records),
            Err(e) if e.is_canceled() => SearchOutcome::Canceled,
            Err(e) => SearchOutcome::Failed(e),
        }
    }

    fn cancel_active(&mut self) {
        if let Some(previous) = self.active.take() {
            previous.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::types::{NewHistoryRecord, RecordId};

    fn record(id: i64, text: &str) -> HistoryRecord {
        NewHistoryRecord::new(text).into_record(RecordId(id))
    }

    #[test]
    fn test_generation_is_monotonic() {
        let mut search = SearchCoordinator::new();
        let a = search.begin();
        search.invalidate();
        let b = search.begin();
        assert!(b.generation > a.generation);
        assert!(search.is_current(&b));
        assert!(!search.is_current(&a));
    }

    #[test]
    fn test_newer_search_cancels_older_token() {
        let mut search = SearchCoordinator::new();
        let a = search.begin();
        let b = search.begin();
        assert!(a.cancel.is_cancelled());
        assert!(!b.cancel.is_cancelled());
    }

    #[test]
    fn test_late_result_of_superseded_search_is_stale() {
        let mut search = SearchCoordinator::new();
        let a = search.begin();
        let ab = search.begin();

        let applied = search.complete(&ab, Ok(vec![record(2, "ab")]));
        assert!(matches!(applied, SearchOutcome::Applied(ref r) if r[0].source_text == "ab"));

        // "a" arrives after "ab" was applied
        let late = search.complete(&a, Ok(vec![record(1, "a")]));
        assert!(matches!(late, SearchOutcome::Stale));
    }

    #[test]
    fn test_stale_failure_is_not_surfaced() {
        let mut search = SearchCoordinator::new();
        let a = search.begin();
        let _b = search.begin();
        let outcome = search.complete(&a, Err(StoreError::Unavailable("down".into())));
        assert!(matches!(outcome, SearchOutcome::Stale));
        assert!(search.in_flight());
    }

    #[test]
    fn test_current_failure_is_surfaced() {
        let mut search = SearchCoordinator::new();
        let a = search.begin();
        let outcome = search.complete(&a, Err(StoreError::Timeout(Default::default())));
        assert!(matches!(outcome, SearchOutcome::Failed(StoreError::Timeout(_))));
        assert!(!search.in_flight());
    }

    #[test]
    fn test_current_cancel_is_absorbed() {
        let mut search = SearchCoordinator::new();
        let a = search.begin();
        let outcome = search.complete(&a, Err(StoreError::Canceled));
        assert!(matches!(outcome, SearchOutcome::Canceled));
    }

    #[test]
    fn test_invalidate_makes_in_flight_stale() {
        let mut search = SearchCoordinator::new();
        let a = search.begin();
        search.invalidate();
        assert!(!search.in_flight());
        assert!(a.cancel.is_cancelled());
        assert!(matches!(
            search.complete(&a, Ok(Vec::new())),
            SearchOutcome::Stale
        ));
    }
}
