//! Cursor-based incremental loading.
//!
//! State machine: `Idle -> Loading -> Idle`, entered only through a refresh
//! or a load-more. At most one fetch owns the controller at a time; a second
//! refresh or load-more while loading is refused. Every request carries the
//! epoch it was issued under and a completion from an older epoch is inert.
//!
//! Search mode detaches the list from the cursor. Only a successful refresh
//! reattaches it; until then load-more is refused.

use tracing::debug;

use super::types::{Cursor, HistoryRecord};
use super::view_state::ViewState;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Refresh,
    LoadMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading { epoch: u64, kind: LoadKind },
}

/// Parameters of one in-flight fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub epoch: u64,
    pub kind: LoadKind,
    pub page_size: usize,
    pub before: Cursor,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page applied; this many records survived dedup
    Appended(usize),
    /// Store returned an empty page
    EndOfData,
    /// Superseded by a later refresh or by search mode
    Stale,
    /// Current request failed; list untouched
    Failed(StoreError),
}

#[derive(Debug)]
pub struct PaginationController {
    cursor: Cursor,
    page_size: usize,
    phase: Phase,
    epoch: u64,
    detached: bool,
}

impl PaginationController {
    pub fn new(page_size: usize) -> Self {
        PaginationController {
            cursor: Cursor::now(),
            page_size: page_size.max(1),
            phase: Phase::Idle,
            epoch: 0,
            detached: false,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    /// Not loading, not searching, the list still follows the cursor, and the
    /// store may still hold unseen records.
    pub fn can_load_more(&self, view: &ViewState) -> bool {
        !self.is_loading()
            && !self.detached
            && view.search_text().is_empty()
            && (view.total_count() == 0 || (view.len() as u64) < view.total_count())
    }

    /// Start over from `now`, or `None` while another fetch is in flight.
    /// The cursor only moves once the refresh succeeds.
    pub fn begin_refresh(&mut self, now: Cursor) -> Option<PageRequest> {
        if self.is_loading() {
            return None;
        }
        self.epoch += 1;
        let mut request = self.start(LoadKind::Refresh);
        request.before = now;
        Some(request)
    }

    /// Claim the controller for one more page, or `None` if loading is not allowed.
    pub fn begin_load_more(&mut self, view: &ViewState) -> Option<PageRequest> {
        if !self.can_load_more(view) {
            return None;
        }
        Some(self.start(LoadKind::LoadMore))
    }

    /// Search mode took over the list: orphan whatever is in flight.
    pub fn suspend(&mut self) {
        self.epoch += 1;
        self.detached = true;
        if self.is_loading() {
            debug!(epoch = self.epoch, "Pagination fetch superseded by search");
        }
        self.phase = Phase::Idle;
    }

    /// True if `request` still owns the controller
    fn accepts(&self, request: &PageRequest) -> bool {
        matches!(self.phase, Phase::Loading { epoch, kind } if epoch == request.epoch && kind == request.kind)
    }

    /// Apply a load-more completion
    pub fn complete_page(
        &mut self,
        request: &PageRequest,
        result: Result<Vec<HistoryRecord>, StoreError>,
        view: &mut ViewState,
    ) -> PageOutcome {
        if !self.release(request) {
            return PageOutcome::Stale;
        }
        match result {
            Ok(page) => self.absorb(page, view),
            Err(e) => PageOutcome::Failed(e),
        }
    }

    /// Apply a refresh completion: the authoritative count plus the first page.
    /// The list is only replaced on success; a failure leaves it and the
    /// cursor as they were.
    pub fn complete_refresh(
        &mut self,
        request: &PageRequest,
        result: Result<(u64, Vec<HistoryRecord>), StoreError>,
        view: &mut ViewState,
    ) -> PageOutcome {
        if !self.release(request) {
            return PageOutcome::Stale;
        }
        match result {
            Ok((total_count, page)) => {
                view.clear_records();
                view.set_total_count(total_count);
                self.cursor = request.before;
                self.detached = false;
                self.absorb(page, view)
            }
            Err(e) => PageOutcome::Failed(e),
        }
    }

    fn start(&mut self, kind: LoadKind) -> PageRequest {
        self.phase = Phase::Loading {
            epoch: self.epoch,
            kind,
        };
        PageRequest {
            epoch: self.epoch,
            kind,
            page_size: self.page_size,
            before: self.cursor,
        }
    }

    // Back to Idle on every exit path of a current request, including failure
    fn release(&mut self, request: &PageRequest) -> bool {
        if !self.accepts(request) {
            debug!(
                epoch = request.epoch,
                current = self.epoch,
                kind = ?request.kind,
                "Dropping stale page"
            );
            return false;
        }
        self.phase = Phase::Idle;
        true
    }

    fn absorb(&mut self, page: Vec<HistoryRecord>, view: &mut ViewState) -> PageOutcome {
        let Some(last) = page.last() else {
            return PageOutcome::EndOfData;
        };
        self.cursor.advance_to(last.timestamp);
        PageOutcome::Appended(view.append_unique(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::types::{NewHistoryRecord, RecordId};
    use chrono::{DateTime, Duration, Utc};

    fn record_at(id: i64, ts: DateTime<Utc>) -> HistoryRecord {
        NewHistoryRecord::new(format!("r{}", id))
            .with_timestamp(ts)
            .into_record(RecordId(id))
    }

    /// `n` records, newest first, one second apart below `top`
    fn page(top: DateTime<Utc>, first_id: i64, n: i64) -> Vec<HistoryRecord> {
        (0..n)
            .map(|i| record_at(first_id + i, top - Duration::seconds(i + 1)))
            .collect()
    }

    #[test]
    fn test_refresh_then_load_more_advances_cursor() {
        let now = Utc::now();
        let mut pagination = PaginationController::new(3);
        let mut view = ViewState::new();

        let refresh = pagination.begin_refresh(Cursor::at(now)).unwrap();
        assert!(pagination.is_loading());
        let first = page(now, 1, 3);
        let oldest = first[2].timestamp;
        let outcome = pagination.complete_refresh(&refresh, Ok((10, first)), &mut view);

        assert_eq!(outcome, PageOutcome::Appended(3));
        assert_eq!(view.total_count(), 10);
        assert_eq!(pagination.cursor().timestamp(), oldest);
        assert!(!pagination.is_loading());

        let more = pagination.begin_load_more(&view).unwrap();
        assert_eq!(more.before.timestamp(), oldest);
        assert_eq!(more.page_size, 3);
    }

    #[test]
    fn test_second_load_more_while_loading_is_noop() {
        let mut pagination = PaginationController::new(20);
        let view = ViewState::new();

        assert!(pagination.begin_load_more(&view).is_some());
        assert!(pagination.begin_load_more(&view).is_none());
    }

    #[test]
    fn test_cannot_load_more_while_searching() {
        let mut pagination = PaginationController::new(20);
        let mut view = ViewState::new();
        view.set_search_text("abc");
        assert!(!pagination.can_load_more(&view));
        assert!(pagination.begin_load_more(&view).is_none());
    }

    #[test]
    fn test_cannot_load_more_when_all_loaded() {
        let now = Utc::now();
        let pagination = PaginationController::new(20);
        let mut view = ViewState::new();
        view.append_unique(page(now, 1, 2));
        view.set_total_count(2);
        assert!(!pagination.can_load_more(&view));

        view.set_total_count(0);
        assert!(pagination.can_load_more(&view));
    }

    #[test]
    fn test_empty_page_leaves_list_and_cursor() {
        let mut pagination = PaginationController::new(5);
        let mut view = ViewState::new();
        let cursor = pagination.cursor();

        let request = pagination.begin_load_more(&view).unwrap();
        let outcome = pagination.complete_page(&request, Ok(Vec::new()), &mut view);

        assert_eq!(outcome, PageOutcome::EndOfData);
        assert_eq!(pagination.cursor(), cursor);
        assert!(view.is_empty());
        assert!(!pagination.is_loading());
    }

    #[test]
    fn test_failure_clears_loading() {
        let mut pagination = PaginationController::new(5);
        let mut view = ViewState::new();

        let request = pagination.begin_load_more(&view).unwrap();
        let outcome = pagination.complete_page(
            &request,
            Err(StoreError::Unavailable("disk".into())),
            &mut view,
        );

        assert!(matches!(outcome, PageOutcome::Failed(_)));
        assert!(!pagination.is_loading());
        assert!(pagination.begin_load_more(&view).is_some());
    }

    #[test]
    fn test_duplicates_across_pages_are_dropped() {
        let now = Utc::now();
        let mut pagination = PaginationController::new(3);
        let mut view = ViewState::new();

        let request = pagination.begin_load_more(&view).unwrap();
        pagination.complete_page(&request, Ok(page(now, 1, 3)), &mut view);

        // Second page repeats id 3 at the boundary
        let boundary = view.snapshot(false, false).records[2].timestamp;
        let mut next = vec![record_at(3, boundary)];
        next.extend(page(boundary, 4, 2));
        let request = pagination.begin_load_more(&view).unwrap();
        let outcome = pagination.complete_page(&request, Ok(next), &mut view);

        assert_eq!(outcome, PageOutcome::Appended(2));
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn test_suspend_orphans_in_flight_load() {
        let now = Utc::now();
        let mut pagination = PaginationController::new(3);
        let mut view = ViewState::new();

        let request = pagination.begin_load_more(&view).unwrap();
        pagination.suspend();
        assert!(!pagination.is_loading());

        let outcome = pagination.complete_page(&request, Ok(page(now, 1, 3)), &mut view);
        assert_eq!(outcome, PageOutcome::Stale);
        assert!(view.is_empty());
    }

    #[test]
    fn test_refresh_while_loading_is_noop() {
        let now = Utc::now();
        let mut pagination = PaginationController::new(3);
        let mut view = ViewState::new();

        let load = pagination.begin_load_more(&view).unwrap();
        assert!(pagination.begin_refresh(Cursor::at(now)).is_none());

        let applied = pagination.complete_page(&load, Ok(page(now, 1, 3)), &mut view);
        assert_eq!(applied, PageOutcome::Appended(3));
        assert!(pagination.begin_refresh(Cursor::at(now)).is_some());
    }

    #[test]
    fn test_failed_refresh_keeps_list_and_cursor() {
        let now = Utc::now();
        let mut pagination = PaginationController::new(3);
        let mut view = ViewState::new();

        let refresh = pagination.begin_refresh(Cursor::at(now)).unwrap();
        pagination.complete_refresh(&refresh, Ok((10, page(now, 1, 3))), &mut view);
        let cursor = pagination.cursor();

        let later = now + Duration::seconds(30);
        let retry = pagination.begin_refresh(Cursor::at(later)).unwrap();
        let outcome = pagination.complete_refresh(
            &retry,
            Err(StoreError::Timeout(Default::default())),
            &mut view,
        );

        assert!(matches!(outcome, PageOutcome::Failed(_)));
        assert_eq!(view.len(), 3);
        assert_eq!(view.total_count(), 10);
        assert_eq!(pagination.cursor(), cursor);
        assert!(pagination.can_load_more(&view));
    }

    #[test]
    fn test_suspended_list_needs_refresh_before_paging() {
        let now = Utc::now();
        let mut pagination = PaginationController::new(3);
        let mut view = ViewState::new();

        pagination.suspend();
        // Zero-hit search left an empty list with a zero total
        view.replace(Vec::new());
        view.set_total_count(0);
        assert!(!pagination.can_load_more(&view));
        assert!(pagination.begin_load_more(&view).is_none());

        let refresh = pagination.begin_refresh(Cursor::at(now)).unwrap();
        pagination.complete_refresh(&refresh, Ok((5, page(now, 1, 3))), &mut view);
        assert!(pagination.can_load_more(&view));
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let mut pagination = PaginationController::new(0);
        let request = pagination.begin_load_more(&ViewState::new()).unwrap();
        assert_eq!(request.page_size, 1);
    }
}
