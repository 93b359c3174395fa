//! Cursor-based pagination policy
//!
//! The [`Paginator`] holds no iteration state of its own: every decision is a function of
//! the explicit [`PageCursor`] value, which only ever moves forward. The orchestrator asks
//! [`Paginator::next`] for the next request and feeds each decoded page back through
//! [`Paginator::accept`].

use serde::{Deserialize, Serialize};

/// Why a listing stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The server reported no further pages
    Exhausted,
    /// `max_counts` items were accepted
    LimitReached,
    /// A page held nothing not already seen in this run
    NoNewItems,
    /// A page could not be fetched or decoded
    PageFailed,
    /// The run was cancelled
    Cancelled,
}

/// Position in a listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageCursor {
    /// Opaque continuation token (None = first page)
    pub token: Option<String>,
    /// Whether iteration may continue
    pub has_more: bool,
    /// Items accepted so far
    pub seen: u64,
    /// Pages requested so far
    pub pages: u32,
}

impl PageCursor {
    /// Cursor before the first page
    pub fn start() -> Self {
        Self {
            token: None,
            has_more: true,
            seen: 0,
            pages: 0,
        }
    }

    /// Cursor continuing from a persisted token
    pub fn resume(token: String) -> Self {
        Self {
            token: Some(token),
            ..Self::start()
        }
    }
}

/// Request for one page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// Continuation token to send (None = first page)
    pub cursor: Option<String>,
    /// Page size to request
    pub count: u32,
    /// 1-based page number
    pub page: u32,
}

/// What a fetched page contained
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageOutcome {
    /// Continuation token for the following page
    pub next_token: Option<String>,
    /// Server's "more pages" flag
    pub has_more: bool,
    /// Items on the page
    pub fetched: usize,
    /// Items not already observed in this run
    pub new_items: usize,
}

/// Decision after a page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageStep {
    /// Cursor for the next call to [`Paginator::next`]
    pub cursor: PageCursor,
    /// How many of the page's new items to process (leading items, in page order)
    pub take: usize,
    /// Set when the listing must stop after this page
    pub stop: Option<StopReason>,
}

/// Termination and page-size policy for one listing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paginator {
    page_size: u32,
    max_counts: u64,
}

impl Paginator {
    /// Policy for `page_counts` items per page (clamped to `[1, platform_max]`) and at
    /// most `max_counts` items (0 = unlimited)
    pub fn new(page_counts: u32, platform_max: u32, max_counts: u64) -> Self {
        Self {
            page_size: page_counts.clamp(1, platform_max.max(1)),
            max_counts,
        }
    }

    /// Effective page size
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn limit_reached(&self, seen: u64) -> bool {
        self.max_counts > 0 && seen >= self.max_counts
    }

    /// Request for the page after `cursor`, or None once the cursor is terminal
    pub fn next(&self, cursor: &PageCursor) -> Option<(PageRequest, PageCursor)> {
        if !cursor.has_more || self.limit_reached(cursor.seen) {
            return None;
        }

        let mut advanced = cursor.clone();
        advanced.pages += 1;
        let request = PageRequest {
            cursor: cursor.token.clone(),
            count: self.page_size,
            page: advanced.pages,
        };
        Some((request, advanced))
    }

    /// Apply the termination policy to a fetched page
    ///
    /// The limit is checked first so a page that both fills `max_counts` and ends the
    /// listing reports [`StopReason::LimitReached`].
    pub fn accept(&self, cursor: PageCursor, outcome: &PageOutcome) -> PageStep {
        let mut take = outcome.new_items;
        if self.max_counts > 0 {
            let remaining = self.max_counts.saturating_sub(cursor.seen);
            take = take.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        }

        let mut next = PageCursor {
            token: outcome.next_token.clone().or(cursor.token),
            has_more: outcome.has_more,
            seen: cursor.seen + take as u64,
            pages: cursor.pages,
        };

        let stop = if self.limit_reached(next.seen) {
            Some(StopReason::LimitReached)
        } else if !outcome.has_more {
            Some(StopReason::Exhausted)
        } else if outcome.new_items == 0 {
            Some(StopReason::NoNewItems)
        } else {
            None
        };

        if stop.is_some() {
            next.has_more = false;
        }

        PageStep {
            cursor: next,
            take,
            stop,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Walk a remote listing of `total` items with unique ids, returning (pages, items, stop)
    fn walk(total: u64, page_counts: u32, max_counts: u64) -> (u32, u64, Option<StopReason>) {
        let paginator = Paginator::new(page_counts, 35, max_counts);
        let mut cursor = PageCursor::start();
        let mut processed = 0;
        let mut stop = None;

        while let Some((request, advanced)) = paginator.next(&cursor) {
            let offset: u64 = request.cursor.as_deref().unwrap_or("0").parse().unwrap();
            let end = (offset + u64::from(request.count)).min(total);
            let fetched = (end - offset) as usize;
            let outcome = PageOutcome {
                next_token: Some(end.to_string()),
                has_more: end < total,
                fetched,
                new_items: fetched,
            };
            let step = paginator.accept(advanced, &outcome);
            processed += step.take as u64;
            stop = step.stop;
            cursor = step.cursor;
        }

        (cursor.pages, processed, stop)
    }

    #[test]
    fn unlimited_listing_fetches_every_page() {
        assert_eq!(walk(10, 3, 0), (4, 10, Some(StopReason::Exhausted)));
        assert_eq!(walk(9, 3, 0), (3, 9, Some(StopReason::Exhausted)));
        assert_eq!(walk(1, 20, 0), (1, 1, Some(StopReason::Exhausted)));
    }

    #[test]
    fn limit_stops_mid_page() {
        assert_eq!(walk(10, 3, 5), (2, 5, Some(StopReason::LimitReached)));
        assert_eq!(walk(100, 20, 1), (1, 1, Some(StopReason::LimitReached)));
    }

    #[test]
    fn limit_larger_than_listing_exhausts() {
        assert_eq!(walk(4, 3, 50), (2, 4, Some(StopReason::Exhausted)));
    }

    #[test]
    fn limit_wins_over_exhaustion_on_the_same_page() {
        assert_eq!(walk(6, 3, 6), (2, 6, Some(StopReason::LimitReached)));
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(Paginator::new(0, 35, 0).page_size(), 1);
        assert_eq!(Paginator::new(100, 35, 0).page_size(), 35);
        assert_eq!(Paginator::new(20, 35, 0).page_size(), 20);
    }

    #[test]
    fn zero_new_items_stops_even_when_server_has_more() {
        let paginator = Paginator::new(10, 35, 0);
        let (_, cursor) = paginator.next(&PageCursor::start()).unwrap();
        let step = paginator.accept(
            cursor,
            &PageOutcome {
                next_token: Some("20".into()),
                has_more: true,
                fetched: 10,
                new_items: 0,
            },
        );
        assert_eq!(step.stop, Some(StopReason::NoNewItems));
        assert_eq!(step.take, 0);
        assert!(paginator.next(&step.cursor).is_none());
    }

    #[test]
    fn server_end_stops_even_with_new_items() {
        let paginator = Paginator::new(10, 35, 0);
        let (_, cursor) = paginator.next(&PageCursor::start()).unwrap();
        let step = paginator.accept(
            cursor,
            &PageOutcome {
                next_token: None,
                has_more: false,
                fetched: 4,
                new_items: 4,
            },
        );
        assert_eq!(step.stop, Some(StopReason::Exhausted));
        assert_eq!(step.take, 4);
    }

    #[test]
    fn next_carries_token_and_counts_pages() {
        let paginator = Paginator::new(5, 35, 0);
        let cursor = PageCursor::resume("cursor-42".into());
        let (request, advanced) = paginator.next(&cursor).unwrap();
        assert_eq!(request.cursor.as_deref(), Some("cursor-42"));
        assert_eq!(request.count, 5);
        assert_eq!(request.page, 1);
        assert_eq!(advanced.pages, 1);
        // Input cursor is untouched
        assert_eq!(cursor.pages, 0);
    }

    #[test]
    fn missing_next_token_keeps_previous() {
        let paginator = Paginator::new(5, 35, 0);
        let (_, cursor) = paginator.next(&PageCursor::resume("a".into())).unwrap();
        let step = paginator.accept(
            cursor,
            &PageOutcome {
                next_token: None,
                has_more: true,
                fetched: 5,
                new_items: 5,
            },
        );
        assert_eq!(step.cursor.token.as_deref(), Some("a"));
        assert!(step.stop.is_none());
    }
}
