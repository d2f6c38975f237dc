//! Review pagination tests, run against both ticket sources.

use chrono::{DateTime, Duration, TimeZone, Utc};
use cj_analytics::{
    config::AnalyticsConfig,
    review::{recent_tickets_for_review, ReviewRequest},
    source::ReviewCursor,
    types::TicketStatus,
    AnalyticsEngine, AnalyticsError, MemoryTicketSource, TicketRecord, TicketSource, TicketStore,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const MERCHANT: i64 = 1;
const MAX_LIMIT: usize = 100;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
}

/// Seven tickets; 20, 21 and 22 share one created_at.
fn fixture() -> Vec<TicketRecord> {
    let mut tickets = vec![
        TicketRecord::new(10, MERCHANT, base()),
        TicketRecord::new(11, MERCHANT, base() + Duration::minutes(5)),
        TicketRecord::new(21, MERCHANT, base() + Duration::minutes(10)),
        TicketRecord::new(20, MERCHANT, base() + Duration::minutes(10)),
        TicketRecord::new(22, MERCHANT, base() + Duration::minutes(10)),
        TicketRecord::new(30, MERCHANT, base() + Duration::minutes(20)),
        TicketRecord::new(99, 2, base() + Duration::minutes(30)),
    ];
    tickets[1].status = TicketStatus::Closed;
    tickets[5].status = TicketStatus::Pending;
    tickets
}

fn sqlite_source() -> TicketStore {
    let mut store = TicketStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_tickets(&fixture()).unwrap();
    store
}

/// Follow cursors until has_more is false; return ids in page order.
fn page_through<S: TicketSource>(source: &S, limit: usize, status: Option<&str>) -> Vec<i64> {
    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;
    for _ in 0..20 {
        let request = ReviewRequest {
            limit,
            cursor: cursor.as_deref(),
            status_filter: status,
        };
        let page = recent_tickets_for_review(source, MERCHANT, &request, MAX_LIMIT).unwrap();
        assert!(page.tickets.len() <= limit);
        ids.extend(page.tickets.iter().map(|t| t.id));
        if !page.has_more {
            assert!(page.next_cursor.is_none());
            return ids;
        }
        cursor = page.next_cursor;
    }
    panic!("pagination did not terminate: {ids:?}");
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Ties on created_at come back id-descending, each exactly once, on both sources.
#[test]
fn pagination_is_stable_across_ties() {
    let expected = vec![30, 22, 21, 20, 11, 10];
    let memory = MemoryTicketSource::new(fixture());
    let sqlite = sqlite_source();
    for limit in [1, 2, 4, 10] {
        assert_eq!(page_through(&memory, limit, None), expected, "memory, limit {limit}");
        assert_eq!(page_through(&sqlite, limit, None), expected, "sqlite, limit {limit}");
    }
}

/// Status filter narrows the page; "unresolved" covers the whole backlog.
#[test]
fn status_filter() {
    let sqlite = sqlite_source();
    assert_eq!(page_through(&sqlite, 10, Some("pending")), vec![30]);
    assert_eq!(page_through(&sqlite, 10, Some("closed")), vec![11]);
    assert_eq!(
        page_through(&sqlite, 2, Some("unresolved")),
        vec![30, 22, 21, 20, 10]
    );
}

/// has_more and the date range describe the page exactly.
#[test]
fn page_metadata() {
    let memory = MemoryTicketSource::new(fixture());
    let request = ReviewRequest {
        limit: 2,
        ..ReviewRequest::default()
    };
    let page = recent_tickets_for_review(&memory, MERCHANT, &request, MAX_LIMIT).unwrap();
    assert!(page.has_more);
    let range = page.date_range.expect("non-empty page has a range");
    assert_eq!(range.newest, base() + Duration::minutes(20));
    assert_eq!(range.oldest, base() + Duration::minutes(10));

    let cursor = ReviewCursor::decode(page.next_cursor.as_deref().unwrap_or_default()).unwrap();
    assert_eq!(cursor.ticket_id, 22);
}

/// A cursor past the last ticket yields an empty page.
#[test]
fn exhausted_cursor_is_empty() {
    let memory = MemoryTicketSource::new(fixture());
    let end = ReviewCursor {
        created_at: base(),
        ticket_id: 10,
    }
    .encode();
    let request = ReviewRequest {
        limit: 5,
        cursor: Some(&end),
        status_filter: None,
    };
    let page = recent_tickets_for_review(&memory, MERCHANT, &request, MAX_LIMIT).unwrap();
    assert!(page.is_empty());
    assert!(!page.has_more);
    assert!(page.date_range.is_none());
}

/// Bad limit, cursor or status are InvalidParameter.
#[test]
fn invalid_requests_are_rejected() {
    let engine = AnalyticsEngine::new(MemoryTicketSource::new(fixture()), AnalyticsConfig::default());
    let bad = [
        ReviewRequest { limit: 0, cursor: None, status_filter: None },
        ReviewRequest { limit: 101, cursor: None, status_filter: None },
        ReviewRequest { limit: 5, cursor: Some("yesterday"), status_filter: None },
        ReviewRequest { limit: 5, cursor: Some("17:abc"), status_filter: None },
        ReviewRequest { limit: 5, cursor: None, status_filter: Some("snoozed") },
    ];
    for request in &bad {
        assert!(
            matches!(
                engine.get_recent_tickets_for_review(MERCHANT, request),
                Err(AnalyticsError::InvalidParameter { .. })
            ),
            "Expected InvalidParameter for {request:?}"
        );
    }
}

/// Tickets within one millisecond page like ties: id-descending, each exactly once.
#[test]
fn sub_millisecond_timestamps_page_once() {
    let tickets = vec![
        TicketRecord::new(5, MERCHANT, base() + Duration::microseconds(500)),
        TicketRecord::new(9, MERCHANT, base() + Duration::microseconds(200)),
        TicketRecord::new(1, MERCHANT, base() - Duration::minutes(1)),
    ];
    let memory = MemoryTicketSource::new(tickets.clone());
    let mut store = TicketStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_tickets(&tickets).unwrap();

    for limit in [1, 2] {
        let from_memory = page_through(&memory, limit, None);
        assert_eq!(from_memory, vec![9, 5, 1], "memory, limit {limit}: got {from_memory:?}");
        assert_eq!(page_through(&store, limit, None), from_memory, "sqlite, limit {limit}");
    }
}
