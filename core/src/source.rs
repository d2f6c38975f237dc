//! Ticket source trait and query description.
//!
//! RULE: engines never talk to storage. They describe what they need as a
//! `TicketQuery`, a `TicketSource` materializes it, and the pure report
//! functions run over the returned records.

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    ticket::TicketRecord,
    types::{MerchantId, TicketId, TicketStatus},
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Position after the last ticket of a review page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCursor {
    pub created_at: DateTime<Utc>,
    pub ticket_id: TicketId,
}

impl ReviewCursor {
    pub fn after(ticket: &TicketRecord) -> Self {
        Self {
            created_at: ticket.created_at,
            ticket_id: ticket.id,
        }
    }

    /// Opaque wire form: `<created_at epoch ms>:<ticket id>`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.created_at.timestamp_millis(), self.ticket_id)
    }

    pub fn decode(raw: &str) -> AnalyticsResult<Self> {
        let bad = || AnalyticsError::invalid(format!("malformed cursor '{raw}'"));
        let (ms, id) = raw.trim().split_once(':').ok_or_else(bad)?;
        let ms: i64 = ms.parse().map_err(|_| bad())?;
        let ticket_id: TicketId = id.parse().map_err(|_| bad())?;
        let created_at = Utc.timestamp_millis_opt(ms).single().ok_or_else(bad)?;
        Ok(Self {
            created_at,
            ticket_id,
        })
    }

    /// True when `ticket` sorts strictly after this cursor in
    /// `(created_at DESC, ticket_id DESC)` order, at millisecond resolution.
    pub fn precedes(&self, ticket: &TicketRecord) -> bool {
        let at = self.created_at.timestamp_millis();
        let ms = ticket.created_ms();
        ms < at || (ms == at && ticket.id < self.ticket_id)
    }
}

/// Half-open instant range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.to
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicketQuery {
    merchant_id: MerchantId,
    pub created: Option<TimeRange>,
    /// Rated tickets whose `rating_created_at` falls in the range.
    pub rated: Option<TimeRange>,
    /// Tickets whose `resolved_at` (else `closed_at`) falls in the range.
    pub resolved: Option<TimeRange>,
    pub statuses: Option<Vec<TicketStatus>>,
    pub after: Option<ReviewCursor>,
    pub newest_first: bool,
    pub limit: Option<usize>,
}

impl TicketQuery {
    /// The only constructor: a query without a tenant cannot be built.
    pub fn for_merchant(merchant_id: MerchantId) -> Self {
        Self {
            merchant_id,
            created: None,
            rated: None,
            resolved: None,
            statuses: None,
            after: None,
            newest_first: false,
            limit: None,
        }
    }

    pub fn merchant_id(&self) -> MerchantId {
        self.merchant_id
    }

    pub fn created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created = Some(TimeRange::new(from, to));
        self
    }

    pub fn rated_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.rated = Some(TimeRange::new(from, to));
        self
    }

    pub fn resolved_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.resolved = Some(TimeRange::new(from, to));
        self
    }

    pub fn with_statuses(mut self, statuses: &[TicketStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn after(mut self, cursor: Option<ReviewCursor>) -> Self {
        self.after = cursor;
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Every predicate except ordering and limit.
    pub fn matches(&self, t: &TicketRecord) -> bool {
        if t.merchant_id != self.merchant_id {
            return false;
        }
        if let Some(range) = self.created {
            if !range.contains(t.created_at) {
                return false;
            }
        }
        if let Some(range) = self.rated {
            let rated_in_range = t.has_rating
                && t.rating_created_at.is_some_and(|at| range.contains(at));
            if !rated_in_range {
                return false;
            }
        }
        if let Some(range) = self.resolved {
            if !t.done_at().is_some_and(|at| range.contains(at)) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&t.status) {
                return false;
            }
        }
        if let Some(cursor) = &self.after {
            if !cursor.precedes(t) {
                return false;
            }
        }
        true
    }
}

/// `(created_at DESC, ticket_id DESC)`. Compared in whole milliseconds, the
/// resolution of the store and of the review cursor.
pub fn newest_first_order(a: &TicketRecord, b: &TicketRecord) -> Ordering {
    b.created_ms().cmp(&a.created_ms()).then(b.id.cmp(&a.id))
}

/// `(created_at ASC, ticket_id ASC)`.
pub fn oldest_first_order(a: &TicketRecord, b: &TicketRecord) -> Ordering {
    newest_first_order(b, a)
}

/// Read-only access to a merchant's tickets.
pub trait TicketSource {
    /// Materialize every ticket matching `query`.
    ///
    /// Implementations must honor the merchant scope, ordering, and limit.
    /// A failing backend returns `AnalyticsError::Upstream`; no retries.
    fn fetch(&self, query: &TicketQuery) -> AnalyticsResult<Vec<TicketRecord>>;
}

impl<S: TicketSource + ?Sized> TicketSource for &S {
    fn fetch(&self, query: &TicketQuery) -> AnalyticsResult<Vec<TicketRecord>> {
        (**self).fetch(query)
    }
}

/// Tickets already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTicketSource {
    tickets: Vec<TicketRecord>,
}

impl MemoryTicketSource {
    pub fn new(tickets: Vec<TicketRecord>) -> Self {
        Self { tickets }
    }
}

impl TicketSource for MemoryTicketSource {
    fn fetch(&self, query: &TicketQuery) -> AnalyticsResult<Vec<TicketRecord>> {
        let mut out: Vec<TicketRecord> = self
            .tickets
            .iter()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        if query.newest_first {
            out.sort_by(newest_first_order);
        } else {
            out.sort_by(oldest_first_order);
        }
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wire_form() {
        let at = Utc.timestamp_millis_opt(1_704_877_200_123).unwrap();
        let cursor = ReviewCursor {
            created_at: at,
            ticket_id: 42,
        };
        assert_eq!(cursor.encode(), "1704877200123:42");
        assert_eq!(ReviewCursor::decode(" 1704877200123:42 ").unwrap(), cursor);
        for bad in ["", "42", "abc:1", "1:abc", "1:2:3"] {
            assert!(ReviewCursor::decode(bad).is_err(), "accepted '{bad}'");
        }
    }

    #[test]
    fn cursor_breaks_ties_by_id() {
        let at = Utc.timestamp_millis_opt(1_000).unwrap();
        let cursor = ReviewCursor {
            created_at: at,
            ticket_id: 5,
        };
        assert!(cursor.precedes(&TicketRecord::new(4, 1, at)));
        assert!(!cursor.precedes(&TicketRecord::new(5, 1, at)));
        assert!(!cursor.precedes(&TicketRecord::new(6, 1, at)));
    }

    #[test]
    fn memory_source_orders_and_limits() {
        let at = Utc.timestamp_millis_opt(1_000).unwrap();
        let source = MemoryTicketSource::new(vec![
            TicketRecord::new(1, 1, at),
            TicketRecord::new(3, 1, at),
            TicketRecord::new(2, 1, at),
            TicketRecord::new(9, 2, at),
        ]);
        let q = TicketQuery::for_merchant(1).newest_first().limit(2);
        let ids: Vec<TicketId> = source.fetch(&q).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
