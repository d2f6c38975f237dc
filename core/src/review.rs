//! Cursor pagination over recent tickets for manual review.
//!
//! Order is `(created_at DESC, ticket_id DESC)`. A page is fetched with one
//! extra row so `has_more` needs no separate count.

use crate::{
    error::{AnalyticsError, AnalyticsResult},
    source::{ReviewCursor, TicketQuery, TicketSource},
    ticket::TicketRecord,
    types::{parse_status_filter, MerchantId, TicketStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDateRange {
    pub newest: DateTime<Utc>,
    pub oldest: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPage {
    pub tickets: Vec<TicketRecord>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub date_range: Option<PageDateRange>,
}

impl ReviewPage {
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewRequest<'a> {
    pub limit: usize,
    pub cursor: Option<&'a str>,
    pub status_filter: Option<&'a str>,
}

pub fn validate_limit(limit: usize, max_limit: usize) -> AnalyticsResult<usize> {
    if limit == 0 || limit > max_limit {
        return Err(AnalyticsError::invalid(format!(
            "limit must be between 1 and {max_limit}, got {limit}"
        )));
    }
    Ok(limit)
}

/// Shape one over-fetched batch (`limit + 1` rows at most) into a page.
pub fn page_from_batch(mut batch: Vec<TicketRecord>, limit: usize) -> ReviewPage {
    let has_more = batch.len() > limit;
    batch.truncate(limit);
    let next_cursor = if has_more {
        batch.last().map(|t| ReviewCursor::after(t).encode())
    } else {
        None
    };
    let date_range = match (batch.first(), batch.last()) {
        (Some(first), Some(last)) => Some(PageDateRange {
            newest: first.created_at,
            oldest: last.created_at,
        }),
        _ => None,
    };
    ReviewPage {
        tickets: batch,
        has_more,
        next_cursor,
        date_range,
    }
}

pub fn recent_tickets_for_review<S: TicketSource + ?Sized>(
    source: &S,
    merchant_id: MerchantId,
    request: &ReviewRequest<'_>,
    max_limit: usize,
) -> AnalyticsResult<ReviewPage> {
    let limit = validate_limit(request.limit, max_limit)?;
    let cursor = request.cursor.map(ReviewCursor::decode).transpose()?;
    let statuses: Option<Vec<TicketStatus>> =
        request.status_filter.map(parse_status_filter).transpose()?;

    let mut query = TicketQuery::for_merchant(merchant_id)
        .after(cursor)
        .newest_first()
        .limit(limit + 1);
    if let Some(statuses) = &statuses {
        query = query.with_statuses(statuses);
    }

    let batch = source.fetch(&query)?;
    let page = page_from_batch(batch, limit);
    log::debug!(
        "merchant={merchant_id} review: page of {} (has_more={})",
        page.tickets.len(),
        page.has_more
    );
    Ok(page)
}
