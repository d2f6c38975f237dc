//! The read-only ticket record every engine computes over.
//!
//! Records come from the ticket store fully materialized. The engine never
//! writes back. Absent timestamps mean "not yet reached" and are skipped by
//! every aggregate, never coerced to zero.

use crate::types::{MerchantId, Priority, TicketId, TicketStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: TicketId,
    pub merchant_id: MerchantId,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: Priority,
    #[serde(default, rename = "type")]
    pub ticket_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_responded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_by: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fr_due_by: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_escalated: bool,
    #[serde(default)]
    pub fr_escalated: bool,
    #[serde(default)]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub requester_email: Option<String>,
    #[serde(default)]
    pub has_rating: bool,
    #[serde(default)]
    pub rating_score: Option<i64>,
    #[serde(default)]
    pub rating_feedback: Option<String>,
    #[serde(default)]
    pub rating_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conversation_count: i64,
    /// Markdown rendering of the thread, produced outside the engine.
    #[serde(default)]
    pub conversation: Option<String>,
}

impl TicketRecord {
    /// A bare open ticket. Tests and importers fill in the rest.
    pub fn new(id: TicketId, merchant_id: MerchantId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            merchant_id,
            subject: None,
            description: None,
            status: TicketStatus::Open,
            priority: Priority::Low,
            ticket_type: None,
            tags: Vec::new(),
            created_at,
            updated_at: None,
            closed_at: None,
            resolved_at: None,
            first_responded_at: None,
            due_by: None,
            fr_due_by: None,
            is_escalated: false,
            fr_escalated: false,
            requester_name: None,
            requester_email: None,
            has_rating: false,
            rating_score: None,
            rating_feedback: None,
            rating_created_at: None,
            conversation_count: 0,
            conversation: None,
        }
    }

    /// Creation time as epoch milliseconds, the resolution tickets are stored
    /// and paged at.
    pub fn created_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    /// When the ticket left the queue: `resolved_at`, else `closed_at`.
    pub fn done_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at.or(self.closed_at)
    }

    pub fn first_response_minutes(&self) -> Option<f64> {
        self.first_responded_at
            .and_then(|at| minutes_between(self.created_at, at))
    }

    pub fn resolution_minutes(&self) -> Option<f64> {
        self.done_at().and_then(|at| minutes_between(self.created_at, at))
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds().max(0) as f64 / 3_600_000.0
    }

    /// The rating, if the ticket carries a usable one.
    pub fn rating(&self) -> Option<i64> {
        if self.has_rating {
            self.rating_score
        } else {
            None
        }
    }

    pub fn email_key(&self) -> Option<String> {
        self.requester_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_ascii_lowercase)
    }

    pub fn subject_or_default(&self) -> String {
        self.subject
            .clone()
            .unwrap_or_else(|| "(no subject)".to_string())
    }

    pub fn type_or_unspecified(&self) -> String {
        self.ticket_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("unspecified")
            .to_string()
    }
}

/// Minutes from `from` to `to`. A negative span is bad source data and is
/// dropped from aggregates.
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<f64> {
    let ms = (to - from).num_milliseconds();
    if ms < 0 {
        log::warn!("negative duration {ms}ms between {from} and {to}; skipped");
        return None;
    }
    Some(ms as f64 / 60_000.0)
}
