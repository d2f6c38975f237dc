//! Open-ticket age distribution.

use crate::{
    stats::{format_age, pct, round1, AgeBucket},
    ticket::TicketRecord,
    types::{MerchantId, Priority, TicketId, TicketStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBucketCount {
    pub bucket: AgeBucket,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgedTicket {
    pub ticket_id: TicketId,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub age_hours: f64,
    pub age_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTicketDistribution {
    pub total_open: usize,
    /// Always all five buckets, in age order, zero counts included.
    pub buckets: Vec<AgeBucketCount>,
    pub oldest: Vec<AgedTicket>,
}

impl OpenTicketDistribution {
    pub fn is_empty(&self) -> bool {
        self.total_open == 0
    }
}

pub fn open_ticket_distribution(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    now: DateTime<Utc>,
    oldest_limit: usize,
) -> OpenTicketDistribution {
    let open: Vec<(&TicketRecord, f64)> = tickets
        .iter()
        .filter(|t| t.merchant_id == merchant_id && t.status.is_unresolved())
        .map(|t| (t, t.age_hours(now)))
        .collect();

    let mut counts = [0usize; AgeBucket::ALL.len()];
    for (_, hours) in &open {
        let bucket = AgeBucket::for_hours(*hours);
        if let Some(slot) = AgeBucket::ALL.iter().position(|b| *b == bucket) {
            counts[slot] += 1;
        }
    }

    let buckets = AgeBucket::ALL
        .iter()
        .zip(counts)
        .map(|(bucket, count)| AgeBucketCount {
            bucket: *bucket,
            count,
            percentage: round1(pct(count, open.len())),
        })
        .collect();

    let mut by_age = open.clone();
    by_age.sort_by(|(a, ha), (b, hb)| hb.total_cmp(ha).then(a.id.cmp(&b.id)));
    let oldest = by_age
        .into_iter()
        .take(oldest_limit)
        .map(|(t, hours)| AgedTicket {
            ticket_id: t.id,
            subject: t.subject_or_default(),
            status: t.status,
            priority: t.priority,
            created_at: t.created_at,
            age_hours: round1(hours),
            age_display: format_age(hours),
        })
        .collect();

    OpenTicketDistribution {
        total_open: open.len(),
        buckets,
        oldest,
    }
}
