//! SLA engine: first-response and resolution breaches.
//!
//! The two breach kinds are independent: a ticket late on both counts twice
//! in `total_breaches`. Open tickets are judged against `now`.

use crate::{
    config::SlaConfig,
    stats::{mean, round1},
    ticket::{minutes_between, TicketRecord},
    types::{MerchantId, Priority, TicketId, TicketStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    FirstResponse,
    Resolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaBreach {
    pub ticket_id: TicketId,
    pub kind: BreachKind,
    pub subject: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub actual_min: f64,
    pub threshold_min: i64,
    pub breach_by_min: f64,
    /// First-response breach on a ticket that has never been answered.
    pub no_response: bool,
    /// Resolution breach still accruing because the ticket is open.
    pub still_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaSummary {
    pub tickets_evaluated: usize,
    /// Response + resolution breaches, not deduplicated across the two.
    pub total_breaches: usize,
    pub response_breach_count: usize,
    pub resolution_breach_count: usize,
    pub avg_response_breach_min: f64,
    pub avg_resolution_breach_min: f64,
    pub no_response_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityPattern {
    pub priority: Priority,
    pub count: usize,
    pub avg_breach_min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaPatterns {
    pub by_priority: Vec<PriorityPattern>,
    pub top_tags: Vec<TagCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaExceptions {
    pub config: SlaConfig,
    pub response_breaches: Vec<SlaBreach>,
    pub resolution_breaches: Vec<SlaBreach>,
    pub summary: SlaSummary,
    pub patterns: SlaPatterns,
}

impl SlaExceptions {
    pub fn is_empty(&self) -> bool {
        self.summary.total_breaches == 0
    }
}

// ── Evaluation ───────────────────────────────────────────────────────────────

fn breach(
    t: &TicketRecord,
    kind: BreachKind,
    actual_min: f64,
    threshold_min: i64,
    no_response: bool,
    still_open: bool,
) -> SlaBreach {
    SlaBreach {
        ticket_id: t.id,
        kind,
        subject: t.subject_or_default(),
        priority: t.priority,
        status: t.status,
        tags: t.tags.clone(),
        created_at: t.created_at,
        actual_min: round1(actual_min),
        threshold_min,
        breach_by_min: round1(actual_min - threshold_min as f64),
        no_response,
        still_open,
    }
}

pub fn first_response_breach(
    t: &TicketRecord,
    config: &SlaConfig,
    now: DateTime<Utc>,
) -> Option<SlaBreach> {
    let threshold = config.first_response_min;
    match t.first_responded_at {
        Some(_) => {
            let actual = t.first_response_minutes()?;
            (actual > threshold as f64)
                .then(|| breach(t, BreachKind::FirstResponse, actual, threshold, false, false))
        }
        None if t.status.awaits_first_response() => {
            let waited = minutes_between(t.created_at, now)?;
            (waited > threshold as f64)
                .then(|| breach(t, BreachKind::FirstResponse, waited, threshold, true, true))
        }
        None => None,
    }
}

pub fn resolution_breach(
    t: &TicketRecord,
    config: &SlaConfig,
    now: DateTime<Utc>,
) -> Option<SlaBreach> {
    let threshold = config.resolution_min;
    let (actual, still_open) = if t.status.is_done() {
        (t.resolution_minutes()?, false)
    } else if config.include_pending {
        (minutes_between(t.created_at, now)?, true)
    } else {
        return None;
    };
    (actual > threshold as f64)
        .then(|| breach(t, BreachKind::Resolution, actual, threshold, false, still_open))
}

fn by_worst_first(list: &mut [SlaBreach]) {
    list.sort_by(|a, b| {
        b.breach_by_min
            .total_cmp(&a.breach_by_min)
            .then(a.ticket_id.cmp(&b.ticket_id))
    });
}

fn avg_breach(list: &[SlaBreach]) -> f64 {
    let values: Vec<f64> = list.iter().map(|b| b.breach_by_min).collect();
    round1(mean(&values).unwrap_or(0.0))
}

pub fn sla_exceptions(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    config: &SlaConfig,
    now: DateTime<Utc>,
    top_tags: usize,
) -> SlaExceptions {
    let scoped: Vec<&TicketRecord> = tickets
        .iter()
        .filter(|t| t.merchant_id == merchant_id)
        .collect();

    let mut response_breaches: Vec<SlaBreach> = scoped
        .iter()
        .filter_map(|t| first_response_breach(t, config, now))
        .collect();
    let mut resolution_breaches: Vec<SlaBreach> = scoped
        .iter()
        .filter_map(|t| resolution_breach(t, config, now))
        .collect();
    by_worst_first(&mut response_breaches);
    by_worst_first(&mut resolution_breaches);

    let summary = SlaSummary {
        tickets_evaluated: scoped.len(),
        total_breaches: response_breaches.len() + resolution_breaches.len(),
        response_breach_count: response_breaches.len(),
        resolution_breach_count: resolution_breaches.len(),
        avg_response_breach_min: avg_breach(&response_breaches),
        avg_resolution_breach_min: avg_breach(&resolution_breaches),
        no_response_count: response_breaches.iter().filter(|b| b.no_response).count(),
    };

    let patterns = breach_patterns(
        response_breaches.iter().chain(resolution_breaches.iter()),
        top_tags,
    );

    log::debug!(
        "merchant={merchant_id} sla: {} evaluated, {} response + {} resolution breaches",
        summary.tickets_evaluated,
        summary.response_breach_count,
        summary.resolution_breach_count,
    );

    SlaExceptions {
        config: *config,
        response_breaches,
        resolution_breaches,
        summary,
        patterns,
    }
}

fn breach_patterns<'a>(
    breaches: impl Iterator<Item = &'a SlaBreach>,
    top_tags: usize,
) -> SlaPatterns {
    let mut per_priority: BTreeMap<Priority, Vec<f64>> = BTreeMap::new();
    let mut tag_counts: HashMap<&str, usize> = HashMap::new();

    for b in breaches {
        per_priority.entry(b.priority).or_default().push(b.breach_by_min);
        // A tag repeated on one ticket counts once per breach.
        let mut seen: Vec<&str> = b.tags.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for tag in seen {
            *tag_counts.entry(tag).or_insert(0) += 1;
        }
    }

    // Urgent first.
    let by_priority = per_priority
        .into_iter()
        .rev()
        .map(|(priority, mins)| PriorityPattern {
            priority,
            count: mins.len(),
            avg_breach_min: round1(mean(&mins).unwrap_or(0.0)),
        })
        .collect();

    let mut tags: Vec<TagCount> = tag_counts
        .into_iter()
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags.truncate(top_tags);

    SlaPatterns {
        by_priority,
        top_tags: tags,
    }
}
