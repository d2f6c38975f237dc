//! CSAT engine: deduplicated satisfaction score and the per-survey log.
//!
//! Only `103` counts as satisfied and only negative scores count as
//! unsatisfied. `100`–`102` sit in `total_ratings` without landing in either
//! bucket.

use crate::{
    source::TimeRange,
    stats::{pct, round1, round2},
    ticket::TicketRecord,
    types::{is_satisfied, is_unsatisfied, rating_label, MerchantId, RatingFilter, TicketId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsatResult {
    pub percentage: f64,
    pub total_ratings: usize,
    pub satisfied_count: usize,
    pub unsatisfied_count: usize,
}

impl CsatResult {
    pub fn is_empty(&self) -> bool {
        self.total_ratings == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyEntry {
    pub ticket_id: TicketId,
    pub subject: String,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub rating_score: i64,
    pub rating_label: String,
    pub feedback: Option<String>,
    pub rated_at: Option<DateTime<Utc>>,
    pub below_threshold: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsatDetailSummary {
    pub total_surveys: usize,
    pub below_threshold_count: usize,
    pub rating_threshold: i64,
    pub average_score: Option<f64>,
    /// Count per rating label, e.g. `"Extremely Happy" -> 4`.
    pub by_label: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsatDetailLog {
    pub summary: CsatDetailSummary,
    /// Ascending by score, worst survey first.
    pub surveys: Vec<SurveyEntry>,
}

impl CsatDetailLog {
    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }
}

// ── Scoring ──────────────────────────────────────────────────────────────────

/// Latest rating per requester email. Tickets without an email are dropped.
pub fn dedup_latest_by_email<'a>(tickets: &[&'a TicketRecord]) -> Vec<&'a TicketRecord> {
    let mut latest: HashMap<String, &'a TicketRecord> = HashMap::new();
    for &t in tickets {
        let Some(email) = t.email_key() else {
            continue;
        };
        let replace = latest
            .get(&email)
            .map_or(true, |current| is_newer_rating(t, current));
        if replace {
            latest.insert(email, t);
        }
    }
    let mut out: Vec<&TicketRecord> = latest.into_values().collect();
    out.sort_by_key(|t| t.id);
    out
}

/// Later `rating_created_at` wins; ties go to the higher ticket id so the
/// result never depends on input order.
fn is_newer_rating(candidate: &TicketRecord, current: &TicketRecord) -> bool {
    (candidate.rating_created_at, candidate.id) > (current.rating_created_at, current.id)
}

pub fn calculate_csat(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    window: Option<TimeRange>,
) -> CsatResult {
    let rated: Vec<&TicketRecord> = tickets
        .iter()
        .filter(|t| t.merchant_id == merchant_id && t.rating().is_some())
        .filter(|t| match window {
            Some(range) => t.rating_created_at.is_some_and(|at| range.contains(at)),
            None => true,
        })
        .collect();

    let deduped = dedup_latest_by_email(&rated);
    let scores: Vec<i64> = deduped.iter().filter_map(|t| t.rating()).collect();

    let satisfied_count = scores.iter().filter(|&&s| is_satisfied(s)).count();
    let unsatisfied_count = scores.iter().filter(|&&s| is_unsatisfied(s)).count();

    log::debug!(
        "merchant={merchant_id} csat: {} rated, {} after dedup",
        rated.len(),
        scores.len()
    );

    CsatResult {
        percentage: round1(pct(satisfied_count, scores.len())),
        total_ratings: scores.len(),
        satisfied_count,
        unsatisfied_count,
    }
}

/// Every survey in the window, worst first.
///
/// `below_threshold` is a survey-level cut (`score < rating_threshold`) and is
/// deliberately separate from the strict 103-only CSAT rule.
pub fn csat_detail_log(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    window: TimeRange,
    rating_threshold: i64,
    filter: RatingFilter,
    include_conversations: bool,
) -> CsatDetailLog {
    let mut surveys: Vec<SurveyEntry> = tickets
        .iter()
        .filter(|t| t.merchant_id == merchant_id)
        .filter(|t| t.rating_created_at.is_some_and(|at| window.contains(at)))
        .filter_map(|t| t.rating().map(|score| (t, score)))
        .filter(|(_, score)| filter.matches(*score))
        .map(|(t, score)| {
            if rating_label(score) == "Unknown" {
                log::warn!("ticket {} carries off-scale rating {score}", t.id);
            }
            SurveyEntry {
                ticket_id: t.id,
                subject: t.subject_or_default(),
                requester_name: t.requester_name.clone(),
                requester_email: t.requester_email.clone(),
                rating_score: score,
                rating_label: rating_label(score).to_string(),
                feedback: t.rating_feedback.clone(),
                rated_at: t.rating_created_at,
                below_threshold: score < rating_threshold,
                conversation: if include_conversations {
                    t.conversation.clone()
                } else {
                    None
                },
            }
        })
        .collect();

    surveys.sort_by_key(|s| (s.rating_score, s.ticket_id));

    let mut by_label: BTreeMap<String, usize> = BTreeMap::new();
    for s in &surveys {
        *by_label.entry(s.rating_label.clone()).or_insert(0) += 1;
    }
    let average_score = if surveys.is_empty() {
        None
    } else {
        let sum: i64 = surveys.iter().map(|s| s.rating_score).sum();
        Some(round2(sum as f64 / surveys.len() as f64))
    };

    CsatDetailLog {
        summary: CsatDetailSummary {
            total_surveys: surveys.len(),
            below_threshold_count: surveys.iter().filter(|s| s.below_threshold).count(),
            rating_threshold,
            average_score,
            by_label,
        },
        surveys,
    }
}
