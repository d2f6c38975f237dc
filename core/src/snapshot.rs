//! Daily snapshot: one day's headline numbers.

use crate::{
    config::AnalyticsConfig,
    csat::calculate_csat,
    response::is_quick_close,
    sla::{first_response_breach, resolution_breach},
    source::TimeRange,
    stats::{format_duration_minutes, median, round1},
    ticket::TicketRecord,
    types::{is_unsatisfied, MerchantId},
    window::DateWindow,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub new_tickets: usize,
    pub closed_tickets: usize,
    pub quick_close_count: usize,
    pub median_first_response_min: Option<f64>,
    pub median_first_response_display: String,
    pub median_resolution_min: Option<f64>,
    pub median_resolution_display: String,
    /// Ratings received that day, before per-customer dedup.
    pub new_csat_count: usize,
    pub csat_percentage: f64,
    pub bad_csat_count: usize,
    pub sla_breach_count: usize,
}

impl DailySnapshot {
    pub fn is_empty(&self) -> bool {
        self.new_tickets == 0 && self.closed_tickets == 0 && self.new_csat_count == 0
    }
}

/// Tickets the snapshot needs, already split by how they touch the day.
#[derive(Debug, Default)]
pub struct SnapshotInputs {
    pub created: Vec<TicketRecord>,
    pub resolved: Vec<TicketRecord>,
    pub rated: Vec<TicketRecord>,
}

pub fn daily_snapshot(
    inputs: &SnapshotInputs,
    merchant_id: MerchantId,
    date: NaiveDate,
    config: &AnalyticsConfig,
    now: DateTime<Utc>,
) -> DailySnapshot {
    let day = DateWindow::single(date);
    let (from, to) = day.bounds();
    let in_scope = |t: &&TicketRecord| t.merchant_id == merchant_id;

    let created: Vec<&TicketRecord> = inputs
        .created
        .iter()
        .filter(in_scope)
        .filter(|t| day.contains(t.created_at))
        .collect();
    let resolved: Vec<&TicketRecord> = inputs
        .resolved
        .iter()
        .filter(in_scope)
        .filter(|t| t.done_at().is_some_and(|at| day.contains(at)))
        .collect();
    let rated: Vec<&TicketRecord> = inputs
        .rated
        .iter()
        .filter(in_scope)
        .filter(|t| t.rating().is_some())
        .filter(|t| t.rating_created_at.is_some_and(|at| day.contains(at)))
        .collect();

    let fr: Vec<f64> = created
        .iter()
        .filter_map(|t| t.first_response_minutes())
        .collect();
    let res: Vec<f64> = resolved
        .iter()
        .filter_map(|t| t.resolution_minutes())
        .collect();
    let median_first_response_min = median(&fr).map(round1);
    let median_resolution_min = median(&res).map(round1);

    let csat = calculate_csat(&inputs.rated, merchant_id, Some(TimeRange::new(from, to)));
    let bad_csat_count = rated
        .iter()
        .filter_map(|t| t.rating())
        .filter(|s| is_unsatisfied(*s))
        .count();

    // Same double-counting rule as the SLA report.
    let sla_breach_count: usize = created
        .iter()
        .map(|t| {
            usize::from(first_response_breach(t, &config.sla, now).is_some())
                + usize::from(resolution_breach(t, &config.sla, now).is_some())
        })
        .sum();

    DailySnapshot {
        date,
        new_tickets: created.len(),
        closed_tickets: resolved.len(),
        quick_close_count: resolved
            .iter()
            .filter(|t| is_quick_close(t, config.quick_close_minutes))
            .count(),
        median_first_response_min,
        median_first_response_display: format_duration_minutes(median_first_response_min),
        median_resolution_min,
        median_resolution_display: format_duration_minutes(median_resolution_min),
        new_csat_count: rated.len(),
        csat_percentage: csat.percentage,
        bad_csat_count,
        sla_breach_count,
    }
}
