//! Response-time metrics: percentiles, outliers, quick-resolution buckets,
//! and CSAT by first-response speed.

use crate::{
    stats::{format_duration_minutes, mean_std, median, pct, percentile, round1, round2},
    ticket::TicketRecord,
    types::{is_satisfied, MerchantId, TicketId},
};
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub count: usize,
    pub mean_min: Option<f64>,
    pub median_min: Option<f64>,
    pub p25_min: Option<f64>,
    pub p50_min: Option<f64>,
    pub p75_min: Option<f64>,
    pub p95_min: Option<f64>,
    pub median_display: String,
    pub p95_display: String,
}

impl DurationStats {
    pub fn from_minutes(values: &[f64]) -> Self {
        let (mean, _) = mean_std(values);
        let median_min = median(values).map(round1);
        let p95_min = percentile(values, 95.0).map(round1);
        Self {
            count: values.len(),
            mean_min: (!values.is_empty()).then(|| round1(mean)),
            median_min,
            p25_min: percentile(values, 25.0).map(round1),
            p50_min: percentile(values, 50.0).map(round1),
            p75_min: percentile(values, 75.0).map(round1),
            p95_min,
            median_display: format_duration_minutes(median_min),
            p95_display: format_duration_minutes(p95_min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationOutlier {
    pub ticket_id: TicketId,
    pub subject: String,
    pub minutes: f64,
    pub display: String,
    pub deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionBucket {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTierCsat {
    pub tier: String,
    pub rated_count: usize,
    pub satisfied_count: usize,
    pub csat_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeMetrics {
    pub tickets_considered: usize,
    pub first_response: DurationStats,
    pub resolution: DurationStats,
    pub first_response_outliers: Vec<DurationOutlier>,
    pub resolution_outliers: Vec<DurationOutlier>,
    pub quick_close_count: usize,
    pub resolution_buckets: Vec<ResolutionBucket>,
    pub csat_by_response_speed: Vec<SpeedTierCsat>,
}

impl ResponseTimeMetrics {
    pub fn is_empty(&self) -> bool {
        self.tickets_considered == 0
    }
}

// ── Bucketing ────────────────────────────────────────────────────────────────

/// Resolution buckets. The first bound is the quick-close cut and is strict.
fn resolution_bucket(minutes: f64, quick_close_minutes: f64) -> usize {
    if minutes < quick_close_minutes {
        0
    } else if minutes < 30.0 {
        1
    } else if minutes < 60.0 {
        2
    } else if minutes < 240.0 {
        3
    } else if minutes < 1440.0 {
        4
    } else {
        5
    }
}

const RESOLUTION_BUCKETS: usize = 6;

/// Bucket labels; the first two follow the quick-close cut.
fn resolution_labels(quick_close_minutes: f64) -> [String; RESOLUTION_BUCKETS] {
    [
        format!("<{quick_close_minutes}m"),
        format!("{quick_close_minutes}-30m"),
        "30-60m".to_string(),
        "1-4h".to_string(),
        "4-24h".to_string(),
        ">24h".to_string(),
    ]
}

const SPEED_TIERS: [&str; 5] = ["<1h", "1-4h", "4-24h", ">24h", "no_response"];

fn speed_tier(first_response_min: Option<f64>) -> usize {
    match first_response_min {
        Some(m) if m < 60.0 => 0,
        Some(m) if m < 240.0 => 1,
        Some(m) if m < 1440.0 => 2,
        Some(_) => 3,
        None => 4,
    }
}

/// Strict: exactly at the threshold is not a quick close.
pub fn is_quick_close(t: &TicketRecord, quick_close_minutes: f64) -> bool {
    t.resolution_minutes()
        .is_some_and(|m| m < quick_close_minutes)
}

fn outliers(
    samples: &[(&TicketRecord, f64)],
    multiplier: f64,
    limit: usize,
) -> Vec<DurationOutlier> {
    let values: Vec<f64> = samples.iter().map(|(_, m)| *m).collect();
    let (mean, std_dev) = mean_std(&values);
    if std_dev == 0.0 {
        return Vec::new();
    }
    let cut = mean + multiplier * std_dev;
    let mut out: Vec<DurationOutlier> = samples
        .iter()
        .filter(|(_, m)| *m > cut)
        .map(|(t, m)| DurationOutlier {
            ticket_id: t.id,
            subject: t.subject_or_default(),
            minutes: round1(*m),
            display: format_duration_minutes(Some(*m)),
            deviation: round2((m - mean) / std_dev),
        })
        .collect();
    out.sort_by(|a, b| b.minutes.total_cmp(&a.minutes).then(a.ticket_id.cmp(&b.ticket_id)));
    out.truncate(limit);
    out
}

pub fn response_time_metrics(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    quick_close_minutes: f64,
    outlier_multiplier: f64,
    outlier_limit: usize,
) -> ResponseTimeMetrics {
    let scoped: Vec<&TicketRecord> = tickets
        .iter()
        .filter(|t| t.merchant_id == merchant_id)
        .collect();

    let first_response: Vec<(&TicketRecord, f64)> = scoped
        .iter()
        .filter_map(|t| t.first_response_minutes().map(|m| (*t, m)))
        .collect();
    let resolution: Vec<(&TicketRecord, f64)> = scoped
        .iter()
        .filter(|t| t.status.is_done())
        .filter_map(|t| t.resolution_minutes().map(|m| (*t, m)))
        .collect();

    let fr_values: Vec<f64> = first_response.iter().map(|(_, m)| *m).collect();
    let res_values: Vec<f64> = resolution.iter().map(|(_, m)| *m).collect();

    let mut bucket_counts = [0usize; RESOLUTION_BUCKETS];
    for m in &res_values {
        bucket_counts[resolution_bucket(*m, quick_close_minutes)] += 1;
    }
    let resolution_buckets = resolution_labels(quick_close_minutes)
        .into_iter()
        .zip(bucket_counts)
        .map(|(label, count)| ResolutionBucket {
            label,
            count,
            percentage: round1(pct(count, res_values.len())),
        })
        .collect();

    let mut rated = [0usize; SPEED_TIERS.len()];
    let mut satisfied = [0usize; SPEED_TIERS.len()];
    for t in &scoped {
        let Some(score) = t.rating() else {
            continue;
        };
        let tier = speed_tier(t.first_response_minutes());
        rated[tier] += 1;
        if is_satisfied(score) {
            satisfied[tier] += 1;
        }
    }
    let csat_by_response_speed = SPEED_TIERS
        .iter()
        .enumerate()
        .map(|(i, tier)| SpeedTierCsat {
            tier: tier.to_string(),
            rated_count: rated[i],
            satisfied_count: satisfied[i],
            csat_percentage: round1(pct(satisfied[i], rated[i])),
        })
        .collect();

    ResponseTimeMetrics {
        tickets_considered: scoped.len(),
        first_response: DurationStats::from_minutes(&fr_values),
        resolution: DurationStats::from_minutes(&res_values),
        first_response_outliers: outliers(&first_response, outlier_multiplier, outlier_limit),
        resolution_outliers: outliers(&resolution, outlier_multiplier, outlier_limit),
        quick_close_count: bucket_counts[0],
        resolution_buckets,
        csat_by_response_speed,
    }
}
