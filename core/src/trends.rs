//! Daily volume trend: zero-filled series, spike days, rolling average.

use crate::{
    stats::{mean, mean_std, round1, round2},
    ticket::TicketRecord,
    types::MerchantId,
    window::DateWindow,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ROLLING_DAYS: usize = 7;
/// Relative change between the first and last week that counts as a trend.
const TREND_BAND_PCT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub count: usize,
    pub rolling_avg_7d: f64,
    pub is_spike: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeDay {
    pub date: NaiveDate,
    pub count: usize,
    /// Standard deviations above the mean.
    pub deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeTrends {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_tickets: usize,
    pub daily: Vec<DailyVolume>,
    pub mean: f64,
    pub std_dev: f64,
    pub spike_threshold: f64,
    pub spike_days: Vec<SpikeDay>,
    pub trend: TrendDirection,
    /// Last-week vs first-week change; None without two full weeks.
    pub trend_change_pct: Option<f64>,
}

impl VolumeTrends {
    pub fn is_empty(&self) -> bool {
        self.total_tickets == 0
    }
}

/// Tickets per day over `window`, missing days filled with 0.
pub fn daily_counts(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    window: &DateWindow,
) -> Vec<(NaiveDate, usize)> {
    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for t in tickets.iter().filter(|t| t.merchant_id == merchant_id) {
        *per_day.entry(t.created_on()).or_insert(0) += 1;
    }
    window
        .days()
        .map(|day| (day, per_day.get(&day).copied().unwrap_or(0)))
        .collect()
}

pub fn trend_direction(counts: &[f64]) -> (TrendDirection, Option<f64>) {
    if counts.len() < ROLLING_DAYS * 2 {
        return (TrendDirection::InsufficientData, None);
    }
    let first = mean(&counts[..ROLLING_DAYS]).unwrap_or(0.0);
    let last = mean(&counts[counts.len() - ROLLING_DAYS..]).unwrap_or(0.0);
    if first == 0.0 {
        let direction = if last > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Stable
        };
        return (direction, None);
    }
    let change = (last - first) / first * 100.0;
    let direction = if change > TREND_BAND_PCT {
        TrendDirection::Increasing
    } else if change < -TREND_BAND_PCT {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    (direction, Some(round1(change)))
}

pub fn volume_trends(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    window: &DateWindow,
    spike_multiplier: f64,
) -> VolumeTrends {
    let series = daily_counts(tickets, merchant_id, window);
    let values: Vec<f64> = series.iter().map(|(_, c)| *c as f64).collect();
    let (mean, std_dev) = mean_std(&values);
    let spike_threshold = mean + spike_multiplier * std_dev;

    let mut daily = Vec::with_capacity(series.len());
    let mut spike_days = Vec::new();
    for (i, (date, count)) in series.iter().enumerate() {
        let from = (i + 1).saturating_sub(ROLLING_DAYS);
        let rolling = values[from..=i].iter().sum::<f64>() / (i + 1 - from) as f64;
        let is_spike = std_dev > 0.0 && (*count as f64) > spike_threshold;
        if is_spike {
            spike_days.push(SpikeDay {
                date: *date,
                count: *count,
                deviation: round2((*count as f64 - mean) / std_dev),
            });
        }
        daily.push(DailyVolume {
            date: *date,
            count: *count,
            rolling_avg_7d: round2(rolling),
            is_spike,
        });
    }

    let (trend, trend_change_pct) = trend_direction(&values);
    let total_tickets: usize = series.iter().map(|(_, c)| c).sum();

    log::debug!(
        "merchant={merchant_id} trends: {} days, {total_tickets} tickets, {} spikes",
        series.len(),
        spike_days.len()
    );

    VolumeTrends {
        start: window.start,
        end: window.end,
        total_tickets,
        daily,
        mean: round2(mean),
        std_dev: round2(std_dev),
        spike_threshold: round2(spike_threshold),
        spike_days,
        trend,
        trend_change_pct,
    }
}
