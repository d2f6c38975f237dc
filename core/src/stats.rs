//! Statistics and display helpers shared by every engine.
//!
//! Standard deviation is the population form (divide by N). Percentiles use
//! nearest rank on the sorted series, index `floor(len * p / 100)`, clamped to
//! the last element.

use serde::{Deserialize, Serialize};

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let p = p.clamp(0.0, 100.0);
    let idx = ((sorted.len() as f64 * p / 100.0).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Mean and population std-dev, both 0.0 for an empty series.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    (mean(values).unwrap_or(0.0), std_dev(values).unwrap_or(0.0))
}

/// `part / whole * 100`, or 0.0 when `whole` is zero.
pub fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

// ── Display ──────────────────────────────────────────────────────────────────

pub fn format_duration_minutes(minutes: Option<f64>) -> String {
    let Some(minutes) = minutes else {
        return "No data".to_string();
    };
    let whole = minutes.round() as i64;
    if whole < 1 {
        "<1 min".to_string()
    } else if whole < 60 {
        format!("{whole} min")
    } else {
        format!("{}h {}m", whole / 60, whole % 60)
    }
}

/// Compact age for the oldest-open list: `45m`, `5h 12m`, `3d 4h`, `12d`.
pub fn format_age(hours: f64) -> String {
    let total_minutes = (hours * 60.0).floor().max(0.0) as i64;
    if hours < 1.0 {
        return format!("{total_minutes}m");
    }
    let whole_hours = total_minutes / 60;
    if hours < 24.0 {
        return format!("{}h {}m", whole_hours, total_minutes % 60);
    }
    let days = whole_hours / 24;
    let rem_hours = whole_hours % 24;
    if hours < 168.0 && rem_hours > 0 {
        format!("{days}d {rem_hours}h")
    } else {
        format!("{days}d")
    }
}

// ── Age buckets ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBucket {
    #[serde(rename = "0-4h")]
    UpTo4Hours,
    #[serde(rename = "4-24h")]
    UpTo24Hours,
    #[serde(rename = "1-2d")]
    UpTo2Days,
    #[serde(rename = "3-7d")]
    UpTo7Days,
    #[serde(rename = ">7d")]
    Over7Days,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 5] = [
        AgeBucket::UpTo4Hours,
        AgeBucket::UpTo24Hours,
        AgeBucket::UpTo2Days,
        AgeBucket::UpTo7Days,
        AgeBucket::Over7Days,
    ];

    /// Upper bounds are inclusive: exactly 4.0h is still `0-4h`.
    pub fn for_hours(hours: f64) -> Self {
        if hours <= 4.0 {
            AgeBucket::UpTo4Hours
        } else if hours <= 24.0 {
            AgeBucket::UpTo24Hours
        } else if hours <= 48.0 {
            AgeBucket::UpTo2Days
        } else if hours <= 168.0 {
            AgeBucket::UpTo7Days
        } else {
            AgeBucket::Over7Days
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::UpTo4Hours  => "0-4h",
            AgeBucket::UpTo24Hours => "4-24h",
            AgeBucket::UpTo2Days   => "1-2d",
            AgeBucket::UpTo7Days   => "3-7d",
            AgeBucket::Over7Days   => ">7d",
        }
    }
}
