use crate::error::{AnalyticsError, AnalyticsResult};
use crate::window::MAX_WINDOW_DAYS;
use serde::{Deserialize, Serialize};

// ── SLA thresholds ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    pub first_response_min: i64,
    pub resolution_min: i64,
    /// Also judge still-open tickets against the resolution threshold.
    pub include_pending: bool,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            first_response_min: 60,
            resolution_min: 1440,
            include_pending: true,
        }
    }
}

impl SlaConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.first_response_min <= 0 {
            return Err(AnalyticsError::invalid(format!(
                "first_response_min must be positive, got {}",
                self.first_response_min
            )));
        }
        if self.resolution_min <= 0 {
            return Err(AnalyticsError::invalid(format!(
                "resolution_min must be positive, got {}",
                self.resolution_min
            )));
        }
        Ok(())
    }
}

// ── Engine configuration ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub sla: SlaConfig,
    /// Creation window (days) loaded for SLA exception reports.
    pub sla_lookback_days: u32,
    pub sla_top_tags: usize,
    /// Strict upper bound: a ticket resolved in exactly this many minutes is not quick.
    pub quick_close_minutes: f64,
    pub outlier_std_multiplier: f64,
    pub outlier_limit: usize,
    pub volume_spike_std_multiplier: f64,
    pub root_cause_history_days: u32,
    pub root_cause_top_n: usize,
    pub root_cause_examples_per_tag: usize,
    pub oldest_open_limit: usize,
    pub csat_default_days: u32,
    pub review_max_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sla: SlaConfig::default(),
            sla_lookback_days: 7,
            sla_top_tags: 5,
            quick_close_minutes: 10.0,
            outlier_std_multiplier: 2.0,
            outlier_limit: 10,
            volume_spike_std_multiplier: 2.0,
            root_cause_history_days: 30,
            root_cause_top_n: 10,
            root_cause_examples_per_tag: 3,
            oldest_open_limit: 10,
            csat_default_days: 30,
            review_max_limit: 100,
        }
    }
}

impl AnalyticsConfig {
    /// Load from a JSON file. Missing keys fall back to the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AnalyticsConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        self.sla.validate()?;
        // Resolution buckets place the quick-close cut below the 30-minute band.
        if !(self.quick_close_minutes > 0.0 && self.quick_close_minutes < 30.0) {
            return Err(AnalyticsError::invalid(format!(
                "quick_close_minutes must be in (0, 30), got {}",
                self.quick_close_minutes
            )));
        }
        if self.outlier_std_multiplier <= 0.0 || self.volume_spike_std_multiplier <= 0.0 {
            return Err(AnalyticsError::invalid("std-dev multipliers must be positive"));
        }
        for (name, days) in [
            ("root_cause_history_days", self.root_cause_history_days),
            ("sla_lookback_days", self.sla_lookback_days),
            ("csat_default_days", self.csat_default_days),
        ] {
            if days == 0 || days > MAX_WINDOW_DAYS {
                return Err(AnalyticsError::invalid(format!(
                    "{name} must be between 1 and {MAX_WINDOW_DAYS}, got {days}"
                )));
            }
        }
        if self.review_max_limit == 0 {
            return Err(AnalyticsError::invalid("review_max_limit must be at least 1"));
        }
        Ok(())
    }
}
