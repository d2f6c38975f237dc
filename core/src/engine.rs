//! The analytics engine: entry points for agent tools and dashboards.
//!
//! Every entry point follows the same shape:
//!   1. Validate parameters (InvalidParameter surfaces before any I/O).
//!   2. Fetch the merchant's tickets once through the `TicketSource`.
//!   3. Run a pure report function over the in-memory records.
//!
//! RULES:
//!   - The merchant id is a required argument everywhere. There is no default tenant.
//!   - No result is cached between calls, so merchants never share state.
//!   - Store failures propagate as `AnalyticsError::Upstream`. No retries.

use crate::{
    clock::{Clock, SystemClock},
    config::{AnalyticsConfig, SlaConfig},
    csat::{calculate_csat, csat_detail_log, CsatDetailLog, CsatResult},
    distribution::{open_ticket_distribution, OpenTicketDistribution},
    error::{AnalyticsError, AnalyticsResult},
    response::{response_time_metrics, ResponseTimeMetrics},
    review::{recent_tickets_for_review, ReviewPage, ReviewRequest},
    root_cause::{history_window, root_cause_analysis, RootCauseAnalysis, RootCauseParams},
    sla::{sla_exceptions, SlaExceptions},
    snapshot::{daily_snapshot, DailySnapshot, SnapshotInputs},
    source::{TicketQuery, TicketSource, TimeRange},
    trends::{volume_trends, VolumeTrends},
    types::{MerchantId, RatingFilter, TicketStatus},
    window::{DateWindow, WindowParams},
};
use chrono::NaiveDate;

/// Longest trailing window a volume trend may cover.
pub const MAX_TREND_DAYS: u32 = 365;

pub struct AnalyticsEngine<S: TicketSource> {
    source: S,
    config: AnalyticsConfig,
    clock: Box<dyn Clock>,
}

impl<S: TicketSource> AnalyticsEngine<S> {
    pub fn new(source: S, config: AnalyticsConfig) -> Self {
        Self {
            source,
            config,
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the wall clock, e.g. with a `FixedClock` in tests.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn get_daily_snapshot(
        &self,
        merchant_id: MerchantId,
        date: NaiveDate,
    ) -> AnalyticsResult<DailySnapshot> {
        let (from, to) = DateWindow::single(date).bounds();
        let inputs = SnapshotInputs {
            created: self
                .source
                .fetch(&TicketQuery::for_merchant(merchant_id).created_between(from, to))?,
            resolved: self
                .source
                .fetch(&TicketQuery::for_merchant(merchant_id).resolved_between(from, to))?,
            rated: self
                .source
                .fetch(&TicketQuery::for_merchant(merchant_id).rated_between(from, to))?,
        };
        let snapshot = daily_snapshot(&inputs, merchant_id, date, &self.config, self.clock.now());
        log::info!(
            "merchant={merchant_id} snapshot {date}: {} new, {} closed, csat {:.1}%",
            snapshot.new_tickets,
            snapshot.closed_tickets,
            snapshot.csat_percentage
        );
        Ok(snapshot)
    }

    // ── CSAT ───────────────────────────────────────────────────

    pub fn calculate_csat(
        &self,
        merchant_id: MerchantId,
        window: WindowParams<'_>,
    ) -> AnalyticsResult<CsatResult> {
        let window = window.resolve(self.config.csat_default_days, self.clock.today())?;
        let (from, to) = window.bounds();
        let tickets = self
            .source
            .fetch(&TicketQuery::for_merchant(merchant_id).rated_between(from, to))?;
        Ok(calculate_csat(&tickets, merchant_id, Some(TimeRange::new(from, to))))
    }

    pub fn get_csat_detail_log(
        &self,
        merchant_id: MerchantId,
        date: NaiveDate,
        rating_threshold: i64,
        include_conversations: bool,
        rating_type: Option<&str>,
    ) -> AnalyticsResult<CsatDetailLog> {
        let filter = rating_type
            .map(RatingFilter::parse)
            .transpose()?
            .unwrap_or(RatingFilter::All);
        let (from, to) = DateWindow::single(date).bounds();
        let tickets = self
            .source
            .fetch(&TicketQuery::for_merchant(merchant_id).rated_between(from, to))?;
        Ok(csat_detail_log(
            &tickets,
            merchant_id,
            TimeRange::new(from, to),
            rating_threshold,
            filter,
            include_conversations,
        ))
    }

    // ── Distribution / trends ──────────────────────────────────

    pub fn get_open_ticket_distribution(
        &self,
        merchant_id: MerchantId,
    ) -> AnalyticsResult<OpenTicketDistribution> {
        let tickets = self.source.fetch(
            &TicketQuery::for_merchant(merchant_id).with_statuses(&TicketStatus::UNRESOLVED),
        )?;
        Ok(open_ticket_distribution(
            &tickets,
            merchant_id,
            self.clock.now(),
            self.config.oldest_open_limit,
        ))
    }

    pub fn get_response_time_metrics(
        &self,
        merchant_id: MerchantId,
        window: WindowParams<'_>,
    ) -> AnalyticsResult<ResponseTimeMetrics> {
        let window = window.resolve(self.config.csat_default_days, self.clock.today())?;
        let (from, to) = window.bounds();
        let tickets = self
            .source
            .fetch(&TicketQuery::for_merchant(merchant_id).created_between(from, to))?;
        Ok(response_time_metrics(
            &tickets,
            merchant_id,
            self.config.quick_close_minutes,
            self.config.outlier_std_multiplier,
            self.config.outlier_limit,
        ))
    }

    pub fn get_volume_trends(
        &self,
        merchant_id: MerchantId,
        days: u32,
    ) -> AnalyticsResult<VolumeTrends> {
        if days == 0 || days > MAX_TREND_DAYS {
            return Err(AnalyticsError::invalid(format!(
                "days must be between 1 and {MAX_TREND_DAYS}, got {days}"
            )));
        }
        let window = DateWindow::trailing(days, self.clock.today());
        let (from, to) = window.bounds();
        let tickets = self
            .source
            .fetch(&TicketQuery::for_merchant(merchant_id).created_between(from, to))?;
        Ok(volume_trends(
            &tickets,
            merchant_id,
            &window,
            self.config.volume_spike_std_multiplier,
        ))
    }

    // ── SLA ────────────────────────────────────────────────────

    /// `sla` overrides the configured thresholds for this call only.
    pub fn get_sla_exceptions(
        &self,
        merchant_id: MerchantId,
        sla: Option<SlaConfig>,
    ) -> AnalyticsResult<SlaExceptions> {
        let sla = sla.unwrap_or(self.config.sla);
        sla.validate()?;
        let window = DateWindow::trailing(self.config.sla_lookback_days, self.clock.today());
        let (from, to) = window.bounds();
        let tickets = self
            .source
            .fetch(&TicketQuery::for_merchant(merchant_id).created_between(from, to))?;
        Ok(sla_exceptions(
            &tickets,
            merchant_id,
            &sla,
            self.clock.now(),
            self.config.sla_top_tags,
        ))
    }

    // ── Root cause ─────────────────────────────────────────────

    pub fn get_root_cause_analysis(
        &self,
        merchant_id: MerchantId,
        target_date: NaiveDate,
        spike_threshold: Option<f64>,
    ) -> AnalyticsResult<RootCauseAnalysis> {
        let spike_threshold = spike_threshold.unwrap_or(2.0);
        if !spike_threshold.is_finite() || spike_threshold <= 0.0 {
            return Err(AnalyticsError::invalid(format!(
                "spike_threshold must be a positive number, got {spike_threshold}"
            )));
        }
        let history = history_window(target_date, self.config.root_cause_history_days);
        let (from, _) = history.bounds();
        let to = DateWindow::single(target_date).bounds().1;
        let tickets = self
            .source
            .fetch(&TicketQuery::for_merchant(merchant_id).created_between(from, to))?;
        Ok(root_cause_analysis(
            &tickets,
            merchant_id,
            target_date,
            RootCauseParams {
                spike_threshold,
                history_days: self.config.root_cause_history_days,
                top_n: self.config.root_cause_top_n,
                examples_per_tag: self.config.root_cause_examples_per_tag,
            },
        ))
    }

    // ── Review ─────────────────────────────────────────────────

    pub fn get_recent_tickets_for_review(
        &self,
        merchant_id: MerchantId,
        request: &ReviewRequest<'_>,
    ) -> AnalyticsResult<ReviewPage> {
        recent_tickets_for_review(&self.source, merchant_id, request, self.config.review_max_limit)
    }
}
