//! Root-cause engine: explains a day's volume against a trailing baseline.
//!
//! The target day's tag and type mix is compared with the daily average over
//! the `history_days` days strictly before it. Insights are keyword and
//! calendar heuristics: hints for a human, not causal claims.

use crate::{
    stats::{mean_std, round1, round2},
    ticket::TicketRecord,
    types::{MerchantId, TicketId},
    window::{DateWindow, MAX_WINDOW_DAYS},
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Reported in place of a percentage when the historical average is zero.
pub const NEW_CATEGORY_PCT: f64 = 999.9;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleTicket {
    pub ticket_id: TicketId,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDelta {
    /// Tag name or ticket type.
    pub name: String,
    pub target_count: usize,
    pub historical_daily_avg: f64,
    pub delta: f64,
    pub pct_increase: f64,
    pub is_new: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ExampleTicket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseAnalysis {
    pub target_date: NaiveDate,
    pub target_count: usize,
    pub history_days: usize,
    pub historical_mean: f64,
    pub historical_std_dev: f64,
    pub spike_threshold: f64,
    pub spike_level: f64,
    pub spike_detected: bool,
    pub tag_deltas: Vec<CategoryDelta>,
    pub type_deltas: Vec<CategoryDelta>,
    pub untagged_count: usize,
    pub insights: Vec<String>,
}

impl RootCauseAnalysis {
    pub fn is_empty(&self) -> bool {
        self.target_count == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RootCauseParams {
    pub spike_threshold: f64,
    pub history_days: u32,
    pub top_n: usize,
    pub examples_per_tag: usize,
}

// ── Analysis ─────────────────────────────────────────────────────────────────

/// The `history_days` days before `target_date`. The span is clamped to
/// `1..=MAX_WINDOW_DAYS` and to the earliest representable date.
pub fn history_window(target_date: NaiveDate, history_days: u32) -> DateWindow {
    let back = |days: i64| {
        target_date
            .checked_sub_signed(Duration::days(days))
            .unwrap_or(NaiveDate::MIN)
    };
    DateWindow {
        start: back(i64::from(history_days.clamp(1, MAX_WINDOW_DAYS))),
        end: back(1),
    }
}

pub fn root_cause_analysis(
    tickets: &[TicketRecord],
    merchant_id: MerchantId,
    target_date: NaiveDate,
    params: RootCauseParams,
) -> RootCauseAnalysis {
    let history = history_window(target_date, params.history_days);
    let scoped: Vec<&TicketRecord> = tickets
        .iter()
        .filter(|t| t.merchant_id == merchant_id)
        .collect();

    let target: Vec<&TicketRecord> = scoped
        .iter()
        .copied()
        .filter(|t| t.created_on() == target_date)
        .collect();
    let past: Vec<&TicketRecord> = scoped
        .iter()
        .copied()
        .filter(|t| {
            let day = t.created_on();
            day >= history.start && day <= history.end
        })
        .collect();

    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for t in &past {
        *per_day.entry(t.created_on()).or_insert(0) += 1;
    }
    let series: Vec<f64> = history
        .days()
        .map(|d| per_day.get(&d).copied().unwrap_or(0) as f64)
        .collect();
    let history_days = series.len();
    let (hist_mean, hist_std) = mean_std(&series);
    let spike_level = hist_mean + params.spike_threshold * hist_std;
    let spike_detected = spike_level > 0.0 && target.len() as f64 > spike_level;

    let mut tag_deltas = category_deltas(
        &target,
        &past,
        history_days,
        |t| t.tags.clone(),
        params.examples_per_tag,
    );
    tag_deltas.truncate(params.top_n);

    let mut type_deltas = category_deltas(
        &target,
        &past,
        history_days,
        |t| vec![t.type_or_unspecified()],
        0,
    );
    type_deltas.truncate(params.top_n);

    let untagged_count = target.iter().filter(|t| t.tags.is_empty()).count();
    let insights = generate_insights(
        target_date,
        &tag_deltas,
        untagged_count,
        target.len(),
        spike_detected,
    );

    log::info!(
        "merchant={merchant_id} root-cause {target_date}: {} tickets vs mean {:.2} (spike={spike_detected})",
        target.len(),
        hist_mean,
    );

    RootCauseAnalysis {
        target_date,
        target_count: target.len(),
        history_days,
        historical_mean: round2(hist_mean),
        historical_std_dev: round2(hist_std),
        spike_threshold: params.spike_threshold,
        spike_level: round2(spike_level),
        spike_detected,
        tag_deltas,
        type_deltas,
        untagged_count,
        insights,
    }
}

fn category_deltas<F>(
    target: &[&TicketRecord],
    past: &[&TicketRecord],
    history_days: usize,
    keys: F,
    examples_per_key: usize,
) -> Vec<CategoryDelta>
where
    F: Fn(&TicketRecord) -> Vec<String>,
{
    // BTreeMap keeps example order and tie-breaks stable.
    let mut today: BTreeMap<String, Vec<&TicketRecord>> = BTreeMap::new();
    for &t in target {
        let mut seen = keys(t);
        seen.sort();
        seen.dedup();
        for key in seen {
            today.entry(key).or_default().push(t);
        }
    }

    let mut before: HashMap<String, usize> = HashMap::new();
    for &t in past {
        let mut seen = keys(t);
        seen.sort();
        seen.dedup();
        for key in seen {
            if today.contains_key(&key) {
                *before.entry(key).or_insert(0) += 1;
            }
        }
    }

    let mut deltas: Vec<CategoryDelta> = today
        .into_iter()
        .map(|(name, on_day)| {
            let hist_count = before.get(&name).copied().unwrap_or(0);
            let avg = if history_days == 0 {
                0.0
            } else {
                hist_count as f64 / history_days as f64
            };
            let target_count = on_day.len();
            let delta = target_count as f64 - avg;
            let (pct_increase, is_new) = if avg > 0.0 {
                (round1(delta / avg * 100.0), false)
            } else {
                (NEW_CATEGORY_PCT, true)
            };
            CategoryDelta {
                name,
                target_count,
                historical_daily_avg: round2(avg),
                delta: round2(delta),
                pct_increase,
                is_new,
                examples: on_day
                    .iter()
                    .take(examples_per_key)
                    .map(|t| ExampleTicket {
                        ticket_id: t.id,
                        subject: t.subject_or_default(),
                    })
                    .collect(),
            }
        })
        .collect();

    deltas.sort_by(|a, b| b.delta.total_cmp(&a.delta).then_with(|| a.name.cmp(&b.name)));
    deltas
}

// ── Insights ─────────────────────────────────────────────────────────────────

const SHIPPING_KEYWORDS: [&str; 6] = ["shipping", "delivery", "shipment", "tracking", "courier", "carrier"];
const BILLING_KEYWORDS: [&str; 6] = ["payment", "billing", "charge", "refund", "invoice", "card"];

fn mentions(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

fn generate_insights(
    target_date: NaiveDate,
    tag_deltas: &[CategoryDelta],
    untagged_count: usize,
    target_count: usize,
    spike_detected: bool,
) -> Vec<String> {
    let mut insights = Vec::new();
    let rising: Vec<&CategoryDelta> = tag_deltas.iter().filter(|d| d.delta > 0.0).collect();

    if let Some(top) = rising.first() {
        if top.is_new {
            insights.push(format!(
                "Tag '{}' is new: {} tickets with no history in the baseline",
                top.name, top.target_count
            ));
        } else {
            insights.push(format!(
                "Tag '{}' is up {:.1}% ({} tickets vs {:.2}/day)",
                top.name, top.pct_increase, top.target_count, top.historical_daily_avg
            ));
        }
    }

    let shipping: usize = rising
        .iter()
        .filter(|d| mentions(&d.name, &SHIPPING_KEYWORDS))
        .map(|d| d.target_count)
        .sum();
    if shipping > 0 {
        insights.push(format!(
            "Shipping/delivery tags are elevated ({shipping} tagged tickets): check carrier delays or tracking outages"
        ));
    }

    let billing: usize = rising
        .iter()
        .filter(|d| mentions(&d.name, &BILLING_KEYWORDS))
        .map(|d| d.target_count)
        .sum();
    if billing > 0 {
        insights.push(format!(
            "Payment/billing tags are elevated ({billing} tagged tickets): check the payment processor and recent charges"
        ));
    }

    if target_count > 0 && untagged_count * 2 > target_count {
        insights.push(format!(
            "{untagged_count} of {target_count} tickets are untagged; tag coverage limits this analysis"
        ));
    }

    match target_date.weekday() {
        Weekday::Mon if spike_detected => {
            insights.push("Monday spike: weekend backlog typically lands on Monday".to_string())
        }
        Weekday::Sat | Weekday::Sun => insights.push(
            "Weekend date: volume usually runs below weekday levels".to_string(),
        ),
        _ => {}
    }

    if let Some(holiday) = holiday_context(target_date) {
        insights.push(holiday);
    }

    insights
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}

/// US retail calendar markers relevant to support volume.
fn us_holidays(year: i32) -> Vec<(NaiveDate, &'static str)> {
    let mut out = Vec::new();
    let mut push = |d: Option<NaiveDate>, name: &'static str| {
        if let Some(d) = d {
            out.push((d, name));
        }
    };
    push(NaiveDate::from_ymd_opt(year, 1, 1), "New Year's Day");
    push(last_weekday(year, 5, Weekday::Mon), "Memorial Day");
    push(NaiveDate::from_ymd_opt(year, 7, 4), "Independence Day");
    push(nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day");
    let thanksgiving = nth_weekday(year, 11, Weekday::Thu, 4);
    push(thanksgiving, "Thanksgiving");
    push(thanksgiving.map(|d| d + Duration::days(1)), "Black Friday");
    push(thanksgiving.map(|d| d + Duration::days(4)), "Cyber Monday");
    push(NaiveDate::from_ymd_opt(year, 12, 25), "Christmas");
    out
}

/// A hint when the date is on, or within three days after, a US holiday.
pub fn holiday_context(date: NaiveDate) -> Option<String> {
    let mut candidates = us_holidays(date.year());
    candidates.extend(us_holidays(date.year() - 1));
    candidates
        .into_iter()
        .filter_map(|(day, name)| {
            let after = (date - day).num_days();
            (0..=3).contains(&after).then_some((after, name))
        })
        .min_by_key(|(after, _)| *after)
        .map(|(after, name)| match (after, name) {
            (0, "Black Friday") | (0, "Cyber Monday") => {
                format!("{name}: peak sales day, expect order and shipping questions")
            }
            (0, _) => format!("{name}: holiday staffing may slow responses"),
            (n, _) => format!("{n} day(s) after {name}: post-holiday backlog is common"),
        })
}
