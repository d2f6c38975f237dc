//! CSAT engine tests: dedup, scoring boundaries, detail log, tenancy.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use cj_analytics::{
    clock::FixedClock,
    config::AnalyticsConfig,
    csat::{calculate_csat, csat_detail_log},
    source::TimeRange,
    types::RatingFilter,
    window::{day_start, WindowParams, MAX_WINDOW_DAYS},
    AnalyticsEngine, AnalyticsError, MemoryTicketSource, TicketRecord,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const MERCHANT: i64 = 1;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

fn rated(id: i64, email: &str, score: i64, rated_at: DateTime<Utc>) -> TicketRecord {
    let mut t = TicketRecord::new(id, MERCHANT, rated_at - Duration::hours(2));
    t.requester_email = Some(email.to_string());
    t.has_rating = true;
    t.rating_score = Some(score);
    t.rating_created_at = Some(rated_at);
    t
}

fn january() -> TimeRange {
    TimeRange::new(at(1, 0), day_start(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()))
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// N ratings from one email count once: the most recent wins.
#[test]
fn repeat_raters_count_once_with_latest_score() {
    let tickets = vec![
        rated(1, "ann@example.com", -103, at(3, 9)),
        rated(2, "ann@example.com", 100, at(5, 9)),
        rated(3, "ANN@example.com ", 103, at(9, 9)),
        rated(4, "bob@example.com", 102, at(4, 9)),
    ];
    let csat = calculate_csat(&tickets, MERCHANT, Some(january()));
    assert_eq!(csat.total_ratings, 2, "Expected 2 deduped ratings, got {}", csat.total_ratings);
    assert_eq!(csat.satisfied_count, 1);
    assert_eq!(csat.unsatisfied_count, 0, "Ann's older -103 must be superseded");
    assert_eq!(csat.percentage, 50.0);
}

/// Dedup does not depend on input order.
#[test]
fn dedup_is_order_independent() {
    let mut tickets = vec![
        rated(10, "c@example.com", -101, at(2, 9)),
        rated(11, "c@example.com", 103, at(8, 9)),
    ];
    let forward = calculate_csat(&tickets, MERCHANT, None);
    tickets.reverse();
    let backward = calculate_csat(&tickets, MERCHANT, None);
    assert_eq!(forward, backward);
    assert_eq!(forward.satisfied_count, 1);
}

/// 103 is satisfied; 101 lands in neither bucket but still counts as a rating.
#[test]
fn happy_101_is_neither_satisfied_nor_unsatisfied() {
    let tickets = vec![
        rated(1, "a@example.com", 103, at(2, 9)),
        rated(2, "b@example.com", 101, at(2, 10)),
    ];
    let csat = calculate_csat(&tickets, MERCHANT, None);
    assert_eq!(csat.total_ratings, 2);
    assert_eq!(csat.satisfied_count, 1);
    assert_eq!(csat.unsatisfied_count, 0, "101 must not be unsatisfied");
    assert_eq!(csat.percentage, 50.0);
}

/// Tickets with has_rating=false or no email are skipped, not zero-scored.
#[test]
fn unusable_ratings_are_skipped() {
    let mut no_flag = rated(1, "a@example.com", 103, at(2, 9));
    no_flag.has_rating = false;
    let mut no_email = rated(2, "b@example.com", -103, at(2, 9));
    no_email.requester_email = None;
    let csat = calculate_csat(&[no_flag, no_email], MERCHANT, None);
    assert!(csat.is_empty(), "Expected no ratings, got {}", csat.total_ratings);
    assert_eq!(csat.percentage, 0.0);
}

/// Ratings outside the window are excluded.
#[test]
fn window_filters_on_rating_time() {
    let tickets = vec![
        rated(1, "a@example.com", 103, at(2, 9)),
        rated(2, "b@example.com", -103, at(20, 9)),
    ];
    let range = TimeRange::new(at(1, 0), at(10, 0));
    let csat = calculate_csat(&tickets, MERCHANT, Some(range));
    assert_eq!(csat.total_ratings, 1);
    assert_eq!(csat.percentage, 100.0);
}

/// Another merchant's ratings never leak in.
#[test]
fn other_merchants_are_ignored() {
    let mut foreign = rated(2, "b@example.com", -103, at(2, 9));
    foreign.merchant_id = 2;
    let tickets = vec![rated(1, "a@example.com", 103, at(2, 9)), foreign];
    let csat = calculate_csat(&tickets, MERCHANT, None);
    assert_eq!(csat.total_ratings, 1);
    assert_eq!(csat.unsatisfied_count, 0);
}

/// The detail log lists worst first and counts below-threshold surveys.
#[test]
fn detail_log_sorts_worst_first() {
    let mut conv = rated(3, "c@example.com", -102, at(5, 12));
    conv.conversation = Some("**Customer:** where is my order".to_string());
    let tickets = vec![
        rated(1, "a@example.com", 103, at(5, 9)),
        rated(2, "b@example.com", 101, at(5, 10)),
        conv,
    ];
    let range = TimeRange::new(at(5, 0), at(6, 0));
    let log = csat_detail_log(&tickets, MERCHANT, range, 102, RatingFilter::All, false);

    let scores: Vec<i64> = log.surveys.iter().map(|s| s.rating_score).collect();
    assert_eq!(scores, vec![-102, 101, 103]);
    assert_eq!(log.summary.below_threshold_count, 2);
    assert_eq!(log.summary.by_label.get("Very Unhappy"), Some(&1));
    assert!(
        log.surveys.iter().all(|s| s.conversation.is_none()),
        "Conversations must be omitted unless requested"
    );

    let with_conv = csat_detail_log(&tickets, MERCHANT, range, 102, RatingFilter::Negative, true);
    assert_eq!(with_conv.surveys.len(), 1);
    assert!(with_conv.surveys[0].conversation.is_some());
}

/// The survey threshold is independent of the strict 103-only CSAT rule.
#[test]
fn threshold_metric_differs_from_csat() {
    let tickets = vec![rated(1, "a@example.com", 102, at(5, 9))];
    let range = TimeRange::new(at(5, 0), at(6, 0));
    let log = csat_detail_log(&tickets, MERCHANT, range, 102, RatingFilter::All, false);
    assert_eq!(log.summary.below_threshold_count, 0, "102 is not below a 102 threshold");
    let csat = calculate_csat(&tickets, MERCHANT, Some(range));
    assert_eq!(csat.satisfied_count, 0, "102 is still not satisfied for CSAT");
}

/// Engine: explicit range and trailing days resolve the same window.
#[test]
fn engine_csat_accepts_range_or_days() {
    let source = MemoryTicketSource::new(vec![
        rated(1, "a@example.com", 103, at(8, 9)),
        rated(2, "b@example.com", -101, at(9, 9)),
    ]);
    let engine = AnalyticsEngine::new(source, AnalyticsConfig::default())
        .with_clock(FixedClock::new(at(10, 12)));

    let by_days = engine.calculate_csat(MERCHANT, WindowParams::days(7)).unwrap();
    let by_range = engine
        .calculate_csat(MERCHANT, WindowParams::range("2024-01-04", "2024-01-10"))
        .unwrap();
    assert_eq!(by_days, by_range);
    assert_eq!(by_days.total_ratings, 2);
    assert_eq!(by_days.percentage, 50.0);
}

/// Engine: conflicting or malformed parameters are rejected before any fetch.
#[test]
fn engine_csat_rejects_bad_parameters() {
    let engine = AnalyticsEngine::new(MemoryTicketSource::default(), AnalyticsConfig::default())
        .with_clock(FixedClock::new(at(10, 12)));

    let mixed = WindowParams {
        days: Some(7),
        start_date: Some("2024-01-01"),
        end_date: Some("2024-01-05"),
    };
    assert!(matches!(
        engine.calculate_csat(MERCHANT, mixed),
        Err(AnalyticsError::InvalidParameter { .. })
    ));
    assert!(matches!(
        engine.calculate_csat(MERCHANT, WindowParams::range("2024-01-09", "2024-01-01")),
        Err(AnalyticsError::InvalidParameter { .. })
    ));
    assert!(matches!(
        engine.get_csat_detail_log(MERCHANT, day(5), 102, false, Some("lukewarm")),
        Err(AnalyticsError::InvalidParameter { .. })
    ));
}

/// Engine: an empty day is a valid empty log, not an error.
#[test]
fn engine_detail_log_empty_day() {
    let engine = AnalyticsEngine::new(MemoryTicketSource::default(), AnalyticsConfig::default())
        .with_clock(FixedClock::new(at(10, 12)));
    let log = engine
        .get_csat_detail_log(MERCHANT, day(5), 102, false, None)
        .unwrap();
    assert!(log.is_empty());
    assert_eq!(log.summary.average_score, None);
}

/// Engine: windows beyond the supported span are InvalidParameter on every windowed report.
#[test]
fn engine_rejects_oversized_windows() {
    let engine = AnalyticsEngine::new(MemoryTicketSource::default(), AnalyticsConfig::default())
        .with_clock(FixedClock::new(at(10, 12)));
    for days in [MAX_WINDOW_DAYS + 1, 1_000_000_000, u32::MAX] {
        assert!(
            matches!(
                engine.calculate_csat(MERCHANT, WindowParams::days(days)),
                Err(AnalyticsError::InvalidParameter { .. })
            ),
            "calculate_csat, days = {days}"
        );
        assert!(
            matches!(
                engine.get_response_time_metrics(MERCHANT, WindowParams::days(days)),
                Err(AnalyticsError::InvalidParameter { .. })
            ),
            "get_response_time_metrics, days = {days}"
        );
    }
    assert!(matches!(
        engine.calculate_csat(MERCHANT, WindowParams::range("1000-01-01", "2024-01-10")),
        Err(AnalyticsError::InvalidParameter { .. })
    ));
    let full = engine.calculate_csat(MERCHANT, WindowParams::days(MAX_WINDOW_DAYS)).unwrap();
    assert_eq!(full.total_ratings, 0);
}

/// Config: lookback windows are bounded on both sides.
#[test]
fn config_bounds_lookback_windows() {
    assert!(AnalyticsConfig::default().validate().is_ok());
    let too_long = AnalyticsConfig {
        root_cause_history_days: 1_000_000_000,
        ..AnalyticsConfig::default()
    };
    assert!(matches!(too_long.validate(), Err(AnalyticsError::InvalidParameter { .. })));
    let empty = AnalyticsConfig {
        sla_lookback_days: 0,
        ..AnalyticsConfig::default()
    };
    assert!(empty.validate().is_err());
}
