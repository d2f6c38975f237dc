//! Daily snapshot and response-time tests, end to end through the engine.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use cj_analytics::{
    clock::FixedClock,
    config::AnalyticsConfig,
    response::{is_quick_close, response_time_metrics},
    types::TicketStatus,
    window::WindowParams,
    AnalyticsEngine, MemoryTicketSource, TicketRecord, TicketStore,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const MERCHANT: i64 = 1;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

fn the_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

fn resolved_after(mut t: TicketRecord, seconds: i64) -> TicketRecord {
    t.status = TicketStatus::Resolved;
    t.first_responded_at = Some(t.created_at + Duration::minutes(2));
    t.resolved_at = Some(t.created_at + Duration::seconds(seconds));
    t
}

fn rate(mut t: TicketRecord, email: &str, score: i64, rated_at: DateTime<Utc>) -> TicketRecord {
    t.requester_email = Some(email.to_string());
    t.has_rating = true;
    t.rating_score = Some(score);
    t.rating_created_at = Some(rated_at);
    t
}

/// Five tickets on 2024-01-10: two quick closes (5 min, 9.5 min) and
/// three ratings [103, 102, -101] from distinct customers.
fn scenario() -> Vec<TicketRecord> {
    let t1 = resolved_after(TicketRecord::new(1, MERCHANT, at(10, 9, 0)), 5 * 60);
    let t2 = resolved_after(TicketRecord::new(2, MERCHANT, at(10, 10, 0)), 9 * 60 + 30);
    let t3 = TicketRecord::new(3, MERCHANT, at(10, 11, 0));
    let t4 = TicketRecord::new(4, MERCHANT, at(10, 11, 30));
    let t5 = TicketRecord::new(5, MERCHANT, at(10, 11, 45));
    vec![
        rate(t1, "a@example.com", 103, at(10, 12, 0)),
        rate(t2, "b@example.com", 102, at(10, 12, 5)),
        rate(t3, "c@example.com", -101, at(10, 12, 10)),
        t4,
        t5,
    ]
}

fn engine_over<S: cj_analytics::TicketSource>(source: S) -> AnalyticsEngine<S> {
    AnalyticsEngine::new(source, AnalyticsConfig::default())
        .with_clock(FixedClock::new(at(10, 12, 30)))
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The headline end-to-end scenario, against the in-memory source.
#[test]
fn end_to_end_snapshot_memory() {
    let engine = engine_over(MemoryTicketSource::new(scenario()));
    let snap = engine.get_daily_snapshot(MERCHANT, the_day()).unwrap();
    assert_eq!(snap.new_tickets, 5);
    assert_eq!(snap.closed_tickets, 2);
    assert_eq!(snap.quick_close_count, 2, "5 min and 9.5 min are both quick");
    assert_eq!(snap.new_csat_count, 3);
    assert_eq!(snap.csat_percentage, 33.3);
    assert_eq!(snap.bad_csat_count, 1);
    assert_eq!(snap.median_resolution_min, Some(7.3));
    assert_eq!(snap.median_first_response_display, "2 min");
}

/// The same scenario through SQLite gives the same snapshot.
#[test]
fn end_to_end_snapshot_sqlite() {
    let mut store = TicketStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_tickets(&scenario()).unwrap();

    let from_sqlite = engine_over(store).get_daily_snapshot(MERCHANT, the_day()).unwrap();
    let from_memory = engine_over(MemoryTicketSource::new(scenario()))
        .get_daily_snapshot(MERCHANT, the_day())
        .unwrap();
    assert_eq!(from_sqlite, from_memory);
}

/// Snapshot SLA count double-counts a ticket late on both thresholds.
#[test]
fn snapshot_counts_both_breaches() {
    let mut late = TicketRecord::new(1, MERCHANT, at(9, 0, 0));
    late.first_responded_at = Some(late.created_at + Duration::minutes(90));
    late.closed_at = Some(late.created_at + Duration::minutes(1500));
    late.status = TicketStatus::Closed;
    let engine = engine_over(MemoryTicketSource::new(vec![late]));

    let snap = engine
        .get_daily_snapshot(MERCHANT, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap())
        .unwrap();
    assert_eq!(snap.sla_breach_count, 2, "Got {}", snap.sla_breach_count);
    assert_eq!(snap.closed_tickets, 0, "Closed on the 10th, not the 9th");
}

/// A day with no activity is a zeroed snapshot, not an error.
#[test]
fn quiet_day_is_empty() {
    let engine = engine_over(MemoryTicketSource::new(scenario()));
    let snap = engine
        .get_daily_snapshot(MERCHANT, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
        .unwrap();
    assert!(snap.is_empty());
    assert_eq!(snap.median_resolution_display, "No data");
    assert_eq!(snap.csat_percentage, 0.0);
}

/// Exactly 10 minutes is not a quick close; 9.5 minutes is.
#[test]
fn quick_close_is_strict() {
    let ten = resolved_after(TicketRecord::new(1, MERCHANT, at(10, 9, 0)), 10 * 60);
    let nine_half = resolved_after(TicketRecord::new(2, MERCHANT, at(10, 9, 0)), 9 * 60 + 30);
    assert!(!is_quick_close(&ten, 10.0));
    assert!(is_quick_close(&nine_half, 10.0));
}

/// Response metrics: percentiles, buckets and CSAT by speed tier.
#[test]
fn response_metrics_over_scenario() {
    let metrics = response_time_metrics(&scenario(), MERCHANT, 10.0, 2.0, 10);
    assert_eq!(metrics.tickets_considered, 5);
    assert_eq!(metrics.first_response.count, 2);
    assert_eq!(metrics.resolution.count, 2);
    assert_eq!(metrics.resolution.p95_min, Some(9.5), "p95 clamps to the last sample");
    assert_eq!(metrics.quick_close_count, 2);
    assert_eq!(metrics.resolution_buckets[0].label, "<10m");
    assert_eq!(metrics.resolution_buckets[0].percentage, 100.0);

    let fast = &metrics.csat_by_response_speed[0];
    assert_eq!(fast.tier, "<1h");
    assert_eq!(fast.rated_count, 2);
    assert_eq!(fast.csat_percentage, 50.0);
    let silent = metrics
        .csat_by_response_speed
        .iter()
        .find(|t| t.tier == "no_response")
        .expect("no_response tier present");
    assert_eq!(silent.rated_count, 1);
}

/// A single slow resolution stands out as an outlier.
#[test]
fn response_outliers() {
    let mut tickets: Vec<TicketRecord> = (1..=9)
        .map(|id| resolved_after(TicketRecord::new(id, MERCHANT, at(10, 8, 0)), 30 * 60))
        .collect();
    tickets.push(resolved_after(TicketRecord::new(10, MERCHANT, at(10, 8, 0)), 3000 * 60));
    let metrics = response_time_metrics(&tickets, MERCHANT, 10.0, 2.0, 10);
    assert_eq!(metrics.resolution_outliers.len(), 1);
    assert_eq!(metrics.resolution_outliers[0].ticket_id, 10);
    assert_eq!(metrics.resolution_outliers[0].deviation, 3.0);
    assert!(metrics.first_response_outliers.is_empty(), "Uniform responses have σ = 0");
}

/// Engine: response metrics honour the trailing window.
#[test]
fn engine_response_metrics_window() {
    let mut old = resolved_after(TicketRecord::new(9, MERCHANT, at(1, 9, 0)), 60);
    old.requester_email = None;
    let mut tickets = scenario();
    tickets.push(old);
    let engine = engine_over(MemoryTicketSource::new(tickets));
    let metrics = engine
        .get_response_time_metrics(MERCHANT, WindowParams::days(3))
        .unwrap();
    assert_eq!(metrics.tickets_considered, 5);
}

/// Bucket labels follow a configured quick-close cut.
#[test]
fn resolution_labels_follow_quick_close_cut() {
    let twelve = resolved_after(TicketRecord::new(1, MERCHANT, at(10, 9, 0)), 12 * 60);
    let metrics = response_time_metrics(&[twelve], MERCHANT, 15.0, 2.0, 10);
    let labels: Vec<&str> = metrics
        .resolution_buckets
        .iter()
        .map(|b| b.label.as_str())
        .collect();
    assert_eq!(labels, vec!["<15m", "15-30m", "30-60m", "1-4h", "4-24h", ">24h"]);
    assert_eq!(metrics.resolution_buckets[0].count, 1, "12 min is under a 15 min cut");
    assert_eq!(metrics.quick_close_count, 1);

    let fractional = response_time_metrics(&[], MERCHANT, 7.5, 2.0, 10);
    assert_eq!(fractional.resolution_buckets[0].label, "<7.5m");

    let config = AnalyticsConfig {
        quick_close_minutes: 45.0,
        ..AnalyticsConfig::default()
    };
    assert!(config.validate().is_err());
}
