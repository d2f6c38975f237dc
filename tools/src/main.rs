//! cj-report: headless analytics runner for the CJ support agent.
//!
//! Usage:
//!   cj-report --db tickets.db --import export.json --merchant 7
//!   cj-report --db tickets.db --merchant 7 --report snapshot --date 2024-01-10
//!   cj-report --db tickets.db --merchant 7 --report review --limit 20 --status open
//!
//! Reports: snapshot, csat, csat-log, open, response, trends, sla, root-cause, review.
//! Output is one JSON document on stdout. Errors print `{"error": ...}` and exit non-zero.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cj_analytics::{
    clock::FixedClock,
    config::{AnalyticsConfig, SlaConfig},
    review::ReviewRequest,
    window::{parse_date, WindowParams},
    AnalyticsEngine, AnalyticsError, TicketRecord, TicketStore,
};
use serde::Serialize;
use std::env;

#[derive(Serialize)]
struct ReportEnvelope<T: Serialize> {
    report: String,
    merchant_id: i64,
    /// True when nothing matched. Callers show a "no data found" message.
    no_data: bool,
    data: T,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: String,
    kind: &'static str,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if let Err(e) = run(&args) {
        let (kind, code) = match e.downcast_ref::<AnalyticsError>() {
            Some(AnalyticsError::InvalidParameter { .. }) => ("invalid_parameter", 2),
            Some(AnalyticsError::Upstream(_)) => ("upstream_failure", 3),
            _ => ("error", 1),
        };
        let body = ErrorEnvelope {
            error: format!("{e:#}"),
            kind,
        };
        match serde_json::to_string(&body) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("{e:#}"),
        }
        std::process::exit(code);
    }
}

fn run(args: &[String]) -> Result<()> {
    let db = flag(args, "--db").unwrap_or(":memory:");
    let merchant_id: i64 = flag(args, "--merchant")
        .ok_or_else(|| AnalyticsError::invalid("--merchant is required"))?
        .parse()
        .map_err(|_| AnalyticsError::invalid("--merchant must be an integer"))?;

    let config = match flag(args, "--config") {
        Some(path) => AnalyticsConfig::load(path)?,
        None => AnalyticsConfig::default(),
    };

    let mut store = TicketStore::open(db)?;
    store.migrate()?;

    if let Some(path) = flag(args, "--import") {
        let imported = import_tickets(&mut store, path)?;
        log::info!("imported {imported} tickets from {path}");
    }
    log::info!(
        "merchant={merchant_id}: {} tickets in {db}",
        store.ticket_count(merchant_id)?
    );

    let Some(report) = flag(args, "--report") else {
        return Ok(());
    };

    let mut engine = AnalyticsEngine::new(store, config);
    if let Some(raw) = flag(args, "--now") {
        let now = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| AnalyticsError::invalid(format!("bad --now '{raw}': {e}")))?
            .with_timezone(&Utc);
        engine = engine.with_clock(FixedClock::new(now));
    }

    run_report(&engine, merchant_id, report, args)
}

fn run_report(
    engine: &AnalyticsEngine<TicketStore>,
    merchant_id: i64,
    report: &str,
    args: &[String],
) -> Result<()> {
    let window = WindowParams {
        days: parse_flag::<u32>(args, "--days")?,
        start_date: flag(args, "--start"),
        end_date: flag(args, "--end"),
    };

    match report {
        "snapshot" => {
            let data = engine.get_daily_snapshot(merchant_id, required_date(args)?)?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "csat" => {
            let data = engine.calculate_csat(merchant_id, window)?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "csat-log" => {
            let data = engine.get_csat_detail_log(
                merchant_id,
                required_date(args)?,
                parse_flag(args, "--threshold")?.unwrap_or(102),
                args.iter().any(|a| a == "--include-conversations"),
                flag(args, "--rating-type"),
            )?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "open" => {
            let data = engine.get_open_ticket_distribution(merchant_id)?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "response" => {
            let data = engine.get_response_time_metrics(merchant_id, window)?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "trends" => {
            let days = parse_flag(args, "--days")?.unwrap_or(30);
            let data = engine.get_volume_trends(merchant_id, days)?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "sla" => {
            let defaults = engine.config().sla;
            let sla = SlaConfig {
                first_response_min: parse_flag(args, "--fr-min")?
                    .unwrap_or(defaults.first_response_min),
                resolution_min: parse_flag(args, "--res-min")?.unwrap_or(defaults.resolution_min),
                include_pending: !args.iter().any(|a| a == "--exclude-pending"),
            };
            let data = engine.get_sla_exceptions(merchant_id, Some(sla))?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "root-cause" => {
            let data = engine.get_root_cause_analysis(
                merchant_id,
                required_date(args)?,
                parse_flag(args, "--spike-threshold")?,
            )?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        "review" => {
            let request = ReviewRequest {
                limit: parse_flag(args, "--limit")?.unwrap_or(20),
                cursor: flag(args, "--cursor"),
                status_filter: flag(args, "--status"),
            };
            let data = engine.get_recent_tickets_for_review(merchant_id, &request)?;
            emit(report, merchant_id, data.is_empty(), &data)
        }
        other => Err(AnalyticsError::invalid(format!("unknown report '{other}'")).into()),
    }
}

fn emit<T: Serialize>(report: &str, merchant_id: i64, no_data: bool, data: &T) -> Result<()> {
    if no_data {
        log::info!("merchant={merchant_id} {report}: no data found");
    }
    let envelope = ReportEnvelope {
        report: report.to_string(),
        merchant_id,
        no_data,
        data,
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn import_tickets(store: &mut TicketStore, path: &str) -> Result<usize> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let tickets: Vec<TicketRecord> =
        serde_json::from_str(&content).with_context(|| format!("Cannot parse {path}"))?;
    Ok(store.insert_tickets(&tickets)?)
}

fn required_date(args: &[String]) -> Result<chrono::NaiveDate> {
    let raw = flag(args, "--date").ok_or_else(|| AnalyticsError::invalid("--date is required"))?;
    Ok(parse_date(raw)?)
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}

fn parse_flag<T: std::str::FromStr>(args: &[String], name: &str) -> Result<Option<T>> {
    match flag(args, name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AnalyticsError::invalid(format!("bad value '{raw}' for {name}")).into()),
        None => Ok(None),
    }
}
