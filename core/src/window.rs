//! Date parameters: parsing, day bounds, and trailing-window resolution.
//!
//! Calendar days are UTC days. Day `d` covers `[d 00:00, d+1 00:00)`.

use crate::error::{AnalyticsError, AnalyticsResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest window, in days, a caller may ask for.
pub const MAX_WINDOW_DAYS: u32 = 3660;

pub fn parse_date(raw: &str) -> AnalyticsResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| AnalyticsError::invalid(format!("bad date '{raw}' (want YYYY-MM-DD): {e}")))
}

pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// `days` calendar days ending on (and including) `today`.
    /// Clamps at the earliest representable date.
    pub fn trailing(days: u32, today: NaiveDate) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: today
                .checked_sub_signed(Duration::days(span))
                .unwrap_or(NaiveDate::MIN),
            end: today,
        }
    }

    /// Resolve caller-supplied window parameters.
    ///
    /// `days` and an explicit `start`/`end` pair are mutually exclusive.
    /// With neither, the trailing `default_days` window applies.
    pub fn resolve(
        days: Option<u32>,
        start: Option<&str>,
        end: Option<&str>,
        default_days: u32,
        today: NaiveDate,
    ) -> AnalyticsResult<Self> {
        match (days, start, end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(AnalyticsError::invalid(
                "'days' cannot be combined with 'start_date'/'end_date'",
            )),
            (Some(d), None, None) if d == 0 || d > MAX_WINDOW_DAYS => Err(AnalyticsError::invalid(
                format!("'days' must be between 1 and {MAX_WINDOW_DAYS}, got {d}"),
            )),
            (Some(d), None, None) => Ok(Self::trailing(d, today)),
            (None, Some(s), Some(e)) => {
                let window = Self {
                    start: parse_date(s)?,
                    end: parse_date(e)?,
                };
                if window.start > window.end {
                    return Err(AnalyticsError::invalid(format!(
                        "start_date {} is after end_date {}",
                        window.start, window.end
                    )));
                }
                if window.num_days() > MAX_WINDOW_DAYS as usize {
                    return Err(AnalyticsError::invalid(format!(
                        "{} to {} spans more than {MAX_WINDOW_DAYS} days",
                        window.start, window.end
                    )));
                }
                Ok(window)
            }
            (None, Some(_), None) | (None, None, Some(_)) => Err(AnalyticsError::invalid(
                "'start_date' and 'end_date' must be supplied together",
            )),
            (None, None, None) => Ok(Self::trailing(default_days, today)),
        }
    }

    /// Half-open instant bounds `[start 00:00, end+1 00:00)`.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = day_start(self.end)
            .checked_add_signed(Duration::days(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (day_start(self.start), end)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let (lo, hi) = self.bounds();
        at >= lo && at < hi
    }

    pub fn num_days(&self) -> usize {
        ((self.end - self.start).num_days() + 1).max(0) as usize
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.num_days() as i64).map(move |i| start + Duration::days(i))
    }
}

/// Raw window parameters as a caller supplies them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowParams<'a> {
    pub days: Option<u32>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
}

impl<'a> WindowParams<'a> {
    pub fn days(days: u32) -> Self {
        Self {
            days: Some(days),
            ..Self::default()
        }
    }

    pub fn range(start_date: &'a str, end_date: &'a str) -> Self {
        Self {
            days: None,
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    pub fn resolve(&self, default_days: u32, today: NaiveDate) -> AnalyticsResult<DateWindow> {
        DateWindow::resolve(self.days, self.start_date, self.end_date, default_days, today)
    }
}
