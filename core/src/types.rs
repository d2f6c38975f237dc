//! Shared primitive types used across the analytics engine.

use crate::error::{AnalyticsError, AnalyticsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant scope. Every query carries exactly one.
pub type MerchantId = i64;

/// Freshdesk ticket id, unique within a merchant.
pub type TicketId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
    Closed,
    WaitingOnCustomer,
    WaitingOnThirdParty,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::Pending,
        TicketStatus::Resolved,
        TicketStatus::Closed,
        TicketStatus::WaitingOnCustomer,
        TicketStatus::WaitingOnThirdParty,
    ];

    /// Statuses that count toward the open backlog.
    pub const UNRESOLVED: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::Pending,
        TicketStatus::WaitingOnCustomer,
        TicketStatus::WaitingOnThirdParty,
    ];

    pub fn code(self) -> i64 {
        match self {
            TicketStatus::Open                => 2,
            TicketStatus::Pending             => 3,
            TicketStatus::Resolved            => 4,
            TicketStatus::Closed              => 5,
            TicketStatus::WaitingOnCustomer   => 6,
            TicketStatus::WaitingOnThirdParty => 7,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open                => "open",
            TicketStatus::Pending             => "pending",
            TicketStatus::Resolved            => "resolved",
            TicketStatus::Closed              => "closed",
            TicketStatus::WaitingOnCustomer   => "waiting_on_customer",
            TicketStatus::WaitingOnThirdParty => "waiting_on_third_party",
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }

    pub fn is_unresolved(self) -> bool {
        !self.is_done()
    }

    /// Statuses still owing the customer a first reply.
    pub fn awaits_first_response(self) -> bool {
        matches!(
            self,
            TicketStatus::Open | TicketStatus::Pending | TicketStatus::WaitingOnCustomer
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a review status filter. `unresolved` expands to the whole backlog.
pub fn parse_status_filter(raw: &str) -> AnalyticsResult<Vec<TicketStatus>> {
    let key = raw.trim().to_ascii_lowercase();
    if key == "unresolved" {
        return Ok(TicketStatus::UNRESOLVED.to_vec());
    }
    TicketStatus::ALL
        .into_iter()
        .find(|s| s.as_str() == key)
        .map(|s| vec![s])
        .ok_or_else(|| AnalyticsError::invalid(format!("unknown status filter '{raw}'")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn code(self) -> i64 {
        match self {
            Priority::Low    => 1,
            Priority::Medium => 2,
            Priority::High   => 3,
            Priority::Urgent => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Priority::Low),
            2 => Some(Priority::Medium),
            3 => Some(Priority::High),
            4 => Some(Priority::Urgent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low    => "low",
            Priority::Medium => "medium",
            Priority::High   => "high",
            Priority::Urgent => "urgent",
        }
    }
}

// ── Ratings ──────────────────────────────────────────────────────────────────

/// The only score counted as "satisfied" for CSAT.
pub const RATING_EXTREMELY_HAPPY: i64 = 103;

/// Scores below this are "unsatisfied". 100 and 101 sit in neither bucket.
pub const RATING_NEUTRAL: i64 = 100;

pub fn rating_label(score: i64) -> &'static str {
    match score {
        103  => "Extremely Happy",
        102  => "Very Happy",
        101  => "Happy",
        100  => "Neutral",
        -101 => "Unhappy",
        -102 => "Very Unhappy",
        -103 => "Extremely Unhappy",
        _    => "Unknown",
    }
}

pub fn is_satisfied(score: i64) -> bool {
    score == RATING_EXTREMELY_HAPPY
}

pub fn is_unsatisfied(score: i64) -> bool {
    score < RATING_NEUTRAL
}

/// Survey filter for the CSAT detail log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingFilter {
    All,
    Positive,
    Neutral,
    Negative,
}

impl RatingFilter {
    pub fn parse(raw: &str) -> AnalyticsResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all"      => Ok(RatingFilter::All),
            "positive" => Ok(RatingFilter::Positive),
            "neutral"  => Ok(RatingFilter::Neutral),
            "negative" => Ok(RatingFilter::Negative),
            _ => Err(AnalyticsError::invalid(format!("unknown rating_type '{raw}'"))),
        }
    }

    pub fn matches(self, score: i64) -> bool {
        match self {
            RatingFilter::All      => true,
            RatingFilter::Positive => score >= 102,
            RatingFilter::Neutral  => (RATING_NEUTRAL..102).contains(&score),
            RatingFilter::Negative => score < RATING_NEUTRAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for s in TicketStatus::ALL {
            assert_eq!(TicketStatus::from_code(s.code()), Some(s));
        }
        assert_eq!(TicketStatus::from_code(1), None);
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!(parse_status_filter("Pending").unwrap(), vec![TicketStatus::Pending]);
        assert_eq!(parse_status_filter("unresolved").unwrap().len(), 4);
        assert!(parse_status_filter("snoozed").is_err());
    }

    #[test]
    fn rating_buckets() {
        assert!(is_satisfied(103));
        assert!(!is_satisfied(102));
        assert!(!is_unsatisfied(100));
        assert!(!is_unsatisfied(101));
        assert!(is_unsatisfied(-101));
        assert_eq!(rating_label(-103), "Extremely Unhappy");
        assert_eq!(rating_label(7), "Unknown");
    }

    #[test]
    fn rating_filter_ranges() {
        assert!(RatingFilter::Positive.matches(102));
        assert!(!RatingFilter::Positive.matches(101));
        assert!(RatingFilter::Neutral.matches(101));
        assert!(RatingFilter::Negative.matches(-101));
        assert!(RatingFilter::parse("Lukewarm").is_err());
    }
}
