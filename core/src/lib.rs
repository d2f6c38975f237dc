//! Freshdesk support analytics for the CJ support agent.
//!
//! Stateless KPI reports (CSAT, SLA breaches, response-time percentiles,
//! open-ticket ages, volume spikes and their root causes, review paging)
//! computed over one merchant's tickets at a time.

pub mod clock;
pub mod config;
pub mod csat;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod response;
pub mod review;
pub mod root_cause;
pub mod sla;
pub mod snapshot;
pub mod source;
pub mod stats;
pub mod store;
pub mod ticket;
pub mod trends;
pub mod types;
pub mod window;

pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, AnalyticsResult};
pub use source::{MemoryTicketSource, TicketQuery, TicketSource};
pub use store::TicketStore;
pub use ticket::TicketRecord;
