//! SQLite ticket store.
//!
//! RULE: Only store/ talks to the database.
//! Engines go through the `TicketSource` trait. They never execute SQL directly.

use crate::{error::AnalyticsResult, types::MerchantId};
use rusqlite::{params, Connection};

mod ticket;

pub struct TicketStore {
    conn: Connection,
}

impl TicketStore {
    pub fn open(path: &str) -> AnalyticsResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AnalyticsResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AnalyticsResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_tickets.sql"))?;
        Ok(())
    }

    pub fn ticket_count(&self, merchant_id: MerchantId) -> AnalyticsResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM ticket WHERE merchant_id = ?1",
            params![merchant_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
