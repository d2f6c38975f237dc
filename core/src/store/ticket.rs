use super::TicketStore;
use crate::{
    error::AnalyticsResult,
    source::{TicketQuery, TicketSource},
    ticket::TicketRecord,
    types::{Priority, TicketStatus},
};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, params_from_iter, types::Type, types::Value};

const TICKET_COLUMNS: &str = "ticket_id, merchant_id, subject, description, status, priority,
    ticket_type, tags, created_at, updated_at, closed_at, resolved_at, first_responded_at,
    due_by, fr_due_by, is_escalated, fr_escalated, requester_name, requester_email,
    has_rating, rating_score, rating_feedback, rating_created_at, conversation_count,
    conversation";

fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn opt_ms(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(to_ms)
}

fn ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn opt_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms)),
        None => Ok(None),
    }
}

// Helper function for mapping ticket rows
fn ticket_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRecord> {
    let status_code: i64 = row.get(4)?;
    let priority_code: i64 = row.get(5)?;
    let tags_json: String = row.get(7)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(TicketRecord {
        id: row.get(0)?,
        merchant_id: row.get(1)?,
        subject: row.get(2)?,
        description: row.get(3)?,
        status: TicketStatus::from_code(status_code)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, status_code))?,
        priority: Priority::from_code(priority_code)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(5, priority_code))?,
        ticket_type: row.get(6)?,
        tags,
        created_at: ts(row, 8)?,
        updated_at: opt_ts(row, 9)?,
        closed_at: opt_ts(row, 10)?,
        resolved_at: opt_ts(row, 11)?,
        first_responded_at: opt_ts(row, 12)?,
        due_by: opt_ts(row, 13)?,
        fr_due_by: opt_ts(row, 14)?,
        is_escalated: row.get::<_, i32>(15)? != 0,
        fr_escalated: row.get::<_, i32>(16)? != 0,
        requester_name: row.get(17)?,
        requester_email: row.get(18)?,
        has_rating: row.get::<_, i32>(19)? != 0,
        rating_score: row.get(20)?,
        rating_feedback: row.get(21)?,
        rating_created_at: opt_ts(row, 22)?,
        conversation_count: row.get(23)?,
        conversation: row.get(24)?,
    })
}

fn insert_row(conn: &rusqlite::Connection, t: &TicketRecord) -> AnalyticsResult<()> {
    let tags = serde_json::to_string(&t.tags)?;
    conn.execute(
        "INSERT OR REPLACE INTO ticket (
            ticket_id, merchant_id, subject, description, status, priority,
            ticket_type, tags, created_at, updated_at, closed_at, resolved_at,
            first_responded_at, due_by, fr_due_by, is_escalated, fr_escalated,
            requester_name, requester_email, has_rating, rating_score,
            rating_feedback, rating_created_at, conversation_count, conversation
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                   ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
        params![
            t.id,
            t.merchant_id,
            t.subject.as_deref(),
            t.description.as_deref(),
            t.status.code(),
            t.priority.code(),
            t.ticket_type.as_deref(),
            tags,
            to_ms(t.created_at),
            opt_ms(t.updated_at),
            opt_ms(t.closed_at),
            opt_ms(t.resolved_at),
            opt_ms(t.first_responded_at),
            opt_ms(t.due_by),
            opt_ms(t.fr_due_by),
            if t.is_escalated { 1i32 } else { 0i32 },
            if t.fr_escalated { 1i32 } else { 0i32 },
            t.requester_name.as_deref(),
            t.requester_email.as_deref(),
            if t.has_rating { 1i32 } else { 0i32 },
            t.rating_score,
            t.rating_feedback.as_deref(),
            opt_ms(t.rating_created_at),
            t.conversation_count,
            t.conversation.as_deref(),
        ],
    )?;
    Ok(())
}

fn bind(values: &mut Vec<Value>, v: Value) -> String {
    values.push(v);
    format!("?{}", values.len())
}

/// Translate a query into a WHERE clause plus positional parameters.
fn build_select(query: &TicketQuery) -> (String, Vec<Value>) {
    let mut clauses = vec!["merchant_id = ?1".to_string()];
    let mut values = vec![Value::Integer(query.merchant_id())];

    if let Some(range) = query.created {
        let lo = bind(&mut values, Value::Integer(to_ms(range.from)));
        let hi = bind(&mut values, Value::Integer(to_ms(range.to)));
        clauses.push(format!("created_at >= {lo} AND created_at < {hi}"));
    }
    if let Some(range) = query.rated {
        let lo = bind(&mut values, Value::Integer(to_ms(range.from)));
        let hi = bind(&mut values, Value::Integer(to_ms(range.to)));
        clauses.push(format!(
            "has_rating = 1 AND rating_created_at >= {lo} AND rating_created_at < {hi}"
        ));
    }
    if let Some(range) = query.resolved {
        let lo = bind(&mut values, Value::Integer(to_ms(range.from)));
        let hi = bind(&mut values, Value::Integer(to_ms(range.to)));
        clauses.push(format!(
            "COALESCE(resolved_at, closed_at) >= {lo} AND COALESCE(resolved_at, closed_at) < {hi}"
        ));
    }
    if let Some(statuses) = &query.statuses {
        if statuses.is_empty() {
            clauses.push("0".to_string());
        } else {
            let slots: Vec<String> = statuses
                .iter()
                .map(|s| bind(&mut values, Value::Integer(s.code())))
                .collect();
            clauses.push(format!("status IN ({})", slots.join(", ")));
        }
    }
    if let Some(cursor) = &query.after {
        // Composite comparison so tickets sharing a created_at are neither
        // skipped nor repeated across pages.
        let at = bind(&mut values, Value::Integer(to_ms(cursor.created_at)));
        let id = bind(&mut values, Value::Integer(cursor.ticket_id));
        clauses.push(format!(
            "(created_at < {at} OR (created_at = {at} AND ticket_id < {id}))"
        ));
    }

    let order = if query.newest_first {
        "created_at DESC, ticket_id DESC"
    } else {
        "created_at ASC, ticket_id ASC"
    };
    let mut sql = format!(
        "SELECT {TICKET_COLUMNS} FROM ticket WHERE {} ORDER BY {order}",
        clauses.join(" AND ")
    );
    if let Some(limit) = query.limit {
        let slot = bind(&mut values, Value::Integer(limit as i64));
        sql.push_str(&format!(" LIMIT {slot}"));
    }
    (sql, values)
}

impl TicketStore {
    // ── Ticket ─────────────────────────────────────────────────────

    /// Upsert one ticket. Used by the importer and by tests; the engine
    /// itself never writes.
    pub fn insert_ticket(&self, t: &TicketRecord) -> AnalyticsResult<()> {
        insert_row(&self.conn, t)
    }

    /// Upsert a batch inside one transaction. Returns the number written.
    pub fn insert_tickets(&mut self, tickets: &[TicketRecord]) -> AnalyticsResult<usize> {
        let tx = self.conn.transaction()?;
        for t in tickets {
            insert_row(&tx, t)?;
        }
        tx.commit()?;
        Ok(tickets.len())
    }
}

impl TicketSource for TicketStore {
    fn fetch(&self, query: &TicketQuery) -> AnalyticsResult<Vec<TicketRecord>> {
        let (sql, values) = build_select(query);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), ticket_row_mapper)?;
        let tickets = rows.collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "merchant={} store: fetched {} tickets",
            query.merchant_id(),
            tickets.len()
        );
        Ok(tickets)
    }
}
