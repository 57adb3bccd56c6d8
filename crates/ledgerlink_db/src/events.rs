//! Append-only event log (audit sink).

use crate::error::{DbError, Result};
use crate::LedgerDb;
use chrono::{DateTime, Utc};
use ledgerlink_protocol::{EventLogEntry, EventType};
use sqlx::Row;
use std::str::FromStr;

impl LedgerDb {
    /// Append one audit row.
    pub async fn append_event(&self, entry: &EventLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ll_event_log
                (event_type, batch_id, trace_id, outcome_code, payload, detail, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.event_type.as_str())
        .bind(&entry.batch_id)
        .bind(&entry.trace_id)
        .bind(entry.outcome_code as i64)
        .bind(&entry.payload)
        .bind(&entry.detail)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All audit rows of one batch, in append order. The batch id is what
    /// a human greps for after the fact.
    pub async fn list_events(&self, batch_id: &str) -> Result<Vec<EventLogEntry>> {
        let rows = sqlx::query("SELECT * FROM ll_event_log WHERE batch_id = ? ORDER BY id ASC")
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let event_type: String = row.get("event_type");
                let event_type = EventType::from_str(&event_type)
                    .map_err(|e: String| DbError::invalid_state(e))?;
                let created_at: DateTime<Utc> = row.get("created_at");
                Ok(EventLogEntry {
                    event_type,
                    batch_id: row.get("batch_id"),
                    trace_id: row.get("trace_id"),
                    outcome_code: row.get::<i64, _>("outcome_code") as u16,
                    payload: row.get("payload"),
                    detail: row.get("detail"),
                    created_at,
                })
            })
            .collect()
    }
}
